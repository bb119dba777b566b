//! Patient roster metrics: the figures behind the practice dashboard and the
//! analytics page, computed from one `GET /api/patients/` response.
//!
//! ```no_run
//! use patient_metrics::{aggregate_with, load_page, Config};
//!
//! let config = Config::default();
//! let roster = load_page(std::io::stdin(), &config)?;
//! let now = chrono::Utc::now().with_timezone(&config.reference_offset()?);
//! let metrics = aggregate_with(&roster.records, now, &config.settings());
//! println!("{} patients, {} active", metrics.total_patients, metrics.active_cases);
//! # Ok::<(), patient_metrics::MetricsError>(())
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod output;
pub mod roster;

pub use config::Config;
pub use error::{MetricsError, MetricsResult};
pub use metrics::{aggregate, aggregate_with, AggregatedMetrics, Settings};
pub use roster::{load_page, parse_page, validate_page, Gender, PatientRecord, Prescription, ValidatedRoster};
