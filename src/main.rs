use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use clap::Parser;
use log::{debug, info, warn};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use patient_metrics::output::{generate_report, save_results};
use patient_metrics::{aggregate_with, load_page, Config, MetricsError, MetricsResult};

#[derive(Parser)]
#[command(name = "patient_metrics")]
#[command(about = "Dashboard and analytics metrics for a patient roster")]
struct Cli {
    /// Saved `GET /api/patients/` response, or `-` for stdin
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reference time (RFC 3339); defaults to now
    #[arg(long)]
    now: Option<String>,

    /// Also write a Markdown report
    #[arg(short, long)]
    report: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn reference_time(raw: Option<&str>, offset: FixedOffset) -> MetricsResult<DateTime<FixedOffset>> {
    match raw {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|now| now.with_timezone(&offset))
            .map_err(|e| MetricsError::InvalidTimestamp(format!("{}: {}", raw, e))),
        None => Ok(Utc::now().with_timezone(&offset)),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let config = Config::from_file(path)
                .with_context(|| format!("loading configuration from {:?}", path))?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => {
            debug!("No configuration file given, using defaults");
            Config::default()
        }
    };

    let offset = config.reference_offset()?;
    let now = reference_time(cli.now.as_deref(), offset)?;
    info!("Computing metrics as of {}", now.to_rfc3339());

    let roster = if cli.input.as_os_str() == "-" {
        load_page(std::io::stdin().lock(), &config).context("reading patients from stdin")?
    } else {
        let file = File::open(&cli.input)
            .with_context(|| format!("opening {:?}", cli.input))?;
        load_page(BufReader::new(file), &config)
            .with_context(|| format!("reading patients from {:?}", cli.input))?
    };

    if roster.issues.is_empty() {
        info!("Loaded {} patients", roster.records.len());
    } else {
        warn!(
            "Loaded {} patients with {} record issues",
            roster.records.len(),
            roster.issues.len()
        );
    }
    if let Some(pages) = roster.total_pages.filter(|&pages| pages > 1) {
        warn!("Response is page 1 of {}; metrics cover this page only", pages);
    }

    let metrics = aggregate_with(&roster.records, now, &config.settings());
    info!(
        "{} patients, {} visits today, {} active cases",
        metrics.total_patients, metrics.today_visits, metrics.active_cases
    );

    // Create output directory if it doesn't exist
    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("creating {:?}", cli.output))?;

    save_results(&metrics, &roster, &cli.output)?;
    if cli.report {
        generate_report(&metrics, &cli.output)?;
    }
    info!("Results saved to {:?}", cli.output);

    Ok(())
}
