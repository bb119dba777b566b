//! Dashboard and analytics metrics derived from a patient roster.
//!
//! Everything here is a pure function of the records and the reference time
//! passed in. Nothing reads a clock and nothing is cached between calls.

pub mod buckets;
pub mod ranking;
pub mod timeline;

use crate::roster::PatientRecord;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub use buckets::*;
pub use ranking::*;
pub use timeline::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub active_case_days: i64,
    pub growth_days: i64,
    pub top_conditions: usize,
    pub top_medications: usize,
    pub recent_patients: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            active_case_days: 30,
            growth_days: 30,
            top_conditions: 3,
            top_medications: 6,
            recent_patients: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetrics {
    pub total_patients: usize,
    pub today_visits: usize,
    pub active_cases: usize,
    pub diagnosis_stats: DiagnosisStats,
    pub gender_distribution: GenderDistribution,
    pub age_distribution: DashboardAgeBuckets,
    pub shares: DashboardShares,
    pub recent_patients: Vec<RecentPatient>,
    pub analytics: AnalyticsMetrics,
}

/// Percent-of-total figures shown beside the dashboard counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardShares {
    pub female: f64,
    pub today_visits: f64,
    pub active_cases: f64,
    pub top_condition: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsMetrics {
    pub conditions: Vec<ConditionShare>,
    pub medications: Vec<MedicationCount>,
    pub age_buckets: Vec<AnalyticsAgeBucket>,
    pub monthly_visits: Vec<MonthlyVisits>,
    pub insights: Insights,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub most_common_condition: Option<ConditionShare>,
    pub average_age: f64,
    pub growth_rate: f64,
    pub peak_month: Option<MonthlyVisits>,
    pub largest_age_group: Option<AnalyticsAgeBucket>,
}

/// `count / total * 100` rounded to one decimal; 0.0 when `total` is zero.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_one_decimal(count as f64 / total as f64 * 100.0)
}

pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn aggregate(patients: &[PatientRecord], now: DateTime<FixedOffset>) -> AggregatedMetrics {
    aggregate_with(patients, now, &Settings::default())
}

pub fn aggregate_with(
    patients: &[PatientRecord],
    now: DateTime<FixedOffset>,
    settings: &Settings,
) -> AggregatedMetrics {
    let total = patients.len();

    let ranking = rank_conditions(patients);
    let diagnosis_stats = diagnosis_stats(&ranking, total, settings.top_conditions);
    let conditions = condition_shares(&ranking, total);

    let today_visits = count_visits_on_day(patients, now);
    let active_cases = count_active_cases(patients, now, settings.active_case_days);
    let gender_distribution = gender_distribution(patients);

    let age_buckets = analytics_age_buckets(patients);
    let months = monthly_visits(patients, *now.offset());
    let insights = Insights {
        most_common_condition: conditions.first().cloned(),
        average_age: average_age(patients),
        growth_rate: growth_rate(patients, now, settings.growth_days),
        peak_month: peak_month(&months),
        largest_age_group: largest_age_group(&age_buckets),
    };

    AggregatedMetrics {
        total_patients: total,
        today_visits,
        active_cases,
        shares: DashboardShares {
            female: percentage(gender_distribution.female, total),
            today_visits: percentage(today_visits, total),
            active_cases: percentage(active_cases, total),
            top_condition: percentage(diagnosis_stats.top_condition_count, total),
        },
        diagnosis_stats,
        gender_distribution,
        age_distribution: dashboard_age_buckets(patients),
        recent_patients: recent_patients(patients, settings.recent_patients),
        analytics: AnalyticsMetrics {
            conditions,
            medications: rank_medications(patients, settings.top_medications),
            age_buckets,
            monthly_visits: months,
            insights,
        },
    }
}
