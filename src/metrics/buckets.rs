use super::percentage;
use crate::roster::{Gender, PatientRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderDistribution {
    pub male: usize,
    pub female: usize,
    pub other: usize,
}

impl GenderDistribution {
    pub fn total(&self) -> usize {
        self.male + self.female + self.other
    }
}

/// Dashboard age groups: under 18, adults 18-59, seniors 60 and over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardAgeBuckets {
    pub under18: usize,
    pub adult: usize,
    pub senior: usize,
}

impl DashboardAgeBuckets {
    pub fn total(&self) -> usize {
        self.under18 + self.adult + self.senior
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsAgeBucket {
    pub range: String,
    pub count: usize,
    pub percentage: f64,
}

pub const ANALYTICS_AGE_RANGES: [&str; 5] = ["0-18", "19-30", "31-50", "51-70", "70+"];

pub fn gender_distribution(patients: &[PatientRecord]) -> GenderDistribution {
    let mut distribution = GenderDistribution::default();

    for patient in patients {
        match patient.gender {
            Gender::Male => distribution.male += 1,
            Gender::Female => distribution.female += 1,
            Gender::Other => distribution.other += 1,
        }
    }

    distribution
}

pub fn dashboard_age_buckets(patients: &[PatientRecord]) -> DashboardAgeBuckets {
    let mut buckets = DashboardAgeBuckets::default();

    for patient in patients {
        if patient.age < 18 {
            buckets.under18 += 1;
        } else if patient.age < 60 {
            buckets.adult += 1;
        } else {
            buckets.senior += 1;
        }
    }

    buckets
}

/// Analytics age groups. Upper bounds are inclusive: 18 is "0-18", 70 is "51-70".
pub fn analytics_age_buckets(patients: &[PatientRecord]) -> Vec<AnalyticsAgeBucket> {
    let mut counts = [0usize; 5];

    for patient in patients {
        let slot = match patient.age {
            0..=18 => 0,
            19..=30 => 1,
            31..=50 => 2,
            51..=70 => 3,
            _ => 4,
        };
        counts[slot] += 1;
    }

    ANALYTICS_AGE_RANGES.iter()
        .zip(counts)
        .map(|(range, count)| AnalyticsAgeBucket {
            range: range.to_string(),
            count,
            percentage: percentage(count, patients.len()),
        })
        .collect()
}

/// Most populated analytics group; on a tie the younger group wins.
/// `None` when every group is empty.
pub fn largest_age_group(buckets: &[AnalyticsAgeBucket]) -> Option<AnalyticsAgeBucket> {
    let (first, rest) = buckets.split_first()?;

    let largest = rest.iter().fold(first, |max, current| {
        if current.count > max.count { current } else { max }
    });
    if largest.count == 0 { None } else { Some(largest.clone()) }
}

/// Mean age rounded to one decimal, 0.0 for an empty roster.
pub fn average_age(patients: &[PatientRecord]) -> f64 {
    if patients.is_empty() {
        return 0.0;
    }

    let sum: u64 = patients.iter().map(|p| u64::from(p.age)).sum();
    super::round_one_decimal(sum as f64 / patients.len() as f64)
}
