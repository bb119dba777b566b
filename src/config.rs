use serde::{Deserialize, Serialize};
use std::path::Path;
use std::collections::HashMap;
use chrono::FixedOffset;
use crate::error::{MetricsError, MetricsResult};
use crate::metrics::Settings;
use crate::roster::Gender;

const MAX_OFFSET_MINUTES: i32 = 18 * 60;
const MAX_WINDOW_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub windows: WindowConfig,
    pub ranking: RankingConfig,
    pub timezone: TimezoneConfig,
    pub genders: GenderConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub active_case_days: i64,  // Prescription recency for an active case
    pub growth_days: i64,       // Registration recency for the growth rate
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            active_case_days: 30,
            growth_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub top_conditions: usize,
    pub top_medications: usize,
    pub recent_patients: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_conditions: 3,
            top_medications: 6,
            recent_patients: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimezoneConfig {
    /// Offset from UTC used to derive calendar days and months.
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GenderConfig {
    /// Extra raw values mapped onto the closed gender set, checked after the built-in rules.
    pub aliases: HashMap<String, Gender>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub strict: bool,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> MetricsResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MetricsResult<()> {
        let windows = [
            ("active_case_days", self.windows.active_case_days),
            ("growth_days", self.windows.growth_days),
        ];

        for (name, days) in windows {
            if !(1..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(MetricsError::InvalidConfig(format!(
                    "Window {} must be between 1 and {} days, got {}",
                    name, MAX_WINDOW_DAYS, days
                )));
            }
        }

        self.validate_ranking()?;

        if self.timezone.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(MetricsError::InvalidConfig(format!(
                "UTC offset of {} minutes is outside +/-18h",
                self.timezone.utc_offset_minutes
            )));
        }

        for alias in self.genders.aliases.keys() {
            if alias.trim().is_empty() {
                return Err(MetricsError::InvalidConfig(
                    "Gender aliases must not be blank".to_string()
                ));
            }
        }

        Ok(())
    }

    fn validate_ranking(&self) -> MetricsResult<()> {
        let sizes = [
            ("top_conditions", self.ranking.top_conditions),
            ("top_medications", self.ranking.top_medications),
            ("recent_patients", self.ranking.recent_patients),
        ];

        for (name, size) in sizes {
            if size == 0 {
                return Err(MetricsError::InvalidConfig(
                    format!("Ranking size {} must be positive", name)
                ));
            }
        }

        Ok(())
    }

    pub fn reference_offset(&self) -> MetricsResult<FixedOffset> {
        FixedOffset::east_opt(self.timezone.utc_offset_minutes * 60).ok_or_else(|| {
            MetricsError::InvalidConfig(format!(
                "Unsupported UTC offset: {} minutes",
                self.timezone.utc_offset_minutes
            ))
        })
    }

    /// Alias table keyed by normalized (trimmed, lower-cased) raw value.
    pub fn gender_aliases(&self) -> HashMap<String, Gender> {
        self.genders.aliases.iter()
            .map(|(raw, gender)| (raw.trim().to_lowercase(), *gender))
            .collect()
    }

    pub fn settings(&self) -> Settings {
        Settings {
            active_case_days: self.windows.active_case_days,
            growth_days: self.windows.growth_days,
            top_conditions: self.ranking.top_conditions,
            top_medications: self.ranking.top_medications,
            recent_patients: self.ranking.recent_patients,
        }
    }
}
