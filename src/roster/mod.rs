//! Patient roster contracts: the record shape the aggregator reads and the
//! boundary step that produces it from a raw API response.

pub mod boundary;
pub mod timestamp;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use boundary::*;
pub use timestamp::parse_timestamp;

/// Closed gender set used for distribution counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Built-in mapping rules. Returns `None` for values that have no rule.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "male" | "m" | "man" => Some(Gender::Male),
            "female" | "f" | "woman" => Some(Gender::Female),
            "other" | "non-binary" | "nonbinary" | "x" => Some(Gender::Other),
            _ => None,
        }
    }

    /// Built-in rules first, then the normalized alias table.
    pub fn resolve(raw: &str, aliases: &HashMap<String, Gender>) -> Option<Self> {
        Self::from_raw(raw).or_else(|| aliases.get(&raw.trim().to_lowercase()).copied())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    /// `None` when the backend sent a date that could not be read.
    pub date: Option<DateTime<FixedOffset>>,
    pub medication: String,
    pub dosage: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub chronic_conditions: Vec<String>,
    /// When the patient was registered with the practice.
    pub registered_at: Option<DateTime<FixedOffset>>,
    /// Most recent visit. The backend only tracks creation time, so the
    /// boundary fills this from the same field as `registered_at`.
    pub last_visit_at: Option<DateTime<FixedOffset>>,
    pub prescriptions: Vec<Prescription>,
}

impl PatientRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, age: u32, gender: Gender) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            age,
            gender,
            chronic_conditions: Vec::new(),
            registered_at: None,
            last_visit_at: None,
            prescriptions: Vec::new(),
        }
    }

    /// Sets the conditions from a comma-separated field.
    pub fn with_conditions(mut self, raw: &str) -> Self {
        self.chronic_conditions = condition_tokens(raw);
        self
    }

    /// Sets both registration and visit time from the backend's creation timestamp.
    pub fn with_created_at(mut self, created_at: DateTime<FixedOffset>) -> Self {
        self.registered_at = Some(created_at);
        self.last_visit_at = Some(created_at);
        self
    }

    pub fn with_prescription(mut self, prescription: Prescription) -> Self {
        self.prescriptions.push(prescription);
        self
    }
}

/// Splits a comma-separated conditions field into trimmed, non-empty tokens.
/// A condition repeated within one field is kept once, at its first position.
pub fn condition_tokens(raw: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();

    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tokens.iter().any(|existing| existing == token) {
            tokens.push(token.to_string());
        }
    }

    tokens
}
