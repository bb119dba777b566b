use super::percentage;
use crate::roster::PatientRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCount {
    pub condition: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionShare {
    pub condition: String,
    pub count: usize,
    /// Share of all patients, one decimal.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationCount {
    pub medication: String,
    pub prescriptions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisStats {
    /// "None" when no patient lists a condition.
    pub top_condition: String,
    pub top_condition_count: usize,
    /// Condition tokens across all patients.
    pub total_conditions: usize,
    /// Leading conditions, three unless configured otherwise.
    pub top_three: Vec<ConditionShare>,
}

/// Counts names in first-seen order, then sorts by count descending.
/// The sort is stable so equal counts keep first-seen order.
fn tally<'a, I>(names: I) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut positions: HashMap<&'a str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for name in names {
        match positions.get(name) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                positions.insert(name, counts.len());
                counts.push((name.to_string(), 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Full condition ranking across the roster.
pub fn rank_conditions(patients: &[PatientRecord]) -> Vec<ConditionCount> {
    let tokens = patients.iter()
        .flat_map(|p| p.chronic_conditions.iter())
        .map(String::as_str)
        .filter(|c| !c.is_empty());

    tally(tokens)
        .into_iter()
        .map(|(condition, count)| ConditionCount { condition, count })
        .collect()
}

pub fn condition_shares(ranking: &[ConditionCount], total_patients: usize) -> Vec<ConditionShare> {
    ranking.iter()
        .map(|c| ConditionShare {
            condition: c.condition.clone(),
            count: c.count,
            percentage: percentage(c.count, total_patients),
        })
        .collect()
}

pub fn diagnosis_stats(ranking: &[ConditionCount], total_patients: usize, top: usize) -> DiagnosisStats {
    let leader = ranking.first();

    DiagnosisStats {
        top_condition: leader.map(|c| c.condition.clone()).unwrap_or_else(|| "None".to_string()),
        top_condition_count: leader.map(|c| c.count).unwrap_or(0),
        total_conditions: ranking.iter().map(|c| c.count).sum(),
        top_three: condition_shares(&ranking[..top.min(ranking.len())], total_patients),
    }
}

/// Most prescribed medications, at most `limit` entries.
pub fn rank_medications(patients: &[PatientRecord], limit: usize) -> Vec<MedicationCount> {
    let names = patients.iter()
        .flat_map(|p| p.prescriptions.iter())
        .map(|rx| rx.medication.as_str())
        .filter(|m| !m.is_empty());

    tally(names)
        .into_iter()
        .take(limit)
        .map(|(medication, prescriptions)| MedicationCount { medication, prescriptions })
        .collect()
}
