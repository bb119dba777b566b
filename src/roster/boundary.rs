use super::{condition_tokens, parse_timestamp, Gender, PatientRecord, Prescription};
use crate::config::Config;
use crate::error::{MetricsError, MetricsResult};
use chrono::FixedOffset;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;

/// Records accepted from one `GET /api/patients/` response, plus what was
/// wrong with the ones that needed repair or were dropped.
#[derive(Debug, Clone, Default)]
pub struct ValidatedRoster {
    pub records: Vec<PatientRecord>,
    pub issues: Vec<RecordIssue>,
    pub total_pages: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordIssue {
    /// Position in the response's `patients` array.
    pub index: usize,
    pub id: Option<String>,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
    NotAnObject,
    MissingId,
    MissingAge,
    InvalidAge(String),
    MissingGender,
    UnmappedGender(String),
    MissingCreatedAt,
    InvalidCreatedAt(String),
    MalformedPrescription(usize),
    InvalidPrescriptionDate { prescription: usize, raw: String },
}

impl IssueKind {
    /// Whether the record is left out of the roster.
    pub fn drops_record(&self) -> bool {
        matches!(
            self,
            IssueKind::NotAnObject | IssueKind::MissingId | IssueKind::MissingAge | IssueKind::InvalidAge(_)
        )
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::NotAnObject => write!(f, "entry is not an object"),
            IssueKind::MissingId => write!(f, "missing id"),
            IssueKind::MissingAge => write!(f, "missing age"),
            IssueKind::InvalidAge(raw) => write!(f, "invalid age {}", raw),
            IssueKind::MissingGender => write!(f, "missing gender, counted as other"),
            IssueKind::UnmappedGender(raw) => write!(f, "unmapped gender {:?}, counted as other", raw),
            IssueKind::MissingCreatedAt => write!(f, "missing created_at"),
            IssueKind::InvalidCreatedAt(raw) => write!(f, "unreadable created_at {:?}", raw),
            IssueKind::MalformedPrescription(i) => write!(f, "prescription {} is not an object", i),
            IssueKind::InvalidPrescriptionDate { prescription, raw } => {
                write!(f, "prescription {} has unreadable date {:?}", prescription, raw)
            }
        }
    }
}

impl fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.id {
            Some(id) => write!(f, "patient #{} ({}): {}", self.index, id, self.kind),
            None => write!(f, "patient #{}: {}", self.index, self.kind),
        }
    }
}

pub fn load_page<R: Read>(reader: R, config: &Config) -> MetricsResult<ValidatedRoster> {
    let value: Value = serde_json::from_reader(reader)?;
    validate_page(&value, config)
}

pub fn parse_page(content: &str, config: &Config) -> MetricsResult<ValidatedRoster> {
    let value: Value = serde_json::from_str(content)?;
    validate_page(&value, config)
}

/// Checks a response body once so the aggregator only ever sees well-formed records.
pub fn validate_page(value: &Value, config: &Config) -> MetricsResult<ValidatedRoster> {
    let body = value.as_object().ok_or_else(|| {
        MetricsError::InvalidInput("response body must be a JSON object".to_string())
    })?;

    let entries = body.get("patients").and_then(Value::as_array).ok_or_else(|| {
        MetricsError::InvalidInput("response body must carry a `patients` array".to_string())
    })?;

    let validator = RecordValidator {
        offset: config.reference_offset()?,
        aliases: config.gender_aliases(),
    };

    let mut roster = ValidatedRoster {
        records: Vec::with_capacity(entries.len()),
        issues: Vec::new(),
        total_pages: body.get("total_pages").and_then(Value::as_u64),
    };

    for (index, entry) in entries.iter().enumerate() {
        if let Some(record) = validator.validate(index, entry, &mut roster.issues) {
            roster.records.push(record);
        }
    }

    for issue in &roster.issues {
        warn!("{}", issue);
    }

    if config.validation.strict {
        if let Some(first) = roster.issues.first() {
            return Err(MetricsError::Validation(format!(
                "{} record issue(s), first: {}",
                roster.issues.len(),
                first
            )));
        }
    }

    debug!(
        "Accepted {} of {} patient entries ({} issues)",
        roster.records.len(),
        entries.len(),
        roster.issues.len()
    );
    Ok(roster)
}

struct RecordValidator {
    offset: FixedOffset,
    aliases: HashMap<String, Gender>,
}

impl RecordValidator {
    fn validate(&self, index: usize, entry: &Value, issues: &mut Vec<RecordIssue>) -> Option<PatientRecord> {
        let mut report = |id: Option<&str>, kind: IssueKind| {
            issues.push(RecordIssue {
                index,
                id: id.map(str::to_string),
                kind,
            });
        };

        let fields = match entry.as_object() {
            Some(fields) => fields,
            None => {
                report(None, IssueKind::NotAnObject);
                return None;
            }
        };

        let id = match read_id(fields) {
            Some(id) => id,
            None => {
                report(None, IssueKind::MissingId);
                return None;
            }
        };

        let age = match read_age(fields.get("age")) {
            Ok(age) => age,
            Err(kind) => {
                report(Some(&id), kind);
                return None;
            }
        };

        let gender = match fields.get("gender") {
            Some(Value::String(raw)) if !raw.trim().is_empty() => {
                let raw = raw.trim();
                Gender::resolve(raw, &self.aliases).unwrap_or_else(|| {
                    report(Some(&id), IssueKind::UnmappedGender(raw.to_string()));
                    Gender::Other
                })
            }
            Some(Value::String(_)) | Some(Value::Null) | None => {
                report(Some(&id), IssueKind::MissingGender);
                Gender::Other
            }
            Some(other) => {
                report(Some(&id), IssueKind::UnmappedGender(other.to_string()));
                Gender::Other
            }
        };

        let created_raw = fields.get("created_at")
            .or_else(|| fields.get("createdAt"))
            .and_then(Value::as_str);
        let created_at = match created_raw {
            Some(raw) => {
                let parsed = parse_timestamp(raw, self.offset);
                if parsed.is_none() {
                    report(Some(&id), IssueKind::InvalidCreatedAt(raw.to_string()));
                }
                parsed
            }
            None => {
                report(Some(&id), IssueKind::MissingCreatedAt);
                None
            }
        };

        let chronic_conditions = fields.get("chronicConditions")
            .or_else(|| fields.get("chronic_conditions"))
            .and_then(Value::as_str)
            .map(condition_tokens)
            .unwrap_or_default();

        let mut prescriptions = Vec::new();
        if let Some(entries) = fields.get("prescriptions").and_then(Value::as_array) {
            for (i, entry) in entries.iter().enumerate() {
                match entry.as_object() {
                    Some(prescription) => {
                        let (parsed, bad_date) = self.read_prescription(prescription);
                        if let Some(raw) = bad_date {
                            report(Some(&id), IssueKind::InvalidPrescriptionDate { prescription: i, raw });
                        }
                        prescriptions.push(parsed);
                    }
                    None => report(Some(&id), IssueKind::MalformedPrescription(i)),
                }
            }
        }

        Some(PatientRecord {
            name: read_string(fields.get("name")),
            id,
            age,
            gender,
            chronic_conditions,
            registered_at: created_at,
            last_visit_at: created_at,
            prescriptions,
        })
    }

    fn read_prescription(&self, fields: &Map<String, Value>) -> (Prescription, Option<String>) {
        let raw_date = read_string(fields.get("date"));
        let date = parse_timestamp(&raw_date, self.offset);
        let bad_date = if date.is_none() { Some(raw_date) } else { None };

        let prescription = Prescription {
            date,
            medication: read_string(fields.get("medication")).trim().to_string(),
            dosage: read_string(fields.get("dosage")),
        };
        (prescription, bad_date)
    }
}

fn read_string(value: Option<&Value>) -> String {
    value.and_then(Value::as_str).unwrap_or_default().to_string()
}

fn read_id(fields: &Map<String, Value>) -> Option<String> {
    let raw = fields.get("id").or_else(|| fields.get("_id"))?;
    let id = match raw {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    if id.is_empty() { None } else { Some(id) }
}

fn read_age(value: Option<&Value>) -> Result<u32, IssueKind> {
    let value = match value {
        Some(Value::Null) | None => return Err(IssueKind::MissingAge),
        Some(value) => value,
    };

    let parsed = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    parsed
        .and_then(|age| u32::try_from(age).ok())
        .ok_or_else(|| IssueKind::InvalidAge(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_well_formed_page() {
        let page = json!({
            "patients": [{
                "id": "p1",
                "name": "Asha",
                "age": 42,
                "gender": "Female",
                "chronicConditions": "Asthma, Diabetes",
                "created_at": "2024-05-02T09:30:00.000123",
                "prescriptions": [
                    {"date": "2024-05-02", "medication": " Metformin ", "dosage": "500mg"}
                ]
            }],
            "total": 1,
            "page": 1,
            "total_pages": 1
        });

        let roster = validate_page(&page, &Config::default()).unwrap();
        assert!(roster.issues.is_empty());
        assert_eq!(roster.total_pages, Some(1));

        let record = &roster.records[0];
        assert_eq!(record.gender, Gender::Female);
        assert_eq!(record.chronic_conditions, vec!["Asthma", "Diabetes"]);
        assert_eq!(record.registered_at, record.last_visit_at);
        assert!(record.registered_at.is_some());
        assert_eq!(record.prescriptions[0].medication, "Metformin");
        assert!(record.prescriptions[0].date.is_some());
    }

    #[test]
    fn test_non_array_patients_is_rejected() {
        let result = validate_page(&json!({"patients": {"id": "p1"}}), &Config::default());
        assert!(matches!(result, Err(MetricsError::InvalidInput(_))));

        let result = validate_page(&json!([]), &Config::default());
        assert!(matches!(result, Err(MetricsError::InvalidInput(_))));
    }

    #[test]
    fn test_loose_fields_degrade_to_empty() {
        let page = json!({
            "patients": [{
                "id": 17,
                "age": "61",
                "gender": "m",
                "chronicConditions": null,
                "created_at": "2024-05-02",
                "prescriptions": null
            }]
        });

        let roster = validate_page(&page, &Config::default()).unwrap();
        assert!(roster.issues.is_empty());

        let record = &roster.records[0];
        assert_eq!(record.id, "17");
        assert_eq!(record.age, 61);
        assert_eq!(record.gender, Gender::Male);
        assert_eq!(record.name, "");
        assert!(record.chronic_conditions.is_empty());
        assert!(record.prescriptions.is_empty());
    }

    #[test]
    fn test_bad_records_are_dropped_and_reported() {
        let page = json!({
            "patients": [
                "not a record",
                {"name": "No Id", "age": 30, "gender": "male"},
                {"id": "neg", "age": -4, "gender": "male"},
                {"id": "frac", "age": 30.5, "gender": "male"},
                {"id": "ok", "age": 30.0, "gender": "male", "created_at": "2024-01-01"}
            ]
        });

        let roster = validate_page(&page, &Config::default()).unwrap();
        assert_eq!(roster.records.len(), 1);
        assert_eq!(roster.records[0].age, 30);

        let kinds: Vec<&IssueKind> = roster.issues.iter().map(|i| &i.kind).collect();
        assert_eq!(kinds[0], &IssueKind::NotAnObject);
        assert_eq!(kinds[1], &IssueKind::MissingId);
        assert!(matches!(kinds[2], IssueKind::InvalidAge(_)));
        assert!(matches!(kinds[3], IssueKind::InvalidAge(_)));
        assert!(roster.issues.iter().all(|i| i.kind.drops_record()));
    }

    #[test]
    fn test_repairable_issues_keep_the_record() {
        let page = json!({
            "patients": [{
                "id": "p1",
                "age": 50,
                "gender": "M.",
                "created_at": "last tuesday",
                "prescriptions": [7, {"date": "soon", "medication": "Aspirin", "dosage": "75mg"}]
            }]
        });

        let roster = validate_page(&page, &Config::default()).unwrap();
        assert_eq!(roster.records.len(), 1);

        let record = &roster.records[0];
        assert_eq!(record.gender, Gender::Other);
        assert!(record.registered_at.is_none());
        assert_eq!(record.prescriptions.len(), 1);
        assert!(record.prescriptions[0].date.is_none());

        let kinds: Vec<&IssueKind> = roster.issues.iter().map(|i| &i.kind).collect();
        assert_eq!(kinds.len(), 4);
        assert_eq!(kinds[0], &IssueKind::UnmappedGender("M.".to_string()));
        assert_eq!(kinds[1], &IssueKind::InvalidCreatedAt("last tuesday".to_string()));
        assert_eq!(kinds[2], &IssueKind::MalformedPrescription(0));
        assert!(matches!(kinds[3], IssueKind::InvalidPrescriptionDate { prescription: 1, .. }));
        assert!(roster.issues.iter().all(|i| !i.kind.drops_record()));
    }

    #[test]
    fn test_non_string_gender_reports_what_was_sent() {
        let page = json!({
            "patients": [
                {"id": "n", "age": 20, "gender": 5, "created_at": "2024-01-01"},
                {"id": "b", "age": 20, "gender": true, "created_at": "2024-01-01"},
                {"id": "z", "age": 20, "gender": null, "created_at": "2024-01-01"},
                {"id": "e", "age": 20, "gender": "  ", "created_at": "2024-01-01"}
            ]
        });

        let roster = validate_page(&page, &Config::default()).unwrap();
        assert_eq!(roster.records.len(), 4);
        assert!(roster.records.iter().all(|r| r.gender == Gender::Other));

        let kinds: Vec<&IssueKind> = roster.issues.iter().map(|i| &i.kind).collect();
        assert_eq!(kinds, vec![
            &IssueKind::UnmappedGender("5".to_string()),
            &IssueKind::UnmappedGender("true".to_string()),
            &IssueKind::MissingGender,
            &IssueKind::MissingGender,
        ]);
    }

    #[test]
    fn test_aliases_and_strict_mode() {
        let page = json!({
            "patients": [{"id": "p1", "age": 20, "gender": "Masc", "created_at": "2024-01-01"}]
        });

        let mut config = Config::default();
        config.validation.strict = true;
        assert!(matches!(validate_page(&page, &config), Err(MetricsError::Validation(_))));

        config.genders.aliases.insert("masc".to_string(), Gender::Male);
        let roster = validate_page(&page, &config).unwrap();
        assert_eq!(roster.records[0].gender, Gender::Male);
    }

    #[test]
    fn test_parse_page_from_text() {
        let roster = parse_page(r#"{"patients": []}"#, &Config::default()).unwrap();
        assert!(roster.records.is_empty());
        assert!(roster.total_pages.is_none());

        assert!(matches!(parse_page("{", &Config::default()), Err(MetricsError::Json(_))));
    }
}
