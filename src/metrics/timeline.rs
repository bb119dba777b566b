use super::percentage;
use crate::roster::{Gender, PatientRecord};
use chrono::{DateTime, Datelike, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyVisits {
    pub month: String,
    pub visits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentPatient {
    pub id: String,
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub last_visit: Option<DateTime<FixedOffset>>,
    pub primary_condition: Option<String>,
}

/// Patients whose last visit falls on `now`'s calendar day, in `now`'s offset.
pub fn count_visits_on_day(patients: &[PatientRecord], now: DateTime<FixedOffset>) -> usize {
    let today = now.date_naive();

    patients.iter()
        .filter_map(|p| p.last_visit_at)
        .filter(|visit| visit.with_timezone(now.offset()).date_naive() == today)
        .count()
}

/// Start of a trailing window, or `None` when it lies outside chrono's range.
fn window_start(now: DateTime<FixedOffset>, window_days: i64) -> Option<DateTime<FixedOffset>> {
    Duration::try_days(window_days).and_then(|window| now.checked_sub_signed(window))
}

/// Patients with a prescription dated after `now - window_days`.
/// A window reaching past the representable range admits every dated prescription.
pub fn count_active_cases(patients: &[PatientRecord], now: DateTime<FixedOffset>, window_days: i64) -> usize {
    let cutoff = window_start(now, window_days);

    patients.iter()
        .filter(|p| {
            p.prescriptions.iter().any(|rx| match (rx.date, cutoff) {
                (Some(date), Some(cutoff)) => date > cutoff,
                (Some(_), None) => true,
                (None, _) => false,
            })
        })
        .count()
}

/// Share of patients registered within the trailing window, one decimal.
pub fn growth_rate(patients: &[PatientRecord], now: DateTime<FixedOffset>, window_days: i64) -> f64 {
    let cutoff = window_start(now, window_days);

    let recent = patients.iter()
        .filter(|p| match (p.registered_at, cutoff) {
            (Some(at), Some(cutoff)) => at >= cutoff,
            (Some(_), None) => true,
            (None, _) => false,
        })
        .count();

    percentage(recent, patients.len())
}

/// Visits per calendar month, merged across years, Jan..Dec. Months without visits are omitted.
pub fn monthly_visits(patients: &[PatientRecord], offset: FixedOffset) -> Vec<MonthlyVisits> {
    let mut counts = [0usize; 12];

    for visit in patients.iter().filter_map(|p| p.last_visit_at) {
        counts[visit.with_timezone(&offset).month0() as usize] += 1;
    }

    MONTHS.iter()
        .zip(counts)
        .filter(|(_, visits)| *visits > 0)
        .map(|(month, visits)| MonthlyVisits { month: month.to_string(), visits })
        .collect()
}

/// Busiest month; on a tie the earliest month in the calendar wins.
pub fn peak_month(months: &[MonthlyVisits]) -> Option<MonthlyVisits> {
    let (first, rest) = months.split_first()?;

    let peak = rest.iter().fold(first, |max, current| {
        if current.visits > max.visits { current } else { max }
    });
    Some(peak.clone())
}

/// Most recently registered patients first. Records without a registration time go last.
pub fn recent_patients(patients: &[PatientRecord], limit: usize) -> Vec<RecentPatient> {
    let mut ordered: Vec<&PatientRecord> = patients.iter().collect();
    ordered.sort_by(|a, b| b.registered_at.cmp(&a.registered_at));

    ordered.into_iter()
        .take(limit)
        .map(|p| RecentPatient {
            id: p.id.clone(),
            name: p.name.clone(),
            age: p.age,
            gender: p.gender,
            last_visit: p.last_visit_at,
            primary_condition: p.chronic_conditions.first().cloned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Prescription;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        utc().with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn created(id: &str, when: DateTime<FixedOffset>) -> PatientRecord {
        PatientRecord::new(id, id, 30, Gender::Male).with_created_at(when)
    }

    fn prescribed_on(id: &str, when: DateTime<FixedOffset>) -> PatientRecord {
        PatientRecord::new(id, id, 30, Gender::Male).with_prescription(Prescription {
            date: Some(when),
            medication: "Lisinopril".to_string(),
            dosage: "10mg".to_string(),
        })
    }

    #[test]
    fn test_visits_today_use_reference_offset() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        let now = ist.with_ymd_and_hms(2024, 6, 10, 1, 0, 0).unwrap();

        // 2024-06-09 20:00 UTC is already 2024-06-10 01:30 in IST
        let patients = vec![
            created("late-utc", at(2024, 6, 9, 20)),
            created("morning-utc", at(2024, 6, 9, 10)),
        ];
        assert_eq!(count_visits_on_day(&patients, now), 1);
        // the same instant read in UTC is still 2024-06-09, where both fall
        assert_eq!(count_visits_on_day(&patients, now.with_timezone(&utc())), 2);
    }

    #[test]
    fn test_active_case_window() {
        let now = at(2024, 6, 10, 12);
        let patients = vec![
            prescribed_on("recent", now - Duration::days(29)),
            prescribed_on("edge", now - Duration::days(30)),
            prescribed_on("stale", now - Duration::days(31)),
            PatientRecord::new("none", "none", 30, Gender::Male),
        ];
        assert_eq!(count_active_cases(&patients, now, 30), 1);
        assert_eq!(count_active_cases(&patients, now, 31), 2);
    }

    #[test]
    fn test_oversized_windows_admit_every_dated_record() {
        let now = at(2024, 6, 10, 12);
        let patients = vec![
            prescribed_on("ancient", at(1900, 1, 1, 0)).with_created_at(at(1900, 1, 1, 0)),
            PatientRecord::new("undated", "undated", 30, Gender::Male),
        ];

        for days in [100_000_000, i64::MAX] {
            assert_eq!(count_active_cases(&patients, now, days), 1);
            assert_relative_eq!(growth_rate(&patients, now, days), 50.0);
        }
    }

    #[test]
    fn test_growth_rate() {
        let now = at(2024, 6, 10, 12);
        let patients = vec![
            created("a", now - Duration::days(2)),
            created("b", now - Duration::days(30)),
            created("c", now - Duration::days(45)),
        ];
        assert_relative_eq!(growth_rate(&patients, now, 30), 66.7);
        assert_relative_eq!(growth_rate(&[], now, 30), 0.0);
    }

    #[test]
    fn test_monthly_visits_merge_years() {
        let patients = vec![
            created("a", at(2023, 3, 1, 0)),
            created("b", at(2024, 3, 9, 0)),
            created("c", at(2024, 1, 5, 0)),
            PatientRecord::new("d", "d", 30, Gender::Male),
        ];
        let months = monthly_visits(&patients, utc());
        assert_eq!(months, vec![
            MonthlyVisits { month: "Jan".to_string(), visits: 1 },
            MonthlyVisits { month: "Mar".to_string(), visits: 2 },
        ]);
    }

    #[test]
    fn test_peak_month_tie_goes_to_earliest() {
        let months = vec![
            MonthlyVisits { month: "Feb".to_string(), visits: 3 },
            MonthlyVisits { month: "May".to_string(), visits: 5 },
            MonthlyVisits { month: "Sep".to_string(), visits: 5 },
        ];
        assert_eq!(peak_month(&months).unwrap().month, "May");
        assert_eq!(peak_month(&[]), None);
    }

    #[test]
    fn test_recent_patients_order() {
        let patients = vec![
            PatientRecord::new("undated", "Undated", 30, Gender::Male),
            created("old", at(2024, 1, 1, 0)),
            created("new", at(2024, 5, 1, 0)).with_conditions("Asthma, Gout"),
        ];

        let recent = recent_patients(&patients, 2);
        let ids: Vec<&str> = recent.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert_eq!(recent[0].primary_condition.as_deref(), Some("Asthma"));

        assert_eq!(recent_patients(&patients, 10)[2].id, "undated");
    }
}
