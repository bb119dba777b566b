use crate::metrics::AggregatedMetrics;
use crate::roster::ValidatedRoster;
use crate::error::MetricsResult;
use std::path::Path;
use std::fs::File;
use log::info;

pub fn save_results<P: AsRef<Path>>(
    metrics: &AggregatedMetrics,
    roster: &ValidatedRoster,
    output_dir: P,
) -> MetricsResult<()> {
    let output_path = output_dir.as_ref();

    // Full structure for the display layer
    save_metrics_json(metrics, &output_path.join("metrics.json"))?;

    // Chart tables
    save_condition_data(metrics, &output_path.join("conditions.csv"))?;
    save_medication_data(metrics, &output_path.join("medications.csv"))?;
    save_age_data(metrics, &output_path.join("age_distribution.csv"))?;
    save_monthly_data(metrics, &output_path.join("monthly_visits.csv"))?;

    if !roster.issues.is_empty() {
        save_issue_data(roster, &output_path.join("issues.csv"))?;
    }

    info!("All results saved to {:?}", output_path);
    Ok(())
}

fn save_metrics_json<P: AsRef<Path>>(metrics: &AggregatedMetrics, path: P) -> MetricsResult<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, metrics)?;
    Ok(())
}

fn save_condition_data<P: AsRef<Path>>(metrics: &AggregatedMetrics, path: P) -> MetricsResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["RANK", "CONDITION", "PATIENTS", "PERCENTAGE"])?;

    for (rank, condition) in metrics.analytics.conditions.iter().enumerate() {
        writer.write_record(&[
            (rank + 1).to_string(),
            condition.condition.clone(),
            condition.count.to_string(),
            format!("{:.1}", condition.percentage),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_medication_data<P: AsRef<Path>>(metrics: &AggregatedMetrics, path: P) -> MetricsResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["RANK", "MEDICATION", "PRESCRIPTIONS"])?;

    for (rank, medication) in metrics.analytics.medications.iter().enumerate() {
        writer.write_record(&[
            (rank + 1).to_string(),
            medication.medication.clone(),
            medication.prescriptions.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_age_data<P: AsRef<Path>>(metrics: &AggregatedMetrics, path: P) -> MetricsResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["SCHEME", "RANGE", "PATIENTS", "PERCENTAGE"])?;

    let total = metrics.total_patients;
    let dashboard = &metrics.age_distribution;
    for (range, count) in [("under18", dashboard.under18), ("adult", dashboard.adult), ("senior", dashboard.senior)] {
        writer.write_record(&[
            "dashboard".to_string(),
            range.to_string(),
            count.to_string(),
            format!("{:.1}", crate::metrics::percentage(count, total)),
        ])?;
    }

    for bucket in &metrics.analytics.age_buckets {
        writer.write_record(&[
            "analytics".to_string(),
            bucket.range.clone(),
            bucket.count.to_string(),
            format!("{:.1}", bucket.percentage),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_monthly_data<P: AsRef<Path>>(metrics: &AggregatedMetrics, path: P) -> MetricsResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["MONTH", "VISITS"])?;

    for month in &metrics.analytics.monthly_visits {
        writer.write_record(&[month.month.clone(), month.visits.to_string()])?;
    }

    writer.flush()?;
    Ok(())
}

fn save_issue_data<P: AsRef<Path>>(roster: &ValidatedRoster, path: P) -> MetricsResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(["INDEX", "PATIENT_ID", "DROPPED", "ISSUE"])?;

    for issue in &roster.issues {
        writer.write_record(&[
            issue.index.to_string(),
            issue.id.clone().unwrap_or_default(),
            issue.kind.drops_record().to_string(),
            issue.kind.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Generate a human-readable summary of the dashboard and analytics figures
pub fn generate_report<P: AsRef<Path>>(metrics: &AggregatedMetrics, output_dir: P) -> MetricsResult<()> {
    let report_path = output_dir.as_ref().join("metrics_report.md");
    std::fs::write(&report_path, render_report(metrics))?;
    info!("Report written to {:?}", report_path);
    Ok(())
}

fn render_report(metrics: &AggregatedMetrics) -> String {
    let insights = &metrics.analytics.insights;
    let top_conditions: String = metrics.diagnosis_stats.top_three.iter()
        .map(|c| format!("- {}: {} ({:.1}%)\n", c.condition, c.count, c.percentage))
        .collect();
    let medications: String = metrics.analytics.medications.iter()
        .map(|m| format!("- {}: {} prescriptions\n", m.medication, m.prescriptions))
        .collect();

    format!(
        r#"# Patient Metrics Report

## Dashboard
- **Total patients**: {}
- **Today's visits**: {} ({:.1}% of total)
- **Active cases**: {} ({:.1}% of total)
- **Gender**: {} male, {} female ({:.1}% female), {} other
- **Age**: {} under 18, {} adults (18-59), {} seniors (60+)

## Diagnoses
- **Top condition**: {} ({} patients, {:.1}%)
- **Condition mentions**: {}

{}
## Analytics
- **Most common condition**: {}
- **Average patient age**: {:.1} years
- **Monthly growth**: {:.1}% new registrations
- **Peak visit month**: {}
- **Largest age group**: {}

### Most prescribed medications
{}"#,
        metrics.total_patients,
        metrics.today_visits,
        metrics.shares.today_visits,
        metrics.active_cases,
        metrics.shares.active_cases,
        metrics.gender_distribution.male,
        metrics.gender_distribution.female,
        metrics.shares.female,
        metrics.gender_distribution.other,
        metrics.age_distribution.under18,
        metrics.age_distribution.adult,
        metrics.age_distribution.senior,
        metrics.diagnosis_stats.top_condition,
        metrics.diagnosis_stats.top_condition_count,
        metrics.shares.top_condition,
        metrics.diagnosis_stats.total_conditions,
        top_conditions,
        insights.most_common_condition.as_ref()
            .map(|c| format!("{} ({:.1}%)", c.condition, c.percentage))
            .unwrap_or_else(|| "None".to_string()),
        insights.average_age,
        insights.growth_rate,
        insights.peak_month.as_ref()
            .map(|m| format!("{} ({} visits)", m.month, m.visits))
            .unwrap_or_else(|| "N/A".to_string()),
        insights.largest_age_group.as_ref()
            .map(|b| format!("{} ({} patients)", b.range, b.count))
            .unwrap_or_else(|| "N/A".to_string()),
        if medications.is_empty() { "- none recorded\n".to_string() } else { medications },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::aggregate;
    use crate::roster::{Gender, IssueKind, PatientRecord, RecordIssue};
    use chrono::{FixedOffset, TimeZone};

    fn sample() -> (AggregatedMetrics, ValidatedRoster) {
        let now = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        let records = vec![
            PatientRecord::new("p1", "Ana", 34, Gender::Female).with_conditions("Asthma").with_created_at(now),
            PatientRecord::new("p2", "Ben", 65, Gender::Male).with_conditions("Asthma, Gout"),
        ];
        let metrics = aggregate(&records, now);
        let roster = ValidatedRoster {
            records,
            issues: vec![RecordIssue { index: 2, id: None, kind: IssueKind::MissingId }],
            total_pages: Some(1),
        };
        (metrics, roster)
    }

    #[test]
    fn test_save_results_writes_all_tables() {
        let (metrics, roster) = sample();
        let scratch = tempfile::tempdir().unwrap();
        let dir = scratch.path();

        save_results(&metrics, &roster, dir).unwrap();

        for file in ["metrics.json", "conditions.csv", "medications.csv", "age_distribution.csv", "monthly_visits.csv", "issues.csv"] {
            assert!(dir.join(file).exists(), "missing {}", file);
        }

        let conditions = std::fs::read_to_string(dir.join("conditions.csv")).unwrap();
        assert!(conditions.contains("1,Asthma,2,100.0"));

        let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(dir.join("metrics.json")).unwrap()).unwrap();
        assert_eq!(json["totalPatients"], 2);
    }

    #[test]
    fn test_report_mentions_headline_figures() {
        let (metrics, _) = sample();
        let report = render_report(&metrics);

        assert!(report.contains("**Total patients**: 2"));
        assert!(report.contains("**Top condition**: Asthma (2 patients, 100.0%)"));
        assert!(report.contains("**Peak visit month**: Jun (1 visits)"));
        assert!(report.contains("**Largest age group**: 31-50 (1 patients)"));
        assert!(report.contains("- none recorded"));
    }
}
