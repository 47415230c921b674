// 📊 Report Sinks - hand the run output to external collaborators
//
// The run report (four counters + correction records + status decisions) is
// the entire contract. What a collaborator does with it - log lines, CSV
// dumps, a metrics endpoint - is its own business; sinks here are the thin
// in-process ones the CLI uses.

use crate::reconciliation::ReconciliationReport;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Consumer of one finished run's output
pub trait ReportSink {
    fn publish(&self, report: &ReconciliationReport) -> Result<()>;
}

// ============================================================================
// CONSOLE SINK
// ============================================================================

/// Emits the report as structured log lines
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ReportSink for ConsoleSink {
    fn publish(&self, report: &ReconciliationReport) -> Result<()> {
        info!("{}", report.summary_line());

        for record in &report.corrections {
            info!("{}", record.summary());
        }
        for decision in &report.decisions {
            info!("{}", decision.summary());
        }
        for warning in &report.warnings {
            info!("data quality: {}", warning.summary());
        }

        Ok(())
    }
}

// ============================================================================
// CSV EXPORTER
// ============================================================================

/// Writes corrections.csv, decisions.csv and summary.csv into a directory
pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        CsvExporter {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    fn write_corrections(&self, report: &ReconciliationReport) -> Result<()> {
        let path = self.output_dir.join("corrections.csv");
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {path:?}"))?;

        writer.write_record(["loan_id", "installment_index", "prior_days_in_arrear"])?;
        for record in &report.corrections {
            for correction in &record.corrections {
                writer.write_record([
                    record.loan_id.clone(),
                    correction.index.to_string(),
                    correction.prior_days_in_arrear.to_string(),
                ])?;
            }
        }

        writer.flush().context("Failed to flush corrections.csv")?;
        Ok(())
    }

    fn write_decisions(&self, report: &ReconciliationReport) -> Result<()> {
        let path = self.output_dir.join("decisions.csv");
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {path:?}"))?;

        writer.write_record(["user_id", "prior_status", "new_status", "reason"])?;
        for decision in &report.decisions {
            writer.write_record([
                decision.user_id.as_str(),
                decision.prior_status.map(|s| s.as_str()).unwrap_or(""),
                decision.new_status.map(|s| s.as_str()).unwrap_or(""),
                decision.reason.as_str(),
            ])?;
        }

        writer.flush().context("Failed to flush decisions.csv")?;
        Ok(())
    }

    fn write_summary(&self, report: &ReconciliationReport) -> Result<()> {
        let path = self.output_dir.join("summary.csv");
        let mut writer = csv::Writer::from_path(&path)
            .with_context(|| format!("Failed to create {path:?}"))?;

        writer.write_record([
            "loans_selected",
            "loans_corrected",
            "borrowers_evaluated",
            "borrowers_promoted",
            "completed_at",
        ])?;
        writer.write_record([
            report.summary.loans_selected.to_string(),
            report.summary.loans_corrected.to_string(),
            report.summary.borrowers_evaluated.to_string(),
            report.summary.borrowers_promoted.to_string(),
            report.completed_at.to_rfc3339(),
        ])?;

        writer.flush().context("Failed to flush summary.csv")?;
        Ok(())
    }
}

impl ReportSink for CsvExporter {
    fn publish(&self, report: &ReconciliationReport) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Failed to create export dir {:?}", self.output_dir))?;

        self.write_corrections(report)?;
        self.write_decisions(report)?;
        self.write_summary(report)?;

        info!(dir = %self.output_dir.display(), "report exported");
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corrector::{CorrectedInstallment, CorrectionRecord};
    use crate::db::UserStatus;
    use crate::reconciliation::RunSummary;
    use crate::resolver::{DecisionReason, StatusDecision};
    use chrono::Utc;

    fn sample_report() -> ReconciliationReport {
        ReconciliationReport {
            summary: RunSummary {
                loans_selected: 2,
                loans_corrected: 1,
                borrowers_evaluated: 1,
                borrowers_promoted: 1,
            },
            corrections: vec![CorrectionRecord {
                loan_id: "loan-1".to_string(),
                corrections: vec![
                    CorrectedInstallment {
                        index: 0,
                        prior_days_in_arrear: 3,
                    },
                    CorrectedInstallment {
                        index: 4,
                        prior_days_in_arrear: 11,
                    },
                ],
            }],
            decisions: vec![StatusDecision {
                user_id: "user-1".to_string(),
                prior_status: Some(UserStatus::Arrear),
                new_status: Some(UserStatus::Active),
                reason: DecisionReason::SingleLoan,
            }],
            warnings: Vec::new(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_console_sink_accepts_report() {
        ConsoleSink.publish(&sample_report()).unwrap();
    }

    #[test]
    fn test_csv_exporter_writes_all_files() {
        let dir = std::env::temp_dir().join(format!("reconciler-test-{}", uuid::Uuid::new_v4()));
        let exporter = CsvExporter::new(&dir);

        exporter.publish(&sample_report()).unwrap();

        let corrections = std::fs::read_to_string(dir.join("corrections.csv")).unwrap();
        assert!(corrections.starts_with("loan_id,installment_index,prior_days_in_arrear"));
        assert_eq!(
            corrections.lines().count(),
            3,
            "header plus one row per corrected installment"
        );
        assert!(corrections.contains("loan-1,4,11"));

        let decisions = std::fs::read_to_string(dir.join("decisions.csv")).unwrap();
        assert!(decisions.contains("user-1,arrear,active,single loan"));

        let summary = std::fs::read_to_string(dir.join("summary.csv")).unwrap();
        assert!(summary.contains("2,1,1,1"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
