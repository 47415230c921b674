// ⚖️ Reconciliation Run - selector → corrector → resolver over one batch
//
// One run is strictly sequential: select the arrear-but-paid candidates,
// correct each schedule, then re-derive the status of every borrower touched
// (deduplicated, first-touch order). The run produces the whole output
// contract at once - counts, correction records, status decisions - and never
// exposes partial results mid-flight.

use crate::config::ReconcilerConfig;
use crate::corrector::{AmortizationCorrector, CorrectionOutcome, CorrectionRecord};
use crate::data_quality::QualityWarning;
use crate::db::LoanStore;
use crate::error::ReconcileResult;
use crate::resolver::{StatusDecision, UserStatusResolver};
use crate::selector::LoanSelector;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

// ============================================================================
// RUN SUMMARY
// ============================================================================

/// The four counters handed to reporting/metrics collaborators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub loans_selected: usize,
    pub loans_corrected: usize,
    pub borrowers_evaluated: usize,
    pub borrowers_promoted: usize,
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

/// Full output of one run. Derived records are ephemeral: held for the
/// duration of the run, then handed to the reporting sink and discarded.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub summary: RunSummary,
    pub corrections: Vec<CorrectionRecord>,
    pub decisions: Vec<StatusDecision>,
    pub warnings: Vec<QualityWarning>,
    pub completed_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn summary_line(&self) -> String {
        format!(
            "loans selected: {}, corrected: {}, borrowers evaluated: {}, promoted: {}",
            self.summary.loans_selected,
            self.summary.loans_corrected,
            self.summary.borrowers_evaluated,
            self.summary.borrowers_promoted
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    selector: LoanSelector,
    corrector: AmortizationCorrector,
    resolver: UserStatusResolver,
}

impl ReconciliationEngine {
    /// Build the engine for one run. Fails fast on the configuration
    /// preconditions; a run that cannot start performs no work at all.
    pub fn new(config: &ReconcilerConfig) -> ReconcileResult<Self> {
        config.validate()?;

        Ok(ReconciliationEngine {
            selector: LoanSelector::new(config)?,
            corrector: AmortizationCorrector::new(&config.expected_integer_fields),
            resolver: UserStatusResolver::new(),
        })
    }

    /// Execute one full reconciliation batch against the store
    pub fn run(&self, store: &dyn LoanStore) -> ReconcileResult<ReconciliationReport> {
        let candidates = self.selector.select(store)?;
        info!(count = candidates.len(), "candidate loans selected");

        let mut corrections = Vec::new();
        let mut warnings = Vec::new();
        let mut touched_users = Vec::new();
        let mut seen_users = HashSet::new();

        for loan in &candidates {
            let (outcome, loan_warnings) = self.corrector.apply(store, loan)?;
            warnings.extend(loan_warnings);

            if let CorrectionOutcome::Corrected(record) = outcome {
                info!(loan_id = %loan.id, "{}", record.summary());
                corrections.push(record);

                // Borrowers are enumerated from actually-corrected loans,
                // deduplicated in first-touch order
                if seen_users.insert(loan.user_id.clone()) {
                    touched_users.push(loan.user_id.clone());
                }
            }
        }

        let decisions = self.resolver.resolve(store, &touched_users)?;
        for decision in &decisions {
            info!(user_id = %decision.user_id, "{}", decision.summary());
        }

        let summary = RunSummary {
            loans_selected: candidates.len(),
            loans_corrected: corrections.len(),
            borrowers_evaluated: decisions.len(),
            borrowers_promoted: decisions.iter().filter(|d| d.promoted()).count(),
        };

        let report = ReconciliationReport {
            summary,
            corrections,
            decisions,
            warnings,
            completed_at: Utc::now(),
        };
        info!("run complete: {}", report.summary_line());

        Ok(report)
    }
}

// ============================================================================
// TESTS
// ============================================================================
