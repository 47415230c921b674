// 🧾 Amortization Corrector - clears stale arrear counters on paid loans
//
// Scans the installment schedule in order, zeroes every positive
// days_in_arrear, and writes the corrected schedule back in one update.
// The write is attempted at most once per loan: a write the store reports as
// changing nothing means someone else already handled it.

use crate::data_quality::{DataQualityEngine, QualityWarning};
use crate::db::{Installment, Loan, LoanStore};
use crate::error::ReconcileResult;
use serde::Serialize;
use tracing::warn;

// ============================================================================
// CORRECTION RECORD
// ============================================================================

/// Index and prior counter value of one corrected installment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectedInstallment {
    pub index: usize,
    pub prior_days_in_arrear: i64,
}

/// Per-loan record of what the corrector changed. Ephemeral: emitted to the
/// reporting collaborator, never persisted to the loan store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionRecord {
    pub loan_id: String,
    pub corrections: Vec<CorrectedInstallment>,
}

impl CorrectionRecord {
    pub fn summary(&self) -> String {
        format!(
            "loan {}: cleared {} installment(s)",
            self.loan_id,
            self.corrections.len()
        )
    }
}

/// What happened to one candidate loan
#[derive(Debug, Clone, PartialEq)]
pub enum CorrectionOutcome {
    /// Schedule corrected and written back
    Corrected(CorrectionRecord),

    /// Nothing to correct. The selector predicate guarantees candidates have
    /// at least one stale marker, so this branch is defensive, not expected.
    AlreadyCurrent,

    /// The store reported the write changed no record; logged, not retried,
    /// and the loan is excluded from the corrected set
    WriteNoOp,
}

// ============================================================================
// AMORTIZATION CORRECTOR
// ============================================================================

pub struct AmortizationCorrector {
    quality: DataQualityEngine,
}

impl AmortizationCorrector {
    pub fn new(expected_integer_fields: &[String]) -> Self {
        AmortizationCorrector {
            quality: DataQualityEngine::new(expected_integer_fields),
        }
    }

    /// Pure correction pass: corrected schedule + (index, prior value) pairs.
    /// Installments keep their order; only days_in_arrear changes.
    pub fn correct_schedule(loan: &Loan) -> (Vec<Installment>, Vec<CorrectedInstallment>) {
        let mut corrected = Vec::with_capacity(loan.amortization.len());
        let mut changes = Vec::new();

        for (index, installment) in loan.amortization.iter().enumerate() {
            if installment.is_in_arrear() {
                changes.push(CorrectedInstallment {
                    index,
                    prior_days_in_arrear: installment.days_in_arrear,
                });
                corrected.push(installment.cleared());
            } else {
                corrected.push(installment.clone());
            }
        }

        (corrected, changes)
    }

    /// Correct one loan and write the schedule back. Returns the outcome and
    /// the advisory quality warnings found along the way.
    pub fn apply(
        &self,
        store: &dyn LoanStore,
        loan: &Loan,
    ) -> ReconcileResult<(CorrectionOutcome, Vec<QualityWarning>)> {
        let warnings = self.quality.check_loan(loan);
        for warning in &warnings {
            warn!(loan_id = %warning.loan_id, "data quality: {}", warning.summary());
        }

        let (corrected, changes) = Self::correct_schedule(loan);
        if changes.is_empty() {
            return Ok((CorrectionOutcome::AlreadyCurrent, warnings));
        }

        let modified = store.replace_installments(&loan.id, &corrected)?;
        if !modified {
            warn!(
                loan_id = %loan.id,
                "schedule write changed no record, skipping loan (already handled elsewhere)"
            );
            return Ok((CorrectionOutcome::WriteNoOp, warnings));
        }

        Ok((
            CorrectionOutcome::Corrected(CorrectionRecord {
                loan_id: loan.id.clone(),
                corrections: changes,
            }),
            warnings,
        ))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{LoanStatus, SqliteLoanStore};
    use serde_json::{json, Map, Value};

    fn make_installment(days: i64, entries: &[(&str, Value)]) -> Installment {
        Installment {
            days_in_arrear: days,
            fields: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    fn make_loan(id: &str, installments: Vec<Installment>) -> Loan {
        Loan {
            id: id.to_string(),
            financial_entity_id: "entity-1".to_string(),
            user_id: "user-1".to_string(),
            status: LoanStatus::Paid,
            amortization: installments,
            extra: Map::new(),
        }
    }

    fn corrector() -> AmortizationCorrector {
        AmortizationCorrector::new(&["principal".to_string(), "interest".to_string()])
    }

    #[test]
    fn test_correction_clears_only_arrear_counters() {
        let loan = make_loan(
            "loan-1",
            vec![
                make_installment(3, &[("principal", json!(1000)), ("interest", json!(80))]),
                make_installment(0, &[("principal", json!(1000))]),
                make_installment(-2, &[("principal", json!(1000))]),
                make_installment(12, &[("principal", json!(1000))]),
            ],
        );

        let (corrected, changes) = AmortizationCorrector::correct_schedule(&loan);

        assert_eq!(corrected.len(), 4, "length preserved");
        assert_eq!(corrected[0].days_in_arrear, 0);
        assert_eq!(corrected[1].days_in_arrear, 0);
        assert_eq!(
            corrected[2].days_in_arrear, -2,
            "non-positive counters pass through unmodified"
        );
        assert_eq!(corrected[3].days_in_arrear, 0);
        assert_eq!(
            changes,
            vec![
                CorrectedInstallment {
                    index: 0,
                    prior_days_in_arrear: 3
                },
                CorrectedInstallment {
                    index: 3,
                    prior_days_in_arrear: 12
                },
            ]
        );

        // Every other field is untouched, element by element
        for (before, after) in loan.amortization.iter().zip(&corrected) {
            assert_eq!(before.fields, after.fields);
        }
    }

    #[test]
    fn test_correction_is_idempotent() {
        let loan = make_loan("loan-1", vec![make_installment(7, &[])]);

        let (corrected, first) = AmortizationCorrector::correct_schedule(&loan);
        assert_eq!(first.len(), 1);

        let second_pass = Loan {
            amortization: corrected,
            ..loan
        };
        let (unchanged, second) = AmortizationCorrector::correct_schedule(&second_pass);

        assert!(second.is_empty(), "second pass must find nothing to do");
        assert_eq!(unchanged, second_pass.amortization);
        assert!(
            !second_pass.has_arrear_marker(),
            "corrected loan no longer matches the selector predicate"
        );
    }

    #[test]
    fn test_apply_writes_schedule_and_emits_record() {
        let store = SqliteLoanStore::open_in_memory().unwrap();
        let loan = make_loan(
            "loan-1",
            vec![
                make_installment(3, &[("principal", json!(500))]),
                make_installment(0, &[("principal", json!(500))]),
            ],
        );
        store.insert_loans(&[loan.clone()]).unwrap();

        let (outcome, warnings) = corrector().apply(&store, &loan).unwrap();

        assert!(warnings.is_empty());
        match outcome {
            CorrectionOutcome::Corrected(record) => {
                assert_eq!(record.loan_id, "loan-1");
                assert_eq!(record.corrections.len(), 1);
                assert_eq!(record.corrections[0].prior_days_in_arrear, 3);
            }
            other => panic!("expected Corrected, got {other:?}"),
        }

        let stored = store.find_loans_by_user("user-1").unwrap();
        assert!(stored[0].amortization.iter().all(|i| i.days_in_arrear == 0));
        assert_eq!(
            stored[0].amortization[0].fields, loan.amortization[0].fields,
            "write-back must not disturb other fields"
        );
    }

    #[test]
    fn test_apply_skips_already_current_loan() {
        let store = SqliteLoanStore::open_in_memory().unwrap();
        let loan = make_loan("loan-1", vec![make_installment(0, &[])]);
        store.insert_loans(&[loan.clone()]).unwrap();

        let (outcome, _) = corrector().apply(&store, &loan).unwrap();

        assert_eq!(outcome, CorrectionOutcome::AlreadyCurrent);
    }

    #[test]
    fn test_apply_records_write_noop_without_retry() {
        let store = SqliteLoanStore::open_in_memory().unwrap();
        // The loan was never inserted: the write matches no record, the same
        // signal a concurrent run leaves behind
        let loan = make_loan("loan-gone", vec![make_installment(3, &[])]);

        let (outcome, _) = corrector().apply(&store, &loan).unwrap();

        assert_eq!(outcome, CorrectionOutcome::WriteNoOp);
    }

    #[test]
    fn test_quality_warnings_do_not_block_correction() {
        let store = SqliteLoanStore::open_in_memory().unwrap();
        let loan = make_loan(
            "loan-1",
            vec![make_installment(3, &[("interest", json!(10.75))])],
        );
        store.insert_loans(&[loan.clone()]).unwrap();

        let (outcome, warnings) = corrector().apply(&store, &loan).unwrap();

        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "interest");
        assert!(
            matches!(outcome, CorrectionOutcome::Corrected(_)),
            "advisory findings must not block the write"
        );
    }
}
