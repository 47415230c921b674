// 🔍 Loan Selector - picks the arrear-but-paid candidates
//
// A candidate is a loan that is fully paid, belongs to one of the configured
// owning entities, and still carries a stale days_in_arrear marker on at
// least one installment. The predicate is a pure filter; the store only
// narrows by entity.

use crate::config::ReconcilerConfig;
use crate::db::{Loan, LoanStatus, LoanStore};
use crate::error::{ReconcileError, ReconcileResult};
use std::collections::HashSet;

// ============================================================================
// SELECTOR
// ============================================================================

#[derive(Debug)]
pub struct LoanSelector {
    entity_ids: Vec<String>,
    entity_set: HashSet<String>,
}

impl LoanSelector {
    /// Build a selector scoped to the configured owning entities.
    /// An empty entity set is a fatal precondition, not an empty result.
    pub fn new(config: &ReconcilerConfig) -> ReconcileResult<Self> {
        let entity_ids: Vec<String> = config
            .entity_ids
            .iter()
            .filter(|id| !id.trim().is_empty())
            .cloned()
            .collect();

        if entity_ids.is_empty() {
            return Err(ReconcileError::Configuration(
                "loan selector requires a non-empty owning-entity set".to_string(),
            ));
        }

        let entity_set = entity_ids.iter().cloned().collect();
        Ok(LoanSelector {
            entity_ids,
            entity_set,
        })
    }

    /// The candidate predicate: paid + configured entity + stale marker
    pub fn matches(&self, loan: &Loan) -> bool {
        loan.status == LoanStatus::Paid
            && self.entity_set.contains(&loan.financial_entity_id)
            && loan.has_arrear_marker()
    }

    /// Fetch the scoped loan population and keep the candidates.
    /// Pure filter over the store's raw fetch; no side effects.
    pub fn select(&self, store: &dyn LoanStore) -> ReconcileResult<Vec<Loan>> {
        let mut loans = store.find_loans_by_entities(&self.entity_ids)?;
        loans.retain(|loan| self.matches(loan));
        Ok(loans)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Installment, SqliteLoanStore};
    use serde_json::Map;

    fn make_loan(id: &str, entity: &str, status: LoanStatus, arrear_days: &[i64]) -> Loan {
        Loan {
            id: id.to_string(),
            financial_entity_id: entity.to_string(),
            user_id: "user-1".to_string(),
            status,
            amortization: arrear_days
                .iter()
                .map(|days| Installment {
                    days_in_arrear: *days,
                    fields: Map::new(),
                })
                .collect(),
            extra: Map::new(),
        }
    }

    fn selector() -> LoanSelector {
        LoanSelector::new(&ReconcilerConfig::new(["entity-1"])).unwrap()
    }

    #[test]
    fn test_empty_entity_set_refuses_to_run() {
        let config = ReconcilerConfig::new(Vec::<String>::new());

        let err = LoanSelector::new(&config).unwrap_err();
        assert!(matches!(err, ReconcileError::Configuration(_)));
    }

    #[test]
    fn test_paid_loan_with_stale_marker_matches() {
        let loan = make_loan("loan-1", "entity-1", LoanStatus::Paid, &[5, 0]);
        assert!(selector().matches(&loan));
    }

    #[test]
    fn test_active_loan_does_not_match() {
        let loan = make_loan("loan-1", "entity-1", LoanStatus::Active, &[5, 0]);
        assert!(!selector().matches(&loan));
    }

    #[test]
    fn test_all_current_schedule_does_not_match() {
        let loan = make_loan("loan-1", "entity-1", LoanStatus::Paid, &[0, 0]);
        assert!(!selector().matches(&loan));
    }

    #[test]
    fn test_foreign_entity_does_not_match() {
        let loan = make_loan("loan-1", "entity-9", LoanStatus::Paid, &[5]);
        assert!(!selector().matches(&loan));
    }

    #[test]
    fn test_select_filters_store_population() {
        let store = SqliteLoanStore::open_in_memory().unwrap();
        store
            .insert_loans(&[
                make_loan("loan-1", "entity-1", LoanStatus::Paid, &[3, 0]),
                make_loan("loan-2", "entity-1", LoanStatus::Arrear, &[3]),
                make_loan("loan-3", "entity-1", LoanStatus::Paid, &[0]),
                make_loan("loan-4", "entity-9", LoanStatus::Paid, &[3]),
            ])
            .unwrap();

        let candidates = selector().select(&store).unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "loan-1");
    }
}
