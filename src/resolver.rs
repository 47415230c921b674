// 👤 User Status Resolver - re-derives borrower status from the loan portfolio
//
// A borrower flagged in arrear is promoted to active only when the corrected
// loan population justifies it: either the borrower holds exactly one loan,
// or none of the borrower's loans is still in arrear. A borrower with several
// loans stays flagged while any one of them is delinquent - clearing stale
// amortization markers on one loan is not proof the whole relationship is
// current.

use crate::db::{Loan, LoanStatus, LoanStore, UserStatus};
use crate::error::ReconcileResult;
use serde::Serialize;
use tracing::warn;

// ============================================================================
// STATUS DECISION
// ============================================================================

/// Why a borrower was or was not promoted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecisionReason {
    /// Borrower referenced by a loan but absent from the user store
    UserNotFound,

    /// Borrower was not flagged in arrear; nothing to promote
    StatusNotArrear,

    /// Exactly one loan in the portfolio
    SingleLoan,

    /// Several loans, none still in arrear
    NoLoansInArrear,

    /// Several loans, at least one still in arrear
    SomeLoansInArrear,

    /// Promotion write changed no record; someone else already handled it
    WriteNoOp,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::UserNotFound => "user not found",
            DecisionReason::StatusNotArrear => "status not arrear",
            DecisionReason::SingleLoan => "single loan",
            DecisionReason::NoLoansInArrear => "no loans in arrear",
            DecisionReason::SomeLoansInArrear => "multiple loans, some in arrear",
            DecisionReason::WriteNoOp => "status write reported no change",
        }
    }
}

/// Per-borrower record of the promotion decision. Ephemeral: emitted to the
/// reporting collaborator, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusDecision {
    pub user_id: String,

    /// Status observed before the decision; None when the user was not found
    pub prior_status: Option<UserStatus>,

    /// Some(new status) when the borrower was promoted, None when unchanged
    pub new_status: Option<UserStatus>,

    pub reason: DecisionReason,
}

impl StatusDecision {
    pub fn promoted(&self) -> bool {
        self.new_status.is_some()
    }

    pub fn summary(&self) -> String {
        match self.new_status {
            Some(status) => format!(
                "user {}: promoted to {} ({})",
                self.user_id,
                status.as_str(),
                self.reason.as_str()
            ),
            None => format!("user {}: unchanged ({})", self.user_id, self.reason.as_str()),
        }
    }
}

// ============================================================================
// USER STATUS RESOLVER
// ============================================================================

#[derive(Debug, Default)]
pub struct UserStatusResolver;

impl UserStatusResolver {
    pub fn new() -> Self {
        UserStatusResolver
    }

    /// Decide and apply the status for every borrower id given, in order.
    /// Ids are expected deduplicated (the run orchestrator guarantees it).
    pub fn resolve(
        &self,
        store: &dyn LoanStore,
        user_ids: &[String],
    ) -> ReconcileResult<Vec<StatusDecision>> {
        let mut decisions = Vec::with_capacity(user_ids.len());

        for user_id in user_ids {
            decisions.push(self.resolve_user(store, user_id)?);
        }

        Ok(decisions)
    }

    /// Decide one borrower: look up the user, inspect the entire portfolio,
    /// and write the promotion when the rule allows it.
    pub fn resolve_user(
        &self,
        store: &dyn LoanStore,
        user_id: &str,
    ) -> ReconcileResult<StatusDecision> {
        let user = match store.find_user(user_id)? {
            Some(user) => user,
            None => {
                return Ok(StatusDecision {
                    user_id: user_id.to_string(),
                    prior_status: None,
                    new_status: None,
                    reason: DecisionReason::UserNotFound,
                });
            }
        };

        if user.status != UserStatus::Arrear {
            return Ok(StatusDecision {
                user_id: user.id,
                prior_status: Some(user.status),
                new_status: None,
                reason: DecisionReason::StatusNotArrear,
            });
        }

        // The whole portfolio, not just the loans corrected this run
        let portfolio = store.find_loans_by_user(user_id)?;
        let (promote, reason) = promotion_decision(&portfolio);

        if !promote {
            return Ok(StatusDecision {
                user_id: user.id,
                prior_status: Some(user.status),
                new_status: None,
                reason,
            });
        }

        let modified = store.update_user_status(user_id, UserStatus::Active)?;
        if !modified {
            warn!(
                user_id = %user_id,
                "status write changed no record, skipping user (already handled elsewhere)"
            );
            return Ok(StatusDecision {
                user_id: user.id,
                prior_status: Some(user.status),
                new_status: None,
                reason: DecisionReason::WriteNoOp,
            });
        }

        Ok(StatusDecision {
            user_id: user.id,
            prior_status: Some(user.status),
            new_status: Some(UserStatus::Active),
            reason,
        })
    }
}

/// Promotion rule over the borrower's entire portfolio: promote iff the
/// borrower holds exactly one loan, or no loan is still in arrear.
fn promotion_decision(portfolio: &[Loan]) -> (bool, DecisionReason) {
    if portfolio.len() == 1 {
        return (true, DecisionReason::SingleLoan);
    }

    let in_arrear = portfolio
        .iter()
        .filter(|loan| loan.status == LoanStatus::Arrear)
        .count();

    if in_arrear == 0 {
        (true, DecisionReason::NoLoansInArrear)
    } else {
        (false, DecisionReason::SomeLoansInArrear)
    }
}

// ============================================================================
// TESTS
// ============================================================================
