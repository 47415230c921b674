// ⚙️ Run Configuration - environment-driven settings for one reconciliation run
//
// Variables (a .env file is honored when the binary loads it):
//   RECONCILER_DB             path to the SQLite database (default: reconciler.db)
//   RECONCILER_ENTITY_IDS     comma-separated owning-entity ids (REQUIRED, non-empty)
//   RECONCILER_INTEGER_FIELDS optional override of the advisory integer field list

use crate::error::{ReconcileError, ReconcileResult};
use std::env;
use std::path::PathBuf;

/// Installment fields expected to hold integers in the minor currency unit.
/// Used only by the advisory data-quality check.
pub const DEFAULT_INTEGER_FIELDS: &[&str] = &[
    "principal",
    "interest",
    "tax",
    "commission",
    "total_amount",
    "payment_amount",
    "pending_principal",
    "pending_interest",
    "pending_tax",
    "pending_commission",
    "pending_payment",
    "paid_principal",
    "paid_interest",
    "paid_tax",
    "paid_commission",
    "paid_amount",
    "capital_balance",
    "arrear_amount",
    "arrear_interest",
    "late_fee",
];

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Owning-entity ids whose loans are eligible for reconciliation.
    /// Empty is a fatal precondition - the run must refuse to start.
    pub entity_ids: Vec<String>,

    /// Installment fields checked by the advisory integer validation
    pub expected_integer_fields: Vec<String>,

    /// SQLite database path (binary concern; unused by the core itself)
    pub database_path: PathBuf,
}

impl ReconcilerConfig {
    /// Build a config for the given entity ids with the default field list
    pub fn new<I, S>(entity_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ReconcilerConfig {
            entity_ids: entity_ids.into_iter().map(Into::into).collect(),
            expected_integer_fields: DEFAULT_INTEGER_FIELDS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            database_path: PathBuf::from("reconciler.db"),
        }
    }

    /// Read configuration from the process environment
    pub fn from_env() -> ReconcileResult<Self> {
        let entity_ids = env::var("RECONCILER_ENTITY_IDS")
            .map(|raw| split_csv(&raw))
            .unwrap_or_default();

        let expected_integer_fields = env::var("RECONCILER_INTEGER_FIELDS")
            .map(|raw| split_csv(&raw))
            .unwrap_or_else(|_| {
                DEFAULT_INTEGER_FIELDS
                    .iter()
                    .map(|s| (*s).to_string())
                    .collect()
            });

        let database_path = env::var("RECONCILER_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("reconciler.db"));

        let config = ReconcilerConfig {
            entity_ids,
            expected_integer_fields,
            database_path,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check the fatal preconditions
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.entity_ids.iter().all(|id| id.trim().is_empty()) {
            return Err(ReconcileError::Configuration(
                "RECONCILER_ENTITY_IDS is empty: refusing to reconcile an unscoped loan population"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_carries_default_fields() {
        let config = ReconcilerConfig::new(["entity-1", "entity-2"]);

        assert_eq!(config.entity_ids, vec!["entity-1", "entity-2"]);
        assert_eq!(
            config.expected_integer_fields.len(),
            DEFAULT_INTEGER_FIELDS.len()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_entity_set_is_fatal() {
        let config = ReconcilerConfig::new(Vec::<String>::new());

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ReconcileError::Configuration(_)));
    }

    #[test]
    fn test_blank_entity_ids_are_fatal_too() {
        let config = ReconcilerConfig::new(["", "   "]);

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_csv_trims_and_drops_empties() {
        assert_eq!(
            split_csv(" a , b ,, c "),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(split_csv("").is_empty());
    }
}
