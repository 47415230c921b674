// Loan Arrear Reconciliation - Core Library
// Exposes all modules for use in the CLI and tests

pub mod config;
pub mod corrector;
pub mod data_quality;
pub mod db;
pub mod error;
pub mod reconciliation;
pub mod report;
pub mod resolver;
pub mod selector;

// Re-export commonly used types
pub use config::{ReconcilerConfig, DEFAULT_INTEGER_FIELDS};
pub use corrector::{
    AmortizationCorrector, CorrectedInstallment, CorrectionOutcome, CorrectionRecord,
};
pub use data_quality::{DataQualityEngine, QualityWarning};
pub use db::{
    load_seed_file, setup_database, Installment, Loan, LoanStatus, LoanStore, SeedFile,
    SqliteLoanStore, User, UserStatus,
};
pub use error::{ReconcileError, ReconcileResult};
pub use reconciliation::{ReconciliationEngine, ReconciliationReport, RunSummary};
pub use report::{ConsoleSink, CsvExporter, ReportSink};
pub use resolver::{DecisionReason, StatusDecision, UserStatusResolver};
pub use selector::LoanSelector;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
