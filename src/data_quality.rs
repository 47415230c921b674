// ✅ Data Quality - advisory type check over installment fields
//
// Monetary fields are supposed to be integers in the minor currency unit, but
// the loan documents occasionally arrive with doubles (2500.0, or worse,
// 2500.5). The check reports them; it never blocks a correction.

use crate::db::Loan;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// QUALITY WARNING
// ============================================================================

/// One expected-integer field found holding something else. Advisory only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityWarning {
    pub loan_id: String,
    pub installment_index: usize,
    pub field: String,
    pub value: Value,
}

impl QualityWarning {
    pub fn summary(&self) -> String {
        format!(
            "loan {} installment {}: field '{}' expected integer, found {}",
            self.loan_id, self.installment_index, self.field, self.value
        )
    }
}

// ============================================================================
// DATA QUALITY ENGINE
// ============================================================================

pub struct DataQualityEngine {
    /// Fields checked on every installment
    expected_integer_fields: Vec<String>,
}

impl DataQualityEngine {
    pub fn new(expected_integer_fields: &[String]) -> Self {
        DataQualityEngine {
            expected_integer_fields: expected_integer_fields.to_vec(),
        }
    }

    /// Scan a loan's schedule for expected-integer fields holding
    /// non-integral values. Missing fields are not findings.
    pub fn check_loan(&self, loan: &Loan) -> Vec<QualityWarning> {
        let mut warnings = Vec::new();

        for (index, installment) in loan.amortization.iter().enumerate() {
            for field in &self.expected_integer_fields {
                let Some(value) = installment.fields.get(field) else {
                    continue;
                };

                if !is_integral(value) {
                    warnings.push(QualityWarning {
                        loan_id: loan.id.clone(),
                        installment_index: index,
                        field: field.clone(),
                        value: value.clone(),
                    });
                }
            }
        }

        warnings
    }
}

/// A value counts as integral only when it is a number the document encodes
/// as an integer. 2500.0 is a double in the document and gets flagged.
fn is_integral(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::Null => true, // absent-by-null is not a type finding
        _ => false,
    }
}

// ============================================================================
// TESTS
// ============================================================================
