// 🗄️ Store Layer - loan/user documents and the store-capability abstraction
//
// Loans and users are document-shaped records: a handful of typed fields the
// reconciliation logic depends on, plus an open-shape remainder that must
// survive read/write untouched. In SQLite the typed fields become columns and
// the open-shape parts are kept as JSON text columns.

use crate::error::{ReconcileError, ReconcileResult};
use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

// ============================================================================
// STATUS ENUMS
// ============================================================================

/// Loan lifecycle status as stored in the loan documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Paid,
    Arrear,
    Active,
    /// Any status the reconciliation logic does not distinguish
    #[serde(other)]
    Unknown,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Paid => "paid",
            LoanStatus::Arrear => "arrear",
            LoanStatus::Active => "active",
            LoanStatus::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "paid" => LoanStatus::Paid,
            "arrear" => LoanStatus::Arrear,
            "active" => LoanStatus::Active,
            _ => LoanStatus::Unknown,
        }
    }
}

/// Borrower account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Arrear,
    Active,
    #[serde(other)]
    Unknown,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Arrear => "arrear",
            UserStatus::Active => "active",
            UserStatus::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "arrear" => UserStatus::Arrear,
            "active" => UserStatus::Active,
            _ => UserStatus::Unknown,
        }
    }
}

// ============================================================================
// INSTALLMENT
// ============================================================================

/// One scheduled payment period within a loan's amortization schedule.
///
/// `days_in_arrear` is the only field the corrector is allowed to touch.
/// The remaining monetary/period fields (principal, interest, taxes, pending
/// amounts, ...) are expected to be integers in the minor currency unit but
/// are kept dynamic so that malformed values survive round-trips and can be
/// reported by the advisory data-quality check instead of being rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    /// Days this installment's payment is overdue; zero means current
    #[serde(default)]
    pub days_in_arrear: i64,

    /// All other installment fields, carried through unchanged
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Installment {
    pub fn is_in_arrear(&self) -> bool {
        self.days_in_arrear > 0
    }

    /// Copy of this installment with the arrear counter cleared.
    /// Every other field is carried through unchanged.
    pub fn cleared(&self) -> Installment {
        Installment {
            days_in_arrear: 0,
            fields: self.fields.clone(),
        }
    }
}

// ============================================================================
// LOAN
// ============================================================================

/// Loan document. Owned by the loan store; the reconciliation core holds a
/// transient in-memory copy per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    /// Opaque identity; generated on ingest when the document carries none
    #[serde(default = "default_uuid")]
    pub id: String,

    /// Owning financial entity
    pub financial_entity_id: String,

    /// Borrower reference
    pub user_id: String,

    pub status: LoanStatus,

    /// Ordered installment schedule; order must be preserved on write-back
    #[serde(default)]
    pub amortization: Vec<Installment>,

    /// Remaining document fields, preserved across read/write
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Loan {
    /// True if any installment still carries a stale arrear counter
    pub fn has_arrear_marker(&self) -> bool {
        self.amortization.iter().any(Installment::is_in_arrear)
    }
}

// ============================================================================
// USER (BORROWER)
// ============================================================================

/// Borrower document, shared across all loans referencing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default = "default_uuid")]
    pub id: String,

    pub status: UserStatus,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================================
// STORE CAPABILITY
// ============================================================================

/// Store operations the reconciliation core depends on.
///
/// Constructed once per run and passed explicitly; any failure maps to
/// `ReconcileError::StoreUnavailable` and aborts the run. Writes are
/// independent, non-transactional operations - `false` from a write means the
/// store modified no record (someone else already handled it).
pub trait LoanStore {
    /// Bounded connectivity check
    fn ping(&self) -> ReconcileResult<()>;

    /// All loans owned by the given entities; the selector applies the
    /// candidate predicate on top of this raw fetch
    fn find_loans_by_entities(&self, entity_ids: &[String]) -> ReconcileResult<Vec<Loan>>;

    /// Replace a loan's installment schedule in a single update keyed by id
    fn replace_installments(
        &self,
        loan_id: &str,
        installments: &[Installment],
    ) -> ReconcileResult<bool>;

    fn find_user(&self, user_id: &str) -> ReconcileResult<Option<User>>;

    /// The borrower's entire loan portfolio, not limited to any subset
    fn find_loans_by_user(&self, user_id: &str) -> ReconcileResult<Vec<Loan>>;

    /// Set a borrower's status in a single update keyed by id
    fn update_user_status(&self, user_id: &str, new_status: UserStatus) -> ReconcileResult<bool>;
}

// ============================================================================
// SQLITE IMPLEMENTATION
// ============================================================================

pub struct SqliteLoanStore {
    conn: Connection,
}

impl SqliteLoanStore {
    /// Open (or create) a database file and ensure the schema exists
    pub fn open<P: AsRef<Path>>(path: P) -> ReconcileResult<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(SqliteLoanStore { conn })
    }

    /// In-memory store for tests
    pub fn open_in_memory() -> ReconcileResult<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteLoanStore { conn })
    }

    /// Insert loans, skipping ids already present. Returns (inserted, skipped).
    pub fn insert_loans(&self, loans: &[Loan]) -> ReconcileResult<(usize, usize)> {
        let mut inserted = 0;
        let mut duplicates = 0;

        for loan in loans {
            let amortization_json = serde_json::to_string(&loan.amortization)?;
            let extra_json = serde_json::to_string(&loan.extra)?;

            let result = self.conn.execute(
                "INSERT INTO loans (id, financial_entity_id, user_id, status, amortization, extra)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    loan.id,
                    loan.financial_entity_id,
                    loan.user_id,
                    loan.status.as_str(),
                    amortization_json,
                    extra_json,
                ],
            );

            match result {
                Ok(_) => inserted += 1,
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    duplicates += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok((inserted, duplicates))
    }

    /// Insert users, skipping ids already present. Returns (inserted, skipped).
    pub fn insert_users(&self, users: &[User]) -> ReconcileResult<(usize, usize)> {
        let mut inserted = 0;
        let mut duplicates = 0;

        for user in users {
            let extra_json = serde_json::to_string(&user.extra)?;

            let result = self.conn.execute(
                "INSERT INTO users (id, status, extra) VALUES (?1, ?2, ?3)",
                params![user.id, user.status.as_str(), extra_json],
            );

            match result {
                Ok(_) => inserted += 1,
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    duplicates += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok((inserted, duplicates))
    }

    pub fn loan_count(&self) -> ReconcileResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM loans", [], |row| row.get(0))?;
        Ok(count)
    }

    fn collect_loans(&self, sql: &str, bind: &[&str]) -> ReconcileResult<Vec<Loan>> {
        let mut stmt = self.conn.prepare(sql)?;

        let rows = stmt
            .query_map(params_from_iter(bind.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;

        let mut loans = Vec::with_capacity(rows.len());
        for (id, financial_entity_id, user_id, status, amortization_json, extra_json) in rows {
            let amortization: Vec<Installment> = serde_json::from_str(&amortization_json)?;
            let extra: Map<String, Value> = match extra_json {
                Some(json) => serde_json::from_str(&json)?,
                None => Map::new(),
            };

            loans.push(Loan {
                id,
                financial_entity_id,
                user_id,
                status: LoanStatus::parse(&status),
                amortization,
                extra,
            });
        }

        Ok(loans)
    }
}

impl LoanStore for SqliteLoanStore {
    fn ping(&self) -> ReconcileResult<()> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn find_loans_by_entities(&self, entity_ids: &[String]) -> ReconcileResult<Vec<Loan>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; entity_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, financial_entity_id, user_id, status, amortization, extra
             FROM loans
             WHERE financial_entity_id IN ({placeholders})
             ORDER BY id"
        );

        let bind: Vec<&str> = entity_ids.iter().map(String::as_str).collect();
        self.collect_loans(&sql, &bind)
    }

    fn replace_installments(
        &self,
        loan_id: &str,
        installments: &[Installment],
    ) -> ReconcileResult<bool> {
        let schedule_json = serde_json::to_string(installments)?;

        // The guard makes a write that changes nothing report zero modified
        // records - the concurrent-modification case of the store contract
        let modified = self.conn.execute(
            "UPDATE loans SET amortization = ?1 WHERE id = ?2 AND amortization <> ?1",
            params![schedule_json, loan_id],
        )?;

        Ok(modified > 0)
    }

    fn find_user(&self, user_id: &str) -> ReconcileResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, status, extra FROM users WHERE id = ?1")?;

        let row = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .next();

        match row {
            None => Ok(None),
            Some(result) => {
                let (id, status, extra_json) = result.map_err(ReconcileError::from)?;
                let extra: Map<String, Value> = match extra_json {
                    Some(json) => serde_json::from_str(&json)?,
                    None => Map::new(),
                };

                Ok(Some(User {
                    id,
                    status: UserStatus::parse(&status),
                    extra,
                }))
            }
        }
    }

    fn find_loans_by_user(&self, user_id: &str) -> ReconcileResult<Vec<Loan>> {
        self.collect_loans(
            "SELECT id, financial_entity_id, user_id, status, amortization, extra
             FROM loans
             WHERE user_id = ?1
             ORDER BY id",
            &[user_id],
        )
    }

    fn update_user_status(&self, user_id: &str, new_status: UserStatus) -> ReconcileResult<bool> {
        let modified = self.conn.execute(
            "UPDATE users SET status = ?1 WHERE id = ?2 AND status <> ?1",
            params![new_status.as_str(), user_id],
        )?;

        Ok(modified > 0)
    }
}

pub fn setup_database(conn: &Connection) -> ReconcileResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS loans (
            id TEXT PRIMARY KEY,
            financial_entity_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            status TEXT NOT NULL,
            amortization TEXT NOT NULL,
            extra TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            extra TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_loans_entity ON loans(financial_entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_loans_user ON loans(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_loans_status ON loans(status)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// SEED FILE (JSON import)
// ============================================================================

/// Shape of the JSON seed/import file: {"loans": [...], "users": [...]}
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub loans: Vec<Loan>,

    #[serde(default)]
    pub users: Vec<User>,
}

pub fn load_seed_file(path: &Path) -> Result<SeedFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {path:?}"))?;

    let seed: SeedFile = serde_json::from_str(&content).context("Failed to parse seed JSON")?;

    Ok(seed)
}

// ============================================================================
// TESTS
// ============================================================================
