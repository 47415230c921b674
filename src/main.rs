use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use loan_reconciler::{
    load_seed_file, CsvExporter, LoanStore, ReconcilerConfig, ReconciliationEngine, ReportSink,
    SqliteLoanStore,
};

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("probe") => run_probe(),
        Some("import") => {
            let path = args
                .get(2)
                .context("Usage: loan-reconciler import <seed.json>")?;
            run_import(Path::new(path))
        }
        Some("run") | None => run_reconciliation(),
        Some(other) => {
            eprintln!("❌ Unknown command: {other}");
            eprintln!("   Usage: loan-reconciler [run|probe|import <seed.json>]");
            std::process::exit(2);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,loan_reconciler=debug")),
        )
        .init();
}

/// Connectivity check: open the store and ping it
fn run_probe() -> Result<()> {
    let config = ReconcilerConfig::from_env()?;

    println!("🔗 Probing store at {:?}...", config.database_path);
    let store = SqliteLoanStore::open(&config.database_path)?;
    store.ping()?;
    println!("✅ Store connection OK");

    Ok(())
}

/// Load a JSON seed file ({"loans": [...], "users": [...]}) into the store
fn run_import(path: &Path) -> Result<()> {
    let config = ReconcilerConfig::from_env()?;

    println!("📂 Loading seed file {path:?}...");
    let seed = load_seed_file(path)?;
    println!(
        "✓ Parsed {} loans, {} users",
        seed.loans.len(),
        seed.users.len()
    );

    let store = SqliteLoanStore::open(&config.database_path)?;

    let (loans_inserted, loans_skipped) = store.insert_loans(&seed.loans)?;
    let (users_inserted, users_skipped) = store.insert_users(&seed.users)?;

    println!("💾 Inserted {loans_inserted} loans ({loans_skipped} duplicates skipped)");
    println!("💾 Inserted {users_inserted} users ({users_skipped} duplicates skipped)");
    println!("✅ Import complete: {} loans in store", store.loan_count()?);

    Ok(())
}

/// One full reconciliation batch over the configured entities
fn run_reconciliation() -> Result<()> {
    let config = ReconcilerConfig::from_env()?;

    println!("⚖️  Loan arrear reconciliation");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("🔧 Entities in scope: {}", config.entity_ids.join(", "));

    let store = SqliteLoanStore::open(&config.database_path)?;
    store.ping()?;

    let engine = ReconciliationEngine::new(&config)?;
    let report = engine.run(&store)?;

    println!("\n📊 {}", report.summary_line());
    for warning in &report.warnings {
        println!("⚠️  {}", warning.summary());
    }

    // Optional CSV hand-off for downstream collaborators
    if let Ok(dir) = env::var("RECONCILER_EXPORT_DIR") {
        let exporter = CsvExporter::new(&dir);
        exporter.publish(&report)?;
        println!("📁 Report exported to {dir}");
    }

    println!("\n✅ Reconciliation run complete");
    Ok(())
}
