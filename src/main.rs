mod analytics;
mod config;
mod docgen;
mod extract;
mod history;
mod model;
mod normalize;
mod recon;
mod state;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::Path;
use tracing::{info, warn};

use crate::extract::SyncInput;
use crate::model::TransactionType;
use crate::state::LedgerState;

const CONFIG_PATH: &str = ".config/ledger_sync.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter("info")
        .init();

    let cfg = config::Config::load_or_default(CONFIG_PATH);
    let mut state = LedgerState::seeded();

    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    // Challan generation is opt-in, matching the explicit user action it
    // maps to.
    let challan = raw_args.iter().any(|a| a == "--challan");
    let args: Vec<&String> = raw_args.iter().filter(|a| !a.starts_with("--")).collect();

    match args.first().map(|s| s.as_str()) {
        Some("text") => {
            let note = args.get(1).ok_or("usage: ledger_sync text \"<note>\" [--challan]")?;
            run_sync(&mut state, &cfg, SyncInput::Text((*note).clone()), false, challan).await?;
        }
        Some("file") => {
            let path = args.get(1).ok_or("usage: ledger_sync file <path> [--challan]")?;
            let input = read_document(path)?;
            run_sync(&mut state, &cfg, input, false, challan).await?;
        }
        Some("bulk") => {
            let path = args.get(1).ok_or("usage: ledger_sync bulk <path>")?;
            let input = read_document(path)?;
            run_sync(&mut state, &cfg, input, true, false).await?;
        }
        Some("reset") => {
            reset_ledger(&mut state)?;
        }
        _ => {
            eprintln!(
                "usage: ledger_sync <text \"<note>\" | file <path> | bulk <path> | reset> [--challan]"
            );
            std::process::exit(2);
        }
    }

    Ok(())
}

/// One full sync cycle: claim the sync slot, call the engine, reconcile,
/// and report effects plus recomputed analytics.
async fn run_sync(
    state: &mut LedgerState,
    cfg: &config::Config,
    input: SyncInput,
    bulk: bool,
    challan: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    state.begin_sync()?;

    let client = reqwest::Client::new();
    let context = sync_context(state, bulk);
    let mut result = extract::process_ledger_input(&client, &cfg.llm, &input, &context).await;

    // Bulk uploads are always stock-in, whatever the engine decided.
    if bulk {
        result.transaction_type = TransactionType::Purchase;
    }

    let now = chrono::Utc::now();
    state.apply_sync(result, now.timestamp_millis(), &now.to_rfc3339());
    state.finish_sync();

    let report = state.last_sync.as_ref().ok_or("sync produced no report")?;
    info!(summary = %report.result.summary, "Sync complete");
    for alert in &report.result.alerts {
        warn!(alert = %alert, "Engine alert");
    }
    for item in &report.affected {
        info!(
            sku = %item.sku,
            previous = item.previous_stock,
            current = item.new_stock,
            shift = item.new_stock - item.previous_stock,
            "Stock shift"
        );
    }

    // Delivery challan only on request, and only for a completed sale.
    if challan && report.result.transaction_type == TransactionType::Sale {
        if let Some(who) = report.result.customer_info.clone() {
            let customer = state
                .customers
                .iter()
                .find(|c| crate::normalize::eq_fold(&c.name, &who.name));
            if let Some(customer) = customer {
                let items = docgen::challan_items(customer, &state.inventory);
                let markdown =
                    docgen::generate_challan_markdown(&client, &cfg.llm, &customer.name, &items)
                        .await;
                println!("{markdown}");
            }
        }
    }

    let analytics = analytics::compute(&state.inventory, &state.customers);
    info!(
        inventory_value = analytics.total_inventory_value,
        low_stock = analytics.low_stock_count,
        total_sales = analytics.total_sales,
        top_product = analytics.top_product.as_ref().map(|p| p.sku.as_str()).unwrap_or("n/a"),
        "Dashboard analytics"
    );

    Ok(())
}

/// What the engine sees next to the input. A bulk upload replaces the
/// inventory context with the bulk-mode marker: the engine should read the
/// whole sheet as a stock-in, not match against current records.
fn sync_context(state: &LedgerState, bulk: bool) -> String {
    if bulk {
        "MODE: BULK_SYNC".to_string()
    } else {
        state.context_json()
    }
}

/// Read a document from disk and package it for the engine.
fn read_document(path: &str) -> Result<SyncInput, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)?;
    let mime_type = guess_mime(path);
    info!(path = %path, bytes = bytes.len(), mime = %mime_type, "Document loaded");
    Ok(SyncInput::Document {
        data: BASE64.encode(&bytes),
        mime_type,
    })
}

fn guess_mime(path: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "csv" => "text/csv",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Wipe the master ledger after an interactive confirmation. Irreversible.
fn reset_ledger(state: &mut LedgerState) -> Result<(), Box<dyn std::error::Error>> {
    eprint!("CRITICAL: Wipe master ledger? [y/N] ");
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    if answer.trim().eq_ignore_ascii_case("y") {
        state.wipe();
        info!(records = state.inventory.len(), "Ledger reset");
    } else {
        info!("Reset aborted");
    }
    Ok(())
}
