// src/recon/mod.rs

pub mod matcher;

use tracing::{debug, info};

use crate::model::{AffectedItem, Product, SyncResult, TransactionType};
use crate::normalize::{normalize_grade, normalize_name, normalize_size, synthesize_sku};
use matcher::{Candidate, find_match};

/// Apply one extraction result to the ledger.
///
/// Returns a fresh inventory snapshot (the input slice is never mutated)
/// plus one effect per non-dropped line item, in input order. Matched
/// records change `stock` only; everything else on an existing record is
/// preserved even when the extraction text disagrees with it. Items with
/// no match become new records — data capture beats strict validation.
pub fn reconcile(
    inventory: &[Product],
    result: &SyncResult,
    now_millis: i64,
) -> (Vec<Product>, Vec<AffectedItem>) {
    let mut next: Vec<Product> = inventory.to_vec();
    let mut affected: Vec<AffectedItem> = Vec::new();

    for item in &result.extracted_items {
        let name = normalize_name(&item.name);
        let grade = normalize_grade(&item.grade);
        let size = normalize_size(&item.size);

        // Noisy extraction tolerance: a line with no usable name or size is
        // a no-op, not an error.
        if name.is_empty() || size.is_empty() {
            debug!(raw_name = %item.name, raw_size = %item.size, "Dropping malformed line item");
            continue;
        }

        let candidate = Candidate {
            sku: item.sku.clone(),
            name: name.clone(),
            grade: grade.clone(),
            size: size.clone(),
        };

        let qty = item.qty as i64;

        match find_match(&next, &candidate) {
            Some(idx) => {
                let previous_stock = next[idx].stock;
                let new_stock = match result.transaction_type {
                    TransactionType::Sale => previous_stock - qty,
                    _ => previous_stock + qty,
                };
                next[idx].stock = new_stock;
                affected.push(AffectedItem {
                    sku: next[idx].sku.clone(),
                    previous_stock,
                    new_stock,
                });
            }
            None => {
                let sku = match &item.sku {
                    Some(s) if !s.trim().is_empty() => s.clone(),
                    _ => synthesize_sku(&name, &grade, now_millis),
                };
                // A brand-new record introduced by a sale starts negative:
                // stock we owe, not stock we hold.
                let stock = match result.transaction_type {
                    TransactionType::Sale => -qty,
                    _ => qty,
                };
                let product = Product {
                    sku: sku.clone(),
                    name,
                    grade,
                    size,
                    stock,
                    initial_stock: qty,
                    price: item.price.unwrap_or(0.0),
                };
                info!(sku = %sku, stock, "New ledger record from unmatched line");
                next.push(product);
                affected.push(AffectedItem {
                    sku,
                    previous_stock: 0,
                    new_stock: stock,
                });
            }
        }
    }

    (next, affected)
}
