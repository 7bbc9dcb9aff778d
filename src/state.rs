// src/state.rs

use serde::Serialize;
use tracing::{info, warn};

use crate::history::record_sale;
use crate::model::{AffectedItem, Customer, Product, SyncResult, TransactionType};
use crate::normalize::{eq_fold, manual_sku, normalize_name};
use crate::recon::reconcile;

/// The latest reconciliation outcome, kept only until the next pass
/// overwrites it.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub result: SyncResult,
    pub affected: Vec<AffectedItem>,
}

/// All mutable application state, owned by a single coordinator. Every
/// mutation entry point runs as one atomic step; nothing here is shared
/// across threads.
pub struct LedgerState {
    pub inventory: Vec<Product>,
    pub customers: Vec<Customer>,
    pub last_sync: Option<SyncReport>,
    sync_in_flight: bool,
}

impl LedgerState {
    pub fn new(inventory: Vec<Product>) -> Self {
        Self {
            inventory,
            customers: Vec::new(),
            last_sync: None,
            sync_in_flight: false,
        }
    }

    /// The stock catalog the ledger starts from.
    pub fn seeded() -> Self {
        Self::new(seed_products())
    }

    /// Claim the single sync slot. A second sync while one is in flight is
    /// rejected outright rather than racing on shared state.
    pub fn begin_sync(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.sync_in_flight {
            warn!("Sync rejected: another sync is already in flight");
            return Err("a sync operation is already in progress".into());
        }
        self.sync_in_flight = true;
        Ok(())
    }

    pub fn finish_sync(&mut self) {
        self.sync_in_flight = false;
    }

    /// Apply one extraction result: reconcile the ledger, and for a sale
    /// with a named customer, thread the order into that customer's history.
    pub fn apply_sync(&mut self, result: SyncResult, now_millis: i64, now_rfc3339: &str) {
        let (next, affected) = reconcile(&self.inventory, &result, now_millis);
        self.inventory = next;

        if result.transaction_type == TransactionType::Sale {
            if let Some(ref who) = result.customer_info {
                record_sale(
                    &mut self.customers,
                    who,
                    &result.extracted_items,
                    now_millis,
                    now_rfc3339,
                );
            }
        }

        info!(affected = affected.len(), records = self.inventory.len(), "Ledger sync applied");
        self.last_sync = Some(SyncReport { result, affected });
    }

    /// Manual catalog entry. Returns the generated SKU.
    pub fn add_product(
        &mut self,
        name: &str,
        grade: &str,
        size: &str,
        initial_stock: i64,
        price: f64,
        now_millis: i64,
    ) -> Result<String, Box<dyn std::error::Error>> {
        if name.trim().is_empty() || size.trim().is_empty() {
            return Err("manual entry requires a name and a size".into());
        }
        let sku = manual_sku(name, grade, size, now_millis);
        self.inventory.push(Product {
            sku: sku.clone(),
            name: name.to_string(),
            grade: grade.to_string(),
            size: size.to_string(),
            stock: initial_stock,
            initial_stock,
            price,
        });
        info!(sku = %sku, stock = initial_stock, "Manual item added to catalog");
        Ok(sku)
    }

    /// Purge one variant by SKU (case-insensitive, trimmed).
    pub fn delete_item(&mut self, sku: &str) {
        let before = self.inventory.len();
        self.inventory.retain(|p| !eq_fold(&p.sku, sku));
        info!(sku = %sku, removed = before - self.inventory.len(), "Variant purged");
    }

    /// Purge a whole family: every record whose normalized name matches,
    /// whatever its grade or size.
    pub fn delete_family(&mut self, name: &str) {
        let target = normalize_name(name);
        let before = self.inventory.len();
        self.inventory.retain(|p| !eq_fold(&normalize_name(&p.name), &target));
        info!(family = %target, removed = before - self.inventory.len(), "Family purged");
    }

    /// Wipe the master ledger. Irreversible; the interactive confirmation
    /// lives with the caller.
    pub fn wipe(&mut self) {
        self.inventory.clear();
        self.last_sync = None;
        warn!("Master ledger wiped");
    }

    /// Current inventory as the compact context array the extraction
    /// engine receives alongside each request.
    pub fn context_json(&self) -> String {
        #[derive(Serialize)]
        struct ContextEntry<'a> {
            sku: &'a str,
            n: &'a str,
            g: &'a str,
            s: &'a str,
        }
        let entries: Vec<ContextEntry> = self
            .inventory
            .iter()
            .map(|p| ContextEntry {
                sku: &p.sku,
                n: &p.name,
                g: &p.grade,
                s: &p.size,
            })
            .collect();
        serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_string())
    }
}

/// The distributor's starting catalog.
pub fn seed_products() -> Vec<Product> {
    let rows: [(&str, &str, &str, &str, i64, f64); 12] = [
        ("VLV-304-1PC-14", "SS IC Ball Valve 1PC S/E", "304", "1/4\"", 150, 188.0),
        ("VLV-316-1PC-14", "SS IC Ball Valve 1PC S/E", "316", "1/4\"", 120, 260.0),
        ("VLV-304-3PC-12", "SS IC Ball Valve 3PC (S/E / S/W / F/E)", "304", "1/2\"", 85, 850.0),
        ("VLV-316-3PC-12", "SS IC Ball Valve 3PC (S/E / S/W / F/E)", "316", "1/2\"", 65, 1150.0),
        ("VLV-304-MNI-14", "SS IC Mini Ball Valve S/E", "304", "1/4\"", 200, 145.0),
        ("FIT-304-ELB-12", "SS IC Elbow", "304", "1/2\"", 800, 45.0),
        ("FIT-316-ELB-12", "SS IC Elbow", "316", "1/2\"", 650, 68.0),
        ("FIT-304-SKT-10", "SS IC Socket", "304", "1\"", 400, 85.0),
        ("FIT-316-SKT-10", "SS IC Socket", "316", "1\"", 350, 115.0),
        ("DRY-304-BTY-15", "SS 304 Dairy Butterfly Valve", "304", "1 1/2\"", 45, 1850.0),
        ("FLG-304-150S-10", "SS 304 Flanges Class 150 Surf", "304", "1\"", 100, 780.0),
        ("FAS-304-BLT-12", "SS Bolt 304 / 316", "304", "1/2\"", 2000, 15.0),
    ];

    rows.into_iter()
        .map(|(sku, name, grade, size, stock, price)| Product {
            sku: sku.to_string(),
            name: name.to_string(),
            grade: grade.to_string(),
            size: size.to_string(),
            stock,
            initial_stock: stock,
            price,
        })
        .collect()
}
