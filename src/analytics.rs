// src/analytics.rs

use crate::model::{Analytics, Customer, Product, TransactionType};

/// Fraction of a record's initial stock below which it is flagged low.
const LOW_STOCK_RATIO: f64 = 0.1;

/// Recompute the dashboard view from scratch. Pure read — no stored state,
/// no mutation.
pub fn compute(inventory: &[Product], customers: &[Customer]) -> Analytics {
    let total_inventory_value = inventory
        .iter()
        .map(|p| p.stock as f64 * p.price)
        .sum();

    // Records born with zero initial stock are never "low": the depletion
    // ratio is meaningless and the comparison below only fires for them
    // once stock goes negative (oversold), which is the right signal.
    let low_stock_count = inventory.iter().filter(|p| is_low_stock(p)).count();

    let total_sales = customers
        .iter()
        .flat_map(|c| &c.order_history)
        .filter(|o| o.r#type == TransactionType::Sale)
        .map(|o| o.total_amount)
        .sum();

    let top_product = top_product(inventory, customers);

    Analytics {
        total_inventory_value,
        low_stock_count,
        total_sales,
        top_product,
    }
}

pub fn is_low_stock(p: &Product) -> bool {
    (p.stock as f64) < (p.initial_stock as f64) * LOW_STOCK_RATIO
}

/// The inventory record whose SKU has the highest cumulative qty across
/// every order item in every customer's history (sales and purchases both).
/// Ties break to the first-encountered SKU: customers in insertion order,
/// orders newest-first, items in order. The accumulator is a Vec so that
/// ordering is a real rule rather than hash-map accident.
fn top_product(inventory: &[Product], customers: &[Customer]) -> Option<Product> {
    let mut frequency: Vec<(String, f64)> = Vec::new();

    for customer in customers {
        for order in &customer.order_history {
            for item in &order.items {
                match frequency.iter_mut().find(|(sku, _)| sku == &item.sku) {
                    Some((_, qty)) => *qty += item.qty,
                    None => frequency.push((item.sku.clone(), item.qty)),
                }
            }
        }
    }

    let mut best: Option<&(String, f64)> = None;
    for entry in &frequency {
        match best {
            Some((_, best_qty)) if entry.1 <= *best_qty => {}
            _ => best = Some(entry),
        }
    }

    let (top_sku, _) = best?;
    inventory.iter().find(|p| &p.sku == top_sku).cloned()
}
