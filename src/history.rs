// src/history.rs

use tracing::info;

use crate::model::{Customer, CustomerInfo, ExtractedItem, Order, OrderItem, TransactionType};
use crate::normalize::eq_fold;

/// Fields the extraction engine leaves blank get this marker.
const UNKNOWN: &str = "N/A";

/// Record a sale against the customer list: build one order from the line
/// items and prepend it to the matching customer's history (newest first),
/// or create the customer if the name has never been seen. Matching is by
/// trimmed, case-insensitive name; at most one customer per normalized name.
pub fn record_sale(
    customers: &mut Vec<Customer>,
    info: &CustomerInfo,
    items: &[ExtractedItem],
    now_millis: i64,
    now_rfc3339: &str,
) {
    let order_items: Vec<OrderItem> = items
        .iter()
        .map(|i| OrderItem {
            sku: i.sku.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            qty: i.qty,
            price: i.price.unwrap_or(0.0),
        })
        .collect();

    let total_amount: f64 = order_items.iter().map(|i| i.qty * i.price).sum();

    let order = Order {
        id: format!("CHL-{now_millis}"),
        date: now_rfc3339.to_string(),
        r#type: TransactionType::Sale,
        items: order_items,
        total_amount,
    };

    match customers.iter_mut().find(|c| eq_fold(&c.name, &info.name)) {
        Some(customer) => {
            info!(customer = %customer.name, total = total_amount, "Order appended to existing profile");
            customer.order_history.insert(0, order);
        }
        None => {
            info!(customer = %info.name, total = total_amount, "New customer profile");
            customers.push(Customer {
                id: format!("CST-{now_millis}"),
                name: info.name.clone(),
                // Email is never taken from extraction output; profiles
                // always start with the marker.
                email: UNKNOWN.to_string(),
                contact: info.contact.clone().unwrap_or_else(|| UNKNOWN.to_string()),
                order_history: vec![order],
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_001_234;
    const NOW_STR: &str = "2023-11-14T22:13:21.234+00:00";

    fn info(name: &str) -> CustomerInfo {
        CustomerInfo {
            name: name.into(),
            email: None,
            contact: None,
        }
    }

    fn item(sku: Option<&str>, qty: f64, price: Option<f64>) -> ExtractedItem {
        ExtractedItem {
            sku: sku.map(Into::into),
            name: "SS IC Elbow".into(),
            grade: "304".into(),
            size: "1/2\"".into(),
            qty,
            price,
        }
    }

    #[test]
    fn new_customer_gets_single_entry_history() {
        let mut customers = Vec::new();
        let items = vec![
            item(Some("FIT-304-ELB-12"), 10.0, Some(40.0)),
            item(Some("FIT-316-ELB-12"), 10.0, Some(60.0)),
        ];
        record_sale(&mut customers, &info("Acme Corp"), &items, NOW, NOW_STR);

        assert_eq!(customers.len(), 1);
        let c = &customers[0];
        assert_eq!(c.id, "CST-1700000001234");
        assert_eq!(c.email, "N/A");
        assert_eq!(c.contact, "N/A");
        assert_eq!(c.order_history.len(), 1);
        assert_eq!(c.order_history[0].total_amount, 1000.0);
        assert_eq!(c.order_history[0].r#type, TransactionType::Sale);
    }

    #[test]
    fn repeat_sale_matches_name_case_insensitively() {
        let mut customers = Vec::new();
        record_sale(
            &mut customers,
            &info("Acme Corp"),
            &[item(Some("A"), 1.0, Some(10.0))],
            NOW,
            NOW_STR,
        );
        record_sale(
            &mut customers,
            &info("  acme corp "),
            &[item(Some("B"), 2.0, Some(10.0))],
            NOW + 60_000,
            NOW_STR,
        );

        assert_eq!(customers.len(), 1);
        let history = &customers[0].order_history;
        assert_eq!(history.len(), 2);
        // Newest first.
        assert_eq!(history[0].items[0].sku, "B");
        assert_eq!(history[1].items[0].sku, "A");
    }

    #[test]
    fn missing_fields_default_to_markers_and_zero() {
        let mut customers = Vec::new();
        record_sale(&mut customers, &info("Beta Ltd"), &[item(None, 5.0, None)], NOW, NOW_STR);

        let order = &customers[0].order_history[0];
        assert_eq!(order.items[0].sku, "N/A");
        assert_eq!(order.items[0].price, 0.0);
        assert_eq!(order.total_amount, 0.0);
    }

    #[test]
    fn gateway_email_never_reaches_profile() {
        let mut customers = Vec::new();
        let who = CustomerInfo {
            name: "Acme Corp".into(),
            email: Some("buyer@acme.example".into()),
            contact: None,
        };
        record_sale(&mut customers, &who, &[item(Some("A"), 1.0, Some(10.0))], NOW, NOW_STR);
        assert_eq!(customers[0].email, "N/A");
    }

    #[test]
    fn contact_flows_through_when_supplied() {
        let mut customers = Vec::new();
        let who = CustomerInfo {
            name: "Gamma Industries".into(),
            email: None,
            contact: Some("+91 98200 00000".into()),
        };
        record_sale(&mut customers, &who, &[], NOW, NOW_STR);
        assert_eq!(customers[0].contact, "+91 98200 00000");
        assert_eq!(customers[0].email, "N/A");
    }
}
