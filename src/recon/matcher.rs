// src/recon/matcher.rs

use crate::model::Product;
use crate::normalize::eq_fold;

/// A line item's identity fields after normalization, ready for matching.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub sku: Option<String>,
    pub name: String,
    pub grade: String,
    pub size: String,
}

/// Resolve a candidate against the ledger. Two exact passes, first hit wins:
/// SKU (case-insensitive, trimmed), then name+grade+size composite. No fuzzy
/// scoring — ambiguous text is the extraction engine's problem, not ours.
pub fn find_match(inventory: &[Product], candidate: &Candidate) -> Option<usize> {
    if let Some(ref sku) = candidate.sku {
        if !sku.trim().is_empty() {
            if let Some(idx) = inventory.iter().position(|p| eq_fold(&p.sku, sku)) {
                return Some(idx);
            }
        }
    }

    inventory.iter().position(|p| {
        eq_fold(&p.name, &candidate.name)
            && eq_fold(&p.grade, &candidate.grade)
            && eq_fold(&p.size, &candidate.size)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(sku: &str, name: &str, grade: &str, size: &str) -> Product {
        Product {
            sku: sku.into(),
            name: name.into(),
            grade: grade.into(),
            size: size.into(),
            stock: 100,
            initial_stock: 100,
            price: 50.0,
        }
    }

    fn ledger() -> Vec<Product> {
        vec![
            product("VLV-304-1PC-14", "SS IC Ball Valve 1PC S/E", "304", "1/4\""),
            product("FIT-304-ELB-12", "SS IC Elbow", "304", "1/2\""),
            product("FIT-316-ELB-12", "SS IC Elbow", "316", "1/2\""),
        ]
    }

    #[test]
    fn sku_match_is_case_insensitive() {
        let cand = Candidate {
            sku: Some(" vlv-304-1pc-14 ".into()),
            name: "whatever".into(),
            grade: "999".into(),
            size: "9\"".into(),
        };
        assert_eq!(find_match(&ledger(), &cand), Some(0));
    }

    #[test]
    fn sku_wins_over_composite() {
        // SKU points at the 316 elbow even though the text fields say 304.
        let cand = Candidate {
            sku: Some("FIT-316-ELB-12".into()),
            name: "SS IC Elbow".into(),
            grade: "304".into(),
            size: "1/2\"".into(),
        };
        assert_eq!(find_match(&ledger(), &cand), Some(2));
    }

    #[test]
    fn composite_fallback_when_sku_unknown() {
        let cand = Candidate {
            sku: Some("NOPE-000".into()),
            name: "ss ic elbow".into(),
            grade: "316".into(),
            size: "1/2\"".into(),
        };
        assert_eq!(find_match(&ledger(), &cand), Some(2));
    }

    #[test]
    fn composite_requires_all_three_fields() {
        let cand = Candidate {
            sku: None,
            name: "SS IC Elbow".into(),
            grade: "316".into(),
            size: "3/4\"".into(),
        };
        assert_eq!(find_match(&ledger(), &cand), None);
    }

    #[test]
    fn empty_sku_skips_straight_to_composite() {
        let cand = Candidate {
            sku: Some("  ".into()),
            name: "SS IC Elbow".into(),
            grade: "304".into(),
            size: "1/2\"".into(),
        };
        assert_eq!(find_match(&ledger(), &cand), Some(1));
    }
}
