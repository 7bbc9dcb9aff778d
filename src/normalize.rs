// src/normalize.rs

/// Collapse internal whitespace runs to a single space and trim.
pub fn normalize_name(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip everything but digits. If nothing is left (e.g. grade "MS"),
/// fall back to the original trimmed string.
pub fn normalize_grade(s: &str) -> String {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        s.trim().to_string()
    } else {
        digits
    }
}

/// Trim only. Size-string canonicalization (1/2 inch -> 1/2") is the
/// extraction engine's job, not this layer's.
pub fn normalize_size(s: &str) -> String {
    s.trim().to_string()
}

/// Trimmed, case-insensitive equality.
pub fn eq_fold(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Generate a SKU for a product the ledger has never seen. Combines the
/// first three characters of the normalized name, the grade, and a short
/// uniqueness suffix from the current time.
pub fn synthesize_sku(name: &str, grade: &str, now_millis: i64) -> String {
    let prefix: String = name.chars().take(3).collect::<String>().to_uppercase();
    format!("NEW-{prefix}-{grade}-{}", millis_suffix(now_millis))
}

/// SKU rule for manual item entry: name prefix, grade, size with
/// non-alphanumerics removed, time suffix.
pub fn manual_sku(name: &str, grade: &str, size: &str, now_millis: i64) -> String {
    let prefix: String = name.chars().take(3).collect::<String>().to_uppercase();
    let size_part: String = size.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    format!("{prefix}-{grade}-{size_part}-{}", millis_suffix(now_millis))
}

/// Last four digits of a millisecond timestamp.
fn millis_suffix(now_millis: i64) -> String {
    let s = now_millis.to_string();
    let start = s.len().saturating_sub(4);
    s[start..].to_string()
}
