use chrono::NaiveDate;
use std::cmp::Ordering;

/// Parses a locale-formatted monetary string where `.` groups thousands and `,`
/// separates decimals (e.g. `"1.234.567,89"`).
///
/// Returns `None` for anything that does not reduce to a finite number, so a
/// missing amount stays distinguishable from a real zero.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace('.', "").replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Parses a date day-first (`DD/MM/YYYY`, `D-M-YY`, `DD.MM.YYYY`), falling back to ISO
/// `YYYY-MM-DD` when the first component has four digits. A trailing time component is ignored.
pub fn parse_date_dayfirst(raw: &str) -> Option<NaiveDate> {
    let token = raw.split_whitespace().next()?;
    let token = token.split('T').next()?;
    let normalized = token.replace(['-', '.'], "/");

    let parts: Vec<&str> = normalized.split('/').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let format = if parts[0].len() == 4 {
        "%Y/%m/%d"
    } else if parts[2].len() <= 2 {
        "%d/%m/%y"
    } else {
        "%d/%m/%Y"
    };

    NaiveDate::parse_from_str(&normalized, format).ok()
}

/// Canonical form of an identifier cell: trimmed, empty as `None`, and integral
/// floats (`"100.0"`) reduced to their integer text so keys from numeric and text
/// columns still match.
pub fn normalize_key(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(integral) = trimmed.strip_suffix(".0") {
        if !integral.is_empty() && integral.chars().all(|c| c.is_ascii_digit()) {
            return Some(integral.to_string());
        }
    }

    Some(trimmed.to_string())
}

/// Trimmed text cell, empty as `None`.
pub fn normalize_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// `part / whole * 100`, or `None` when the denominator is zero.
pub fn percentage_of(part: f64, whole: f64) -> Option<f64> {
    if whole == 0.0 || !whole.is_finite() {
        None
    } else {
        Some(part / whole * 100.0)
    }
}

/// Orders stage ids numerically when both are integers, lexicographically otherwise.
/// Integers sort before non-numeric ids.
pub fn compare_stage_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
