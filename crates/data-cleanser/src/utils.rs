//! Shared utilities: value parsing, pattern constants and statistics.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

// =============================================================================
// Pattern Constants
// =============================================================================

/// Date shapes that mark a column as DateTime: YYYY-MM-DD, DD/MM/YYYY, DD-MM-YYYY.
pub static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{4}-\d{2}-\d{2}").expect("Invalid regex: YYYY-MM-DD"),
        Regex::new(r"^\d{2}/\d{2}/\d{4}").expect("Invalid regex: DD/MM/YYYY"),
        Regex::new(r"^\d{2}-\d{2}-\d{4}").expect("Invalid regex: DD-MM-YYYY"),
    ]
});

pub static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("Invalid regex: email")
});

/// Phone shapes used to detect phone-like columns (prefix match).
pub static PHONE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{3}-\d{3}-\d{4}").expect("Invalid regex: NNN-NNN-NNNN"),
        Regex::new(r"^\(\d{3}\)\s\d{3}-\d{4}").expect("Invalid regex: (NNN) NNN-NNNN"),
        Regex::new(r"^\d{10}").expect("Invalid regex: 10 digits"),
    ]
});

/// Phone shapes accepted as valid when scoring accuracy (whole-value match).
pub static VALID_PHONE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^\d{3}-\d{3}-\d{4}$").expect("Invalid regex: NNN-NNN-NNNN"),
        Regex::new(r"^\(\d{3}\)\s\d{3}-\d{4}$").expect("Invalid regex: (NNN) NNN-NNNN"),
        Regex::new(r"^\d{10}$").expect("Invalid regex: 10 digits"),
        Regex::new(r"^0\d{8,9}$").expect("Invalid regex: local 0-prefixed"),
    ]
});

/// Column-name keywords for values that must not be negative.
pub const POSITIVE_KEYWORDS: [&str; 5] = ["age", "price", "amount", "quantity", "count"];

pub const EMAIL_KEYWORDS: [&str; 1] = ["email"];

pub const PHONE_KEYWORDS: [&str; 3] = ["phone", "tel", "mobile"];

/// Fallback parse formats tried after the configured one.
const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

// =============================================================================
// Parsing
// =============================================================================

/// Check whether a lower-cased column name contains any keyword.
pub fn name_contains_any(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

/// Parse a finite number, ignoring surrounding whitespace.
pub fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a timestamp, trying `preferred` first and then the built-in formats.
pub fn parse_datetime(s: &str, preferred: Option<&str>) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(fmt) = preferred {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse common boolean spellings.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "t" => Some(true),
        "false" | "no" | "n" | "0" | "f" => Some(false),
        _ => None,
    }
}

pub fn looks_like_date(s: &str) -> bool {
    let trimmed = s.trim();
    DATE_PATTERNS.iter().any(|p| p.is_match(trimmed))
}

pub fn looks_like_email(s: &str) -> bool {
    EMAIL_PATTERN.is_match(s.trim())
}

pub fn looks_like_phone(s: &str) -> bool {
    let trimmed = s.trim();
    PHONE_PATTERNS.iter().any(|p| p.is_match(trimmed))
}

pub fn is_valid_phone(s: &str) -> bool {
    let trimmed = s.trim();
    VALID_PHONE_PATTERNS.iter().any(|p| p.is_match(trimmed))
}

// =============================================================================
// Statistics
// =============================================================================

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1). `None` with fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Sort a copy of `values` ascending.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Quantile of already sorted values, linear interpolation between ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted(values), q)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Adjusted Fisher-Pearson skewness. `None` with fewer than three values.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len() as f64;
    if values.len() < 3 {
        return None;
    }
    let m = mean(values)?;
    let s = sample_std(values)?;
    if s == 0.0 {
        return Some(0.0);
    }
    let sum_cubed: f64 = values.iter().map(|v| ((v - m) / s).powi(3)).sum();
    Some(n / ((n - 1.0) * (n - 2.0)) * sum_cubed)
}

/// Excess kurtosis with the unbiased estimator. `None` with fewer than four values.
pub fn kurtosis(values: &[f64]) -> Option<f64> {
    let n = values.len() as f64;
    if values.len() < 4 {
        return None;
    }
    let m = mean(values)?;
    let s = sample_std(values)?;
    if s == 0.0 {
        return Some(0.0);
    }
    let sum_fourth: f64 = values.iter().map(|v| ((v - m) / s).powi(4)).sum();
    let lead = n * (n + 1.0) / ((n - 1.0) * (n - 2.0) * (n - 3.0));
    let tail = 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0));
    Some(lead * sum_fourth - tail)
}

/// Pearson correlation over paired values.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("1e3"), Some(1000.0));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime("2024-03-15", None), Some(expected));
        assert_eq!(parse_datetime("15/03/2024", None), Some(expected));
        assert_eq!(parse_datetime("15-03-2024", None), Some(expected));
        assert_eq!(parse_datetime("2024-13-45", None), None);
        assert!(parse_datetime("2024-03-15 10:30:00", None).is_some());
    }

    #[test]
    fn test_pattern_detection() {
        assert!(looks_like_date("2024-01-01"));
        assert!(!looks_like_date("Jan 1st"));
        assert!(looks_like_email(" Alice@Test.COM "));
        assert!(!looks_like_email("not an email"));
        assert!(looks_like_phone("(555) 123-4567"));
        assert!(looks_like_phone("5551234567"));
        assert!(is_valid_phone("0812345678"));
        assert!(!is_valid_phone("12-34"));
    }

    #[test]
    fn test_quantile_linear() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 100.0, 7.0, 8.0, 9.0, 10.0];
        assert_eq!(quantile(&values, 0.25), Some(3.25));
        assert_eq!(quantile(&values, 0.75), Some(8.75));
        assert_eq!(median(&[1.0, 2.0, 4.0, 5.0]), Some(3.0));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_sample_std() {
        let std = sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((std - 2.138).abs() < 1e-3);
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn test_pearson() {
        let pairs: Vec<(f64, f64)> = (0..5).map(|i| (i as f64, 2.0 * i as f64)).collect();
        assert!((pearson(&pairs).unwrap() - 1.0).abs() < 1e-9);
    }
}
