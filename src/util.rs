// Utility helpers for parsing cells and formatting numbers.
//
// This module centralizes the "dirty" spreadsheet handling (blank cells,
// mixed date formats) so the rest of the code can assume typed values.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Date layouts seen in exported complaint spreadsheets, tried in order.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M"];

/// Trim a raw cell and map blank cells to `None`.
pub fn clean_cell(s: Option<&str>) -> Option<String> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    Some(s.to_string())
}

/// Parse a report date in any of the accepted layouts.
///
/// Date-time cells keep only their date part. Returns `None` for anything
/// that cannot be parsed instead of failing the whole row.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .map(|dt| dt.date())
        })
}

pub fn days_diff(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Case-insensitive substring test against any of `needles`.
///
/// `needles` are expected to be lowercase already.
pub fn contains_any_ci(haystack: &str, needles: &[String]) -> bool {
    let lower = haystack.to_lowercase();
    needles.iter().any(|n| lower.contains(n.as_str()))
}

pub fn percentage(part: usize, whole: usize) -> f64 {
    // Defined as 0 for an empty whole to avoid NaNs.
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

/// Fixed decimals with `en` thousands separators, e.g. `1,234,567.89`.
pub fn format_number(n: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, n.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let rounds_to_zero = fixed.chars().all(|c| c == '0' || c == '.');
    let mut out = String::new();
    if n < 0.0 && !rounds_to_zero {
        out.push('-');
    }
    out.push_str(&int_part.parse::<i64>().unwrap_or(0).to_formatted_string(&Locale::en));
    if !frac.is_empty() {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Counts for console messages, e.g. `1,204`.
pub fn format_int<T: ToFormattedString>(n: T) -> String {
    n.to_formatted_string(&Locale::en)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(parse_date_safe(Some("2024-03-07")), Some(expected));
        assert_eq!(parse_date_safe(Some("07/03/2024")), Some(expected));
        assert_eq!(parse_date_safe(Some("07-03-2024")), Some(expected));
        assert_eq!(parse_date_safe(Some(" 2024/03/07 ")), Some(expected));
        assert_eq!(parse_date_safe(Some("2024-03-07 14:30:00")), Some(expected));
        assert_eq!(parse_date_safe(Some("2024-03-07T14:30:00")), Some(expected));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date_safe(None), None);
        assert_eq!(parse_date_safe(Some("")), None);
        assert_eq!(parse_date_safe(Some("kemarin")), None);
        assert_eq!(parse_date_safe(Some("2024-13-40")), None);
    }

    #[test]
    fn test_clean_cell() {
        assert_eq!(clean_cell(Some("  BPN Bogor ")), Some("BPN Bogor".to_string()));
        assert_eq!(clean_cell(Some("   ")), None);
        assert_eq!(clean_cell(None), None);
    }

    #[test]
    fn test_contains_any_ci() {
        let needles = vec!["selesai".to_string(), "tutup".to_string()];
        assert!(contains_any_ci("SELESAI - Ditutup", &needles));
        assert!(contains_any_ci("Laporan Tutup", &needles));
        assert!(!contains_any_ci("Proses", &needles));
    }

    #[test]
    fn test_percentage_and_format() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(format_number(percentage(2, 3), 1), "66.7");
        assert_eq!(format_number(1234567.891, 2), "1,234,567.89");
        assert_eq!(format_number(-12.5, 1), "-12.5");
        assert_eq!(format_number(-0.01, 1), "0.0");
        assert_eq!(format_number(1500.0, 0), "1,500");
        assert_eq!(format_int(9855), "9,855");
    }
}
