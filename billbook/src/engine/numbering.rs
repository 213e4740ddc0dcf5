//! Document numbering and recurrence dates

use crate::config::{DOCUMENT_NUMBER_FLOOR, DOCUMENT_NUMBER_WIDTH};
use crate::store::models::Frequency;
use chrono::{Duration, Months, NaiveDate};

/// Trailing integer of a formatted number as a digit string without leading
/// zeros. Empty when there is none (counts as 0). Kept as text so numbers of
/// any length compare correctly.
fn trailing_digits(formatted: &str) -> &str {
    let trimmed = formatted.trim_end();
    let start = trimmed
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .len();
    trimmed[start..].trim_start_matches('0')
}

/// Orders digit strings without leading zeros by numeric value
fn numeric_key(digits: &str) -> (usize, &str) {
    (digits.len(), digits)
}

/// Decimal digit string plus one
fn increment(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    for digit in out.iter_mut().rev() {
        if *digit == b'9' {
            *digit = b'0';
        } else {
            *digit += 1;
            return out.into_iter().map(char::from).collect();
        }
    }
    std::iter::once('1')
        .chain(out.into_iter().map(char::from))
        .collect()
}

/// Next number in a sequence.
///
/// Takes the largest trailing integer over `existing` (at least the floor),
/// adds one and zero-pads it behind `prefix`. Works across prefix changes
/// and hand-entered numbers, and starts at 5000 for an empty sequence.
pub fn next_document_number<I, S>(existing: I, prefix: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let floor = DOCUMENT_NUMBER_FLOOR.to_string();
    let highest = existing
        .into_iter()
        .map(|n| trailing_digits(n.as_ref()).to_string())
        .fold(floor, |best, digits| {
            if numeric_key(&digits) > numeric_key(&best) {
                digits
            } else {
                best
            }
        });

    format!(
        "{}{:0>width$}",
        prefix,
        increment(&highest),
        width = DOCUMENT_NUMBER_WIDTH
    )
}

/// Date one interval after `date`. Month arithmetic is calendar aware and
/// clamps to the last day of shorter months (Jan 31 + 1 month = Feb 29/28).
pub fn next_occurrence(date: NaiveDate, frequency: Frequency) -> NaiveDate {
    let next = match frequency {
        Frequency::Weekly => date.checked_add_signed(Duration::days(7)),
        Frequency::Monthly => date.checked_add_months(Months::new(1)),
        Frequency::Quarterly => date.checked_add_months(Months::new(3)),
    };
    next.unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_next_number_continues_sequence() {
        assert_eq!(next_document_number(["PFX-5000", "PFX-5003"], "PFX-"), "PFX-5004");
    }

    #[test]
    fn test_next_number_empty_starts_at_5000() {
        assert_eq!(next_document_number(Vec::<String>::new(), "PFX-"), "PFX-5000");
    }

    #[test]
    fn test_next_number_ignores_non_numeric_and_low_numbers() {
        assert_eq!(next_document_number(["DRAFT", "INV-12", ""], "INV-"), "INV-5000");
    }

    #[test]
    fn test_next_number_survives_prefix_change() {
        let existing = vec!["OLD-7001".to_string(), "INV-5002".to_string()];
        assert_eq!(next_document_number(&existing, "NEW/"), "NEW/7002");
    }

    #[test]
    fn test_next_number_wider_than_padding() {
        assert_eq!(next_document_number(["X-99999"], "X-"), "X-100000");
    }

    #[test]
    fn test_trailing_digits_extraction() {
        assert_eq!(trailing_digits("2024-INV-0042"), "42");
        assert_eq!(trailing_digits("INV-5001 "), "5001");
        assert_eq!(trailing_digits("INV-5001A"), "");
        assert_eq!(trailing_digits("INV-0000"), "");
        assert_eq!(trailing_digits("99999999999999999999999"), "99999999999999999999999");
    }

    #[test]
    fn test_next_number_beyond_u64_stays_monotonic() {
        let huge = "INV-99999999999999999999999";
        assert_eq!(
            next_document_number([huge, "INV-5000"], "INV-"),
            "INV-100000000000000000000000"
        );
        assert_eq!(
            next_document_number(["INV-18446744073709551615", "INV-9"], "INV-"),
            "INV-18446744073709551616"
        );
    }

    #[test]
    fn test_next_occurrence() {
        assert_eq!(next_occurrence(ymd(2024, 1, 15), Frequency::Weekly), ymd(2024, 1, 22));
        assert_eq!(next_occurrence(ymd(2024, 1, 15), Frequency::Monthly), ymd(2024, 2, 15));
        assert_eq!(next_occurrence(ymd(2024, 1, 31), Frequency::Monthly), ymd(2024, 2, 29));
        assert_eq!(next_occurrence(ymd(2024, 11, 30), Frequency::Quarterly), ymd(2025, 2, 28));
        assert_eq!(next_occurrence(ymd(2024, 12, 28), Frequency::Weekly), ymd(2025, 1, 4));
    }
}
