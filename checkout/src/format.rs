//! Display formatting for prices and event dates.

use crate::types::Money;
use chrono::{DateTime, Utc};

/// Separator between date and time in a range
const DATE_TIME_SEPARATOR: &str = " · ";

/// `"KES 1,250.00"`; zero renders as `"Free"`
#[must_use]
pub fn format_price(amount: Money, currency: &str) -> String {
    if amount.is_zero() {
        return "Free".to_string();
    }

    let cents = amount.cents();
    format!(
        "{currency} {}.{:02}",
        group_thousands(cents / 100),
        cents % 100
    )
}

/// `"Sat, Mar 15, 2025"`
#[must_use]
pub fn format_event_date(at: DateTime<Utc>) -> String {
    at.format("%a, %b %-d, %Y").to_string()
}

/// `"7:00 PM"`
#[must_use]
pub fn format_event_time(at: DateTime<Utc>) -> String {
    at.format("%-I:%M %p").to_string()
}

/// Date and time span of an event
///
/// Same-day ranges collapse to one date:
/// `"Sat, Mar 15, 2025 · 7:00 PM - 10:00 PM"`. Multi-day ranges show both
/// ends in full, and a missing end shows only the start.
#[must_use]
pub fn format_date_range(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> String {
    let start_part = format!(
        "{}{DATE_TIME_SEPARATOR}{}",
        format_event_date(start),
        format_event_time(start)
    );

    match end {
        None => start_part,
        Some(end) if end.date_naive() == start.date_naive() => {
            format!("{start_part} - {}", format_event_time(end))
        },
        Some(end) => format!(
            "{start_part} - {}{DATE_TIME_SEPARATOR}{}",
            format_event_date(end),
            format_event_time(end)
        ),
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    grouped
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn prices_group_thousands() {
        assert_eq!(format_price(Money::from_cents(125_000), "KES"), "KES 1,250.00");
        assert_eq!(format_price(Money::from_cents(99), "KES"), "KES 0.99");
        assert_eq!(
            format_price(Money::from_cents(123_456_789), "USD"),
            "USD 1,234,567.89"
        );
        assert_eq!(format_price(Money::from_major(100), "KES"), "KES 100.00");
    }

    #[test]
    fn zero_is_free() {
        assert_eq!(format_price(Money::ZERO, "KES"), "Free");
    }

    #[test]
    fn dates_and_times() {
        let start = at("2025-03-15T19:00:00Z");
        assert_eq!(format_event_date(start), "Sat, Mar 15, 2025");
        assert_eq!(format_event_time(start), "7:00 PM");
        assert_eq!(format_event_time(at("2025-03-15T09:05:00Z")), "9:05 AM");
    }

    #[test]
    fn same_day_range_collapses() {
        let range = format_date_range(
            at("2025-03-15T19:00:00Z"),
            Some(at("2025-03-15T22:00:00Z")),
        );
        assert_eq!(range, "Sat, Mar 15, 2025 · 7:00 PM - 10:00 PM");
    }

    #[test]
    fn multi_day_range_shows_both_dates() {
        let range = format_date_range(
            at("2025-03-15T19:00:00Z"),
            Some(at("2025-03-16T02:00:00Z")),
        );
        assert_eq!(
            range,
            "Sat, Mar 15, 2025 · 7:00 PM - Sun, Mar 16, 2025 · 2:00 AM"
        );
    }

    #[test]
    fn open_ended_range_shows_start() {
        assert_eq!(
            format_date_range(at("2025-03-15T19:00:00Z"), None),
            "Sat, Mar 15, 2025 · 7:00 PM"
        );
    }
}
