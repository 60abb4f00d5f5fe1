use chrono::{DateTime, Utc};
use marina_shared::Cents;

/// Charter duration in tenths of an hour, rounded to the nearest tenth.
/// Snapshotted on the booking at creation time.
pub fn duration_tenth_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let minutes = (end - start).num_minutes().max(0);
    (minutes * 10 + 30) / 60
}

/// Total charter price: hourly rate applied over the rounded duration,
/// rounded half-up to a whole cent.
pub fn charter_amount_cents(hourly_rate_cents: Cents, start: DateTime<Utc>, end: DateTime<Utc>) -> Cents {
    let tenths = duration_tenth_hours(start, end);
    (hourly_rate_cents * tenths + 5) / 10
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn whole_hours() {
        let start = Utc::now();
        let end = start + Duration::hours(2);
        assert_eq!(duration_tenth_hours(start, end), 20);
        assert_eq!(charter_amount_cents(10000, start, end), 20000);
    }

    #[test]
    fn partial_hours_round_to_tenths() {
        let start = Utc::now();
        // 1h45m = 1.75h, rounds to 1.8h
        let end = start + Duration::minutes(105);
        assert_eq!(duration_tenth_hours(start, end), 18);
        assert_eq!(charter_amount_cents(10000, start, end), 18000);
    }

    #[test]
    fn odd_rate_rounds_half_up() {
        let start = Utc::now();
        let end = start + Duration::minutes(90); // 1.5h
        // 12345 * 15 / 10 = 18517.5 -> 18518
        assert_eq!(charter_amount_cents(12345, start, end), 18518);
    }

    #[test]
    fn inverted_window_prices_to_zero() {
        let start = Utc::now();
        let end = start - Duration::hours(1);
        assert_eq!(duration_tenth_hours(start, end), 0);
        assert_eq!(charter_amount_cents(10000, start, end), 0);
    }
}
