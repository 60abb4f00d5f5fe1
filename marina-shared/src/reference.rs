use chrono::Utc;
use uuid::Uuid;

/// Human-readable reference numbers: prefix + timestamp + uuid suffix,
/// e.g. `BK20260807153000A1B2C3D4`.
fn reference(prefix: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect::<String>()
        .to_uppercase();
    format!("{}{}{}", prefix, timestamp, suffix)
}

pub fn booking_number() -> String {
    reference("BK")
}

pub fn order_number() -> String {
    reference("OD")
}

pub fn payment_number() -> String {
    reference("PAY")
}

pub fn split_number() -> String {
    reference("SP")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_numbers_carry_prefix_and_are_distinct() {
        let a = booking_number();
        let b = booking_number();
        assert!(a.starts_with("BK"));
        assert_eq!(a.len(), 2 + 14 + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn split_number_prefix() {
        assert!(split_number().starts_with("SP"));
        assert!(order_number().starts_with("OD"));
        assert!(payment_number().starts_with("PAY"));
    }
}
