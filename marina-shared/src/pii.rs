use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wrapper for sensitive contact data. Masks the value in Debug/Display so
/// it never leaks through log macros; serializes the real value for API
/// responses.
#[derive(Clone, Deserialize)]
pub struct Masked<T>(pub T);

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Redact a phone number down to its last four digits for log-safe copies.
pub fn redact_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = digits[digits.len() - 4..].iter().collect();
    format!("****{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_hides_value_in_debug() {
        let phone = Masked("13800138000".to_string());
        assert_eq!(format!("{:?}", phone), "********");
        assert_eq!(format!("{}", phone), "********");
    }

    #[test]
    fn redact_keeps_last_four() {
        assert_eq!(redact_phone("+1 555 867 5309"), "****5309");
        assert_eq!(redact_phone("42"), "****");
    }
}
