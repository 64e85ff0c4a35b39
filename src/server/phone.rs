//! Phone number canonicalization
//!
//! Customers are keyed by (phone, company), so every number is normalized
//! before lookup or storage.

/// Normalize a raw phone string to `+<country><number>`.
///
/// Bare 10-digit numbers are treated as US numbers. Returns `None` when the
/// input cannot be read as a phone number.
pub fn normalize_phone_number(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        10 => Some(format!("+1{}", digits)),
        11 if digits.starts_with('1') => Some(format!("+{}", digits)),
        8..=15 if raw.starts_with('+') => Some(format!("+{}", digits)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_us_formats_normalize_identically() {
        let expected = Some("+15551234567".to_string());
        assert_eq!(normalize_phone_number("5551234567"), expected);
        assert_eq!(normalize_phone_number("(555) 123-4567"), expected);
        assert_eq!(normalize_phone_number("555.123.4567"), expected);
        assert_eq!(normalize_phone_number("15551234567"), expected);
        assert_eq!(normalize_phone_number("+1 (555) 123-4567"), expected);
        assert_eq!(normalize_phone_number("  +15551234567 "), expected);
    }

    #[test]
    fn test_international_number_kept() {
        assert_eq!(
            normalize_phone_number("+44 20 7946 0958"),
            Some("+442079460958".to_string())
        );
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert_eq!(normalize_phone_number(""), None);
        assert_eq!(normalize_phone_number("anonymous"), None);
        assert_eq!(normalize_phone_number("12345"), None);
        assert_eq!(normalize_phone_number("25551234567"), None);
    }
}
