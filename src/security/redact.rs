//! Masking of identifiers before they reach logs.

/// Characters of an account reference left visible.
const REFERENCE_PREFIX: usize = 3;

/// Show only a short prefix of an account reference.
pub fn redact_reference(reference: &str) -> String {
    let prefix: String = reference.chars().take(REFERENCE_PREFIX).collect();
    format!("{}***", prefix)
}

/// Keep the country code and last three digits of a phone number.
pub fn redact_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().collect();
    if digits.len() <= 6 {
        return "***".to_string();
    }
    let head: String = digits[..3].iter().collect();
    let tail: String = digits[digits.len() - 3..].iter().collect();
    format!("{}***{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference() {
        assert_eq!(redact_reference("INV-2024-0042"), "INV***");
        assert_eq!(redact_reference("AB"), "AB***");
        assert_eq!(redact_reference(""), "***");
    }

    #[test]
    fn test_phone() {
        assert_eq!(redact_phone("254712345678"), "254***678");
        assert_eq!(redact_phone("0712"), "***");
    }
}
