//! Credential hygiene helpers.
//!
//! The chat client only ever handles one secret (the provider API key), but it
//! is logged at startup and can leak back through provider error bodies. Both
//! paths go through this module before anything reaches a log line or the
//! terminal.

/// Redact sensitive values for safe logging. Shows first 4 chars + "***" suffix.
pub fn redact(value: &str) -> String {
    if value.chars().count() <= 4 {
        "***".to_string()
    } else {
        let prefix: String = value.chars().take(4).collect();
        format!("{prefix}***")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_hides_most_of_value() {
        assert_eq!(redact("abcdefgh"), "abcd***");
        assert_eq!(redact("ab"), "***");
        assert_eq!(redact(""), "***");
        assert_eq!(redact("12345"), "1234***");
    }

    #[test]
    fn redact_respects_char_boundaries() {
        assert_eq!(redact("ключ-секрет"), "ключ***");
    }
}
