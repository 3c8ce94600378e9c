//! 安全的日志记录工具
//!
//! Tokens and client secrets never reach the logs in clear text; use [`Redacted`]
//! wherever one of them is formatted.

use std::fmt;

/// Number of leading characters left visible
const VISIBLE_CHARS: usize = 8;

/// Redacted display of a secret value
///
/// Shows the first 8 characters followed by `***`; anything that short is fully masked.
///
/// # 示例
/// ```
/// use inventory_report::logging::Redacted;
///
/// let token = "eyJhbGciOiJSUzI1NiJ9.payload.signature";
/// assert_eq!(Redacted::new(token).to_string(), "eyJhbGci***");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Redacted<'a> {
    inner: &'a str,
}

impl<'a> Redacted<'a> {
    pub fn new(secret: &'a str) -> Self {
        Self { inner: secret }
    }
}

impl fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chars = self.inner.char_indices();
        match chars.nth(VISIBLE_CHARS) {
            // More than VISIBLE_CHARS characters: keep the prefix
            Some((end, _)) => write!(f, "{}***", &self.inner[..end]),
            None => write!(f, "***"),
        }
    }
}

/// Strip secrets that upstream may echo back in an error body
pub fn redact_secret_in(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, &Redacted::new(secret).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_display() {
        let token = "pit-1234567890abcdef";
        assert_eq!(format!("{}", Redacted::new(token)), "pit-1234***");
    }

    #[test]
    fn test_redacted_short_value() {
        assert_eq!(Redacted::new("abc").to_string(), "***");
        assert_eq!(Redacted::new("12345678").to_string(), "***");
        assert_eq!(Redacted::new("").to_string(), "***");
    }

    #[test]
    fn test_redacted_multibyte() {
        assert_eq!(Redacted::new("ñññññññññ").to_string(), "ññññññññ***");
    }

    #[test]
    fn test_redact_secret_in() {
        let body = r#"{"error":"invalid client","client_secret":"abcdefghijklmnop"}"#;
        let redacted = redact_secret_in(body, "abcdefghijklmnop");
        assert!(!redacted.contains("ijklmnop"));
        assert!(redacted.contains("abcdefgh***"));

        assert_eq!(redact_secret_in("unchanged", ""), "unchanged");
    }
}
