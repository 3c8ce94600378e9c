use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use subtle::ConstantTimeEq;

/// Generate a random state parameter (128 bits, base64url)
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: [u8; 16] = rng.gen();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Compare the state echoed by the callback with the one we sent
pub fn state_matches(expected: &str, received: Option<&str>) -> bool {
    match received {
        Some(received) => expected.as_bytes().ct_eq(received.as_bytes()).into(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_url_safe_and_unique() {
        let first = generate_state();
        let second = generate_state();

        // 16 bytes base64url without padding
        assert_eq!(first.len(), 22);
        assert!(!first.contains('=') && !first.contains('+') && !first.contains('/'));
        assert_ne!(first, second);
    }

    #[test]
    fn test_state_matches() {
        assert!(state_matches("abc", Some("abc")));
        assert!(!state_matches("abc", Some("abd")));
        assert!(!state_matches("abc", Some("abcd")));
        assert!(!state_matches("abc", None));
    }
}
