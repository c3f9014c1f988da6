//! One-time password store for password resets
//!
//! Codes are 6-digit, expire after 10 minutes and are consumed on first
//! successful verification. Held in memory; a restart invalidates all
//! outstanding codes.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;

/// OTP validity window (10 minutes)
const OTP_EXPIRATION_MINUTES: i64 = 10;

#[derive(Debug, Clone)]
struct OtpEntry {
    code: String,
    expires_at: DateTime<Utc>,
}

/// In-memory store mapping email -> pending reset code
#[derive(Default)]
pub struct OtpStore {
    codes: DashMap<String, OtpEntry>,
}

impl OtpStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh 6-digit code for an email, replacing any pending one
    pub fn generate(&self, email: &str) -> String {
        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        let entry = OtpEntry {
            code: code.clone(),
            expires_at: Utc::now() + Duration::minutes(OTP_EXPIRATION_MINUTES),
        };
        self.codes.insert(email.to_lowercase(), entry);
        code
    }

    /// Verify a code for an email. A correct, unexpired code is consumed;
    /// anything else leaves the pending code in place (expired ones are
    /// dropped).
    pub fn verify(&self, email: &str, code: &str) -> bool {
        let key = email.to_lowercase();

        let entry = match self.codes.get(&key) {
            Some(e) => e.clone(),
            None => return false,
        };

        if entry.expires_at < Utc::now() {
            self.codes.remove(&key);
            return false;
        }

        if entry.code != code {
            return false;
        }

        self.codes.remove(&key);
        true
    }

    /// Drop all expired codes, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.codes.len();
        self.codes.retain(|_, entry| entry.expires_at >= now);
        before - self.codes.len()
    }

    /// Number of pending codes
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the store has no pending codes
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_produces_six_digits() {
        let store = OtpStore::new();
        let code = store.generate("a@b.com");
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_verify_correct_code_consumes_it() {
        let store = OtpStore::new();
        let code = store.generate("a@b.com");

        assert!(store.verify("a@b.com", &code));
        // Consumed: second use fails
        assert!(!store.verify("a@b.com", &code));
    }

    #[test]
    fn test_verify_wrong_code_keeps_pending() {
        let store = OtpStore::new();
        let code = store.generate("a@b.com");

        assert!(!store.verify("a@b.com", "000000000"));
        // Correct code still works afterwards
        assert!(store.verify("a@b.com", &code));
    }

    #[test]
    fn test_verify_unknown_email() {
        let store = OtpStore::new();
        assert!(!store.verify("nobody@b.com", "123456"));
    }

    #[test]
    fn test_email_lookup_is_case_insensitive() {
        let store = OtpStore::new();
        let code = store.generate("Admin@Example.com");
        assert!(store.verify("admin@example.com", &code));
    }

    #[test]
    fn test_regenerate_replaces_previous_code() {
        let store = OtpStore::new();
        let first = store.generate("a@b.com");
        let second = store.generate("a@b.com");

        if first != second {
            assert!(!store.verify("a@b.com", &first));
        }
        assert!(store.verify("a@b.com", &second));
    }

    #[test]
    fn test_cleanup_expired() {
        let store = OtpStore::new();
        store.generate("a@b.com");
        store.generate("b@b.com");

        // Nothing expired yet
        assert_eq!(store.cleanup_expired(), 0);
        assert_eq!(store.len(), 2);
    }
}
