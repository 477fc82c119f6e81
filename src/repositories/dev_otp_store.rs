// Process-wide in-memory OTP store used only when `dev_otp_enabled()` holds.
// Mirrors the shape of the token blacklist service: a DashMap behind an
// Arc, with a background task sweeping expired entries.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::repositories::traits::DevOtpStore;

struct Entry {
    otp: String,
    expires_at: DateTime<Utc>,
}

pub struct InMemoryDevOtpStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl InMemoryDevOtpStore {
    pub fn new() -> Self {
        let entries: Arc<DashMap<String, Entry>> = Arc::new(DashMap::new());

        let cleanup_entries = entries.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                let now = Utc::now();
                cleanup_entries.retain(|_, entry| entry.expires_at > now);
            }
        });

        Self { entries }
    }
}

impl Default for InMemoryDevOtpStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DevOtpStore for InMemoryDevOtpStore {
    fn put(&self, challenge_id: &str, otp: &str, expires_at: DateTime<Utc>) {
        self.entries.insert(
            challenge_id.to_string(),
            Entry {
                otp: otp.to_string(),
                expires_at,
            },
        );
    }

    fn get(&self, challenge_id: &str) -> Option<String> {
        self.entries.get(challenge_id).and_then(|entry| {
            if entry.expires_at > Utc::now() {
                Some(entry.otp.clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = InMemoryDevOtpStore::new();
        store.put("challenge-1", "123456", Utc::now() + chrono::Duration::minutes(5));
        assert_eq!(store.get("challenge-1"), Some("123456".to_string()));
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let store = InMemoryDevOtpStore::new();
        store.put("challenge-1", "123456", Utc::now() - chrono::Duration::minutes(1));
        assert_eq!(store.get("challenge-1"), None);
    }
}
