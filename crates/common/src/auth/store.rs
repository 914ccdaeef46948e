//! In-memory token store
//!
//! Holds the current [`TokenRecord`] for one OAuth2 configuration. Readers get
//! an `Arc` snapshot; writers swap the whole record, so a reader never sees an
//! access token paired with another token's expiry.

use std::sync::Arc;

use parking_lot::RwLock;

use super::types::TokenRecord;

/// Atomic-replace holder for the current token record
#[derive(Debug, Default)]
pub struct TokenStore {
    current: RwLock<Arc<TokenRecord>>,
}

impl TokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `record`.
    #[must_use]
    pub fn with_record(record: TokenRecord) -> Self {
        Self { current: RwLock::new(Arc::new(record)) }
    }

    /// Snapshot of the last written record.
    pub fn read(&self) -> Arc<TokenRecord> {
        Arc::clone(&self.current.read())
    }

    /// Replace the record. Visible to every subsequent [`read`](Self::read).
    pub fn write(&self, record: TokenRecord) {
        *self.current.write() = Arc::new(record);
    }

    /// Forget all tokens.
    pub fn clear(&self) {
        self.write(TokenRecord::default());
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn record(token: &str, expires_in: i64) -> TokenRecord {
        TokenRecord {
            access_token: Some(token.to_string()),
            refresh_token: None,
            expires_in_secs: Some(expires_in),
            obtained_at_millis: Some(0),
        }
    }

    /// Validates that a write is observed by every later read.
    ///
    /// Assertions:
    /// - Repeated reads return exactly the written record.
    /// - Snapshots taken before a write keep their old value.
    #[test]
    fn test_write_then_read_returns_same_record() {
        let store = TokenStore::new();
        let before = store.read();

        store.write(record("A", 3600));
        for _ in 0..3 {
            assert_eq!(*store.read(), record("A", 3600));
        }
        assert_eq!(*before, TokenRecord::default());
    }

    #[test]
    fn test_clear_resets_to_empty() {
        let store = TokenStore::with_record(record("A", 3600));
        store.clear();
        assert_eq!(*store.read(), TokenRecord::default());
    }

    /// Validates that concurrent readers never observe a torn record.
    ///
    /// Assertions:
    /// - Every snapshot pairs token `Tn` with expiry `n`.
    #[test]
    fn test_concurrent_readers_see_whole_records() {
        let store = Arc::new(TokenStore::with_record(record("T0", 0)));

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 1..500 {
                    store.write(record(&format!("T{n}"), n));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snapshot = store.read();
                        let expected = format!("T{}", snapshot.expires_in_secs.unwrap());
                        assert_eq!(snapshot.access_token.as_deref(), Some(expected.as_str()));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
