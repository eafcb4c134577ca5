use std::collections::{HashSet, VecDeque};

use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

use crate::models::LogRecord;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A bounded set of record identities that have already been analyzed.
///
/// Refetched lines show up again with the same identity, so membership here
/// is what makes analysis at-most-once. When the set reaches capacity it
/// compacts to half by dropping the oldest identities, which keeps churn near
/// the cap from compacting on every insert.
#[derive(Debug)]
pub struct AnalyzedSet {
    seen: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl AnalyzedSet {
    /// Creates a set holding at most `capacity` identities.
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(2),
        }
    }

    /// Returns whether an identity was already recorded.
    pub fn contains(&self, identity: &str) -> bool {
        self.seen.contains(identity)
    }

    /// Records an identity, returning `false` if it was already present.
    pub fn insert(&mut self, identity: String) -> bool {
        if self.seen.contains(&identity) {
            return false;
        }

        if self.order.len() >= self.capacity {
            self.compact();
        }

        self.seen.insert(identity.clone());
        self.order.push_back(identity);
        true
    }

    /// Returns how many identities are currently tracked.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn compact(&mut self) {
        let keep = self.capacity / 2;
        while self.order.len() > keep {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Computes the stable identity of a log record.
///
/// The identity covers container, timestamp and message, so the same line
/// refetched on a later tick hashes to the same value while distinct lines
/// sharing a timestamp do not collide.
pub fn record_identity(record: &LogRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.container_id.as_bytes());
    hasher.update(b":");
    hasher.update(
        record
            .timestamp
            .to_rfc3339_opts(SecondsFormat::Micros, true)
            .as_bytes(),
    );
    hasher.update(b":");
    hasher.update(record.message.as_bytes());

    let digest = hex::encode(hasher.finalize());
    digest[..32].to_string()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn record(message: &str) -> LogRecord {
        LogRecord {
            host: "testhost".to_string(),
            container_id: "abc123".to_string(),
            container_name: "web".to_string(),
            compose_project: None,
            compose_service: None,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
            message: message.to_string(),
            level: None,
            http_status: None,
        }
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut set = AnalyzedSet::new(10);

        assert!(set.insert("a".to_string()));
        assert!(!set.insert("a".to_string()));
        assert!(set.insert("b".to_string()));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_compaction_drops_oldest_half() {
        let mut set = AnalyzedSet::new(4);
        for identity in ["a", "b", "c", "d"] {
            set.insert(identity.to_string());
        }

        // The fifth insert trips compaction down to half the capacity.
        set.insert("e".to_string());

        assert_eq!(set.len(), 3);
        assert!(!set.contains("a"));
        assert!(!set.contains("b"));
        assert!(set.contains("c"));
        assert!(set.contains("d"));
        assert!(set.contains("e"));
    }

    #[test]
    fn test_identity_is_stable_and_distinct() {
        let first = record_identity(&record("connection refused"));
        let again = record_identity(&record("connection refused"));
        let other = record_identity(&record("connection reset"));

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
