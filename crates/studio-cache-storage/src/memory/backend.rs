//! In-process cache tier using DashMap

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

use studio_cache_core::CacheEntry;

/// In-process entry map
///
/// Holds decoded entries so reads never touch the persistent tier.
/// Cloning creates a new handle to the SAME underlying map.
#[derive(Clone, Default)]
pub struct MemoryTier {
    data: Arc<DashMap<String, CacheEntry<Value>>>,
}

impl MemoryTier {
    /// Create an empty tier
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the entry stored under `key`
    pub fn get(&self, key: &str) -> Option<CacheEntry<Value>> {
        self.data.get(key).map(|entry| entry.clone())
    }

    /// Store an entry under its own key, replacing any previous one
    pub fn insert(&self, entry: CacheEntry<Value>) {
        self.data.insert(entry.key.clone(), entry);
    }

    /// Remove one entry
    pub fn remove(&self, key: &str) -> Option<CacheEntry<Value>> {
        self.data.remove(key).map(|(_, entry)| entry)
    }

    /// Remove the entry only if it has expired at `now`
    ///
    /// A concurrent write that replaced the entry with a fresh one is kept.
    pub fn remove_if_expired(&self, key: &str, now: u64) -> bool {
        self.data
            .remove_if(key, |_, entry| entry.is_expired_at(now))
            .is_some()
    }

    /// Keys of all entries matching `pred`
    pub fn keys_where<F>(&self, pred: F) -> Vec<String>
    where
        F: Fn(&CacheEntry<Value>) -> bool,
    {
        self.data
            .iter()
            .filter(|entry| pred(entry.value()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// The `count` oldest keys by write order, oldest first
    pub fn oldest_keys(&self, count: usize) -> Vec<String> {
        if count == 0 {
            return Vec::new();
        }
        let mut order: Vec<((u64, u64), String)> = self
            .data
            .iter()
            .map(|entry| (entry.write_order(), entry.key().clone()))
            .collect();
        order.sort_unstable();
        order.into_iter().take(count).map(|(_, key)| key).collect()
    }

    /// Highest write sequence currently stored
    pub fn max_seq(&self) -> u64 {
        self.data.iter().map(|entry| entry.seq).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drop every entry, returning how many were held
    pub fn clear(&self) -> usize {
        let count = self.data.len();
        self.data.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(key: &str, account: &str, seq: u64) -> CacheEntry<Value> {
        CacheEntry::new(key, account, "ns", Value::from(seq), Duration::from_secs(60)).with_seq(seq)
    }

    #[test]
    fn test_insert_get_remove() {
        let tier = MemoryTier::new();
        tier.insert(entry("a", "acct", 1));

        assert_eq!(tier.get("a").map(|e| e.data), Some(Value::from(1)));
        assert!(tier.remove("a").is_some());
        assert!(tier.get("a").is_none());
        assert!(tier.is_empty());
    }

    #[test]
    fn test_insert_replaces_whole_entry() {
        let tier = MemoryTier::new();
        tier.insert(entry("a", "acct", 1));
        tier.insert(entry("a", "other", 2));

        let stored = tier.get("a").unwrap();
        assert_eq!(stored.account_id, "other");
        assert_eq!(stored.seq, 2);
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_oldest_keys_follow_write_order() {
        let tier = MemoryTier::new();
        let mut first = entry("first", "acct", 1);
        let mut second = entry("second", "acct", 2);
        let mut third = entry("third", "acct", 3);
        first.timestamp = 100;
        second.timestamp = 100;
        third.timestamp = 50;
        tier.insert(second);
        tier.insert(first);
        tier.insert(third);

        assert_eq!(tier.oldest_keys(2), vec!["third", "first"]);
        assert!(tier.oldest_keys(0).is_empty());
        assert_eq!(tier.max_seq(), 3);
    }

    #[test]
    fn test_keys_where() {
        let tier = MemoryTier::new();
        tier.insert(entry("a", "acct-1", 1));
        tier.insert(entry("b", "acct-2", 2));

        let keys = tier.keys_where(|e| e.account_id == "acct-2");
        assert_eq!(keys, vec!["b"]);
    }

    #[test]
    fn test_clone_shares_state() {
        let tier = MemoryTier::new();
        let handle = tier.clone();
        tier.insert(entry("a", "acct", 1));
        assert_eq!(handle.len(), 1);
        assert_eq!(handle.clear(), 1);
        assert!(tier.is_empty());
    }
}
