use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};

use crate::wire::Completion;

/// SHA-256 hex of the serialized payload.
pub fn payload_key<T: Serialize>(payload: &T) -> anyhow::Result<String> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

struct Inner {
    map: HashMap<String, Completion>,
    /// Front is least recently used.
    order: VecDeque<String>,
}

/// Capacity-bounded LRU of model completions. Owned by the caller and passed
/// by reference; capacity 0 disables caching.
pub struct ResponseCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner { map: HashMap::new(), order: VecDeque::new() }),
        }
    }

    fn touch(order: &mut VecDeque<String>, key: &str) {
        if let Some(pos) = order.iter().position(|k| k == key) {
            if let Some(k) = order.remove(pos) {
                order.push_back(k);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Completion> {
        let mut inner = self.inner.lock();
        let hit = inner.map.get(key).cloned()?;
        Self::touch(&mut inner.order, key);
        Some(hit)
    }

    pub fn insert(&self, key: String, value: Completion) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.map.insert(key.clone(), value).is_some() {
            Self::touch(&mut inner.order, &key);
            return;
        }
        inner.order.push_back(key);
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.map.remove(&evicted);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::TokenCounts;

    fn c(text: &str) -> Completion {
        Completion { text: text.into(), tokens: TokenCounts::default() }
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = ResponseCache::new(2);
        cache.insert("a".into(), c("1"));
        cache.insert("b".into(), c("2"));
        assert!(cache.get("a").is_some()); // b is now oldest
        cache.insert("c".into(), c("3"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").unwrap().text, "1");
        assert_eq!(cache.get("c").unwrap().text, "3");
    }

    #[test]
    fn zero_capacity_disables_cache() {
        let cache = ResponseCache::new(0);
        cache.insert("a".into(), c("1"));
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn keys_are_stable_hex_digests() {
        let k1 = payload_key(&serde_json::json!({"a": 1})).unwrap();
        let k2 = payload_key(&serde_json::json!({"a": 1})).unwrap();
        let k3 = payload_key(&serde_json::json!({"a": 2})).unwrap();
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
        assert_eq!(k1.len(), 64);
    }
}
