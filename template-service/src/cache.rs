use std::{collections::HashMap, sync::Arc};

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

/// Copy-on-write-ish cache for `format` results, keyed by
/// SHA-256(template_id ⊕ variables). Readers never block writers for
/// long: the lock only guards the map itself, not the value computation.
#[derive(Clone, Default)]
pub struct FormatCache {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl FormatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(template_id: &str, variables_repr: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(template_id.as_bytes());
        hasher.update([0u8]); // separator so "ab"+"c" != "a"+"bc"
        hasher.update(variables_repr.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }

    pub async fn put(&self, key: String, value: String) {
        self.entries.write().await.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = FormatCache::new();
        let key = FormatCache::key("t1", "a=1");
        assert!(cache.get(&key).await.is_none());
        cache.put(key.clone(), "rendered".to_string()).await;
        assert_eq!(cache.get(&key).await, Some("rendered".to_string()));
    }

    #[test]
    fn key_distinguishes_boundary_concatenation() {
        let k1 = FormatCache::key("ab", "c");
        let k2 = FormatCache::key("a", "bc");
        assert_ne!(k1, k2);
    }
}
