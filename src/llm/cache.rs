//! Read-through response cache in front of the text-generation service.
//!
//! Keys are the SHA-256 of model, system prompt and prompt, in unpadded
//! URL-safe base64 so they can double as file or URL names. A cache that
//! errors is bypassed: the request always falls through to the service.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use base64::Engine;
use sha2::{Digest, Sha256};

use super::{CacheError, LlmClient, LlmError};

/// Storage behind `CachedLlmClient`.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn put(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// Cache key for one generation request.
pub fn cache_key(model: &str, system: &str, prompt: &str) -> String {
    let mut hasher = Sha256::new();
    for part in [model, system, prompt] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Bounded in-process cache; evicts the oldest entry when full.
pub struct InMemoryCache {
    capacity: usize,
    inner: Mutex<CacheEntries>,
}

#[derive(Default)]
struct CacheEntries {
    values: HashMap<String, String>,
    order: VecDeque<String>,
}

impl InMemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(CacheEntries::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|e| e.values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for InMemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self
            .inner
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".into()))?;
        Ok(entries.values.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self
            .inner
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".into()))?;

        if entries.values.insert(key.to_string(), value.to_string()).is_none() {
            entries.order.push_back(key.to_string());
        }
        while entries.values.len() > self.capacity {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.values.remove(&oldest);
                }
                None => break,
            }
        }
        Ok(())
    }
}

/// Decorates any `LlmClient` with a read-through cache.
pub struct CachedLlmClient<C> {
    inner: C,
    cache: Arc<dyn ResponseCache>,
}

impl<C: LlmClient> CachedLlmClient<C> {
    pub fn new(inner: C, cache: Arc<dyn ResponseCache>) -> Self {
        Self { inner, cache }
    }
}

impl<C: LlmClient> LlmClient for CachedLlmClient<C> {
    fn generate(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let key = cache_key(self.inner.model_name(), system, prompt);

        match self.cache.get(&key) {
            Ok(Some(hit)) => {
                tracing::debug!(model = self.inner.model_name(), "LLM cache hit");
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "LLM cache lookup failed, calling service");
            }
        }

        let reply = self.inner.generate(prompt, system)?;

        if let Err(e) = self.cache.put(&key, &reply) {
            tracing::warn!(error = %e, "LLM cache store failed");
        }
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    struct BrokenCache;

    impl ResponseCache for BrokenCache {
        fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        fn put(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    #[test]
    fn cache_key_is_deterministic() {
        assert_eq!(cache_key("m", "s", "p"), cache_key("m", "s", "p"));
        assert_ne!(cache_key("m", "s", "p"), cache_key("m", "s", "q"));
    }

    #[test]
    fn cache_key_is_url_safe() {
        let key = cache_key("medgemma:4b", "system prompt", "increased thirst");
        assert_eq!(key.len(), 43);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn cache_key_separates_fields() {
        // Same concatenation, different field boundaries.
        assert_ne!(cache_key("m", "ab", "c"), cache_key("m", "a", "bc"));
    }

    #[test]
    fn second_identical_call_is_served_from_cache() {
        let mock = Arc::new(MockLlmClient::new("reply"));
        let cache = Arc::new(InMemoryCache::new(8));
        let client = CachedLlmClient::new(mock.clone(), cache.clone());

        assert_eq!(client.generate("p", "s").unwrap(), "reply");
        assert_eq!(client.generate("p", "s").unwrap(), "reply");
        assert_eq!(mock.calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_prompts_miss() {
        let mock = Arc::new(MockLlmClient::new("reply"));
        let client = CachedLlmClient::new(mock.clone(), Arc::new(InMemoryCache::new(8)));
        client.generate("p1", "s").unwrap();
        client.generate("p2", "s").unwrap();
        assert_eq!(mock.calls(), 2);
    }

    #[test]
    fn broken_cache_degrades_to_service_call() {
        let mock = Arc::new(MockLlmClient::new("reply"));
        let client = CachedLlmClient::new(mock.clone(), Arc::new(BrokenCache));
        assert_eq!(client.generate("p", "s").unwrap(), "reply");
        assert_eq!(client.generate("p", "s").unwrap(), "reply");
        assert_eq!(mock.calls(), 2);
    }

    #[test]
    fn service_errors_are_not_cached() {
        let mock = Arc::new(MockLlmClient::failing(LlmError::Timeout(1)));
        let cache = Arc::new(InMemoryCache::new(8));
        let client = CachedLlmClient::new(mock, cache.clone());
        assert!(client.generate("p", "s").is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_evicts_oldest() {
        let cache = InMemoryCache::new(2);
        cache.put("a", "1").unwrap();
        cache.put("b", "2").unwrap();
        cache.put("c", "3").unwrap();
        assert_eq!(cache.get("a").unwrap(), None);
        assert_eq!(cache.get("c").unwrap().as_deref(), Some("3"));
        assert_eq!(cache.len(), 2);
    }
}
