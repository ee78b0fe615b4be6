//! Memoization of rendered templates with TTL expiry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::types::{RenderOptions, RenderedTemplate, Template};
use crate::metrics::RenderMetrics;

/// A cached render
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Arc<RenderedTemplate>,
    pub created_at: Instant,
}

impl CacheEntry {
    fn new(value: Arc<RenderedTemplate>) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    /// Check if the entry has outlived `ttl`
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// Render cache owned by a renderer.
///
/// Uses `DashMap` so concurrent renders can read and write without a global
/// lock. Writes are best-effort: a full cache skips the write rather than
/// failing the render.
pub struct RenderCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl RenderCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a live entry. Expired entries are removed on the way out.
    pub fn get(&self, key: &str) -> Option<Arc<RenderedTemplate>> {
        let hit = self.entries.get(key).map(|entry| {
            if entry.is_expired(self.ttl) {
                None
            } else {
                Some(entry.value.clone())
            }
        })?;

        if hit.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(self.ttl));
            RenderMetrics::set_cache_entries(self.entries.len());
            tracing::debug!(cache_key = %key, "Discarding expired render cache entry");
        }
        hit
    }

    /// Store a render. Returns false when the cache is full.
    pub fn insert(&self, key: String, value: Arc<RenderedTemplate>) -> bool {
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            self.purge_expired();
            if self.entries.len() >= self.max_entries {
                tracing::debug!(
                    cache_key = %key,
                    max_entries = self.max_entries,
                    "Render cache full, skipping write"
                );
                return false;
            }
        }

        self.entries.insert(key, CacheEntry::new(value));
        RenderMetrics::set_cache_entries(self.entries.len());
        true
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(self.ttl));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed = removed, "Purged expired render cache entries");
        }
        RenderMetrics::set_cache_entries(self.entries.len());
        removed
    }

    pub fn clear(&self) {
        self.entries.clear();
        RenderMetrics::set_cache_entries(0);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn sha256_hex(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    format!("{:x}", hasher.finalize())
}

/// Stable hash over the template fields
pub fn template_hash(template: &Template) -> String {
    let mut buf = String::new();
    for field in [template.title.as_deref(), Some(template.content.as_str()), template.link.as_deref()] {
        match field {
            Some(text) => {
                // Length prefix keeps ("a", "bc") and ("ab", "c") apart
                buf.push_str(&text.len().to_string());
                buf.push(':');
                buf.push_str(text);
            }
            None => buf.push('-'),
        }
        buf.push('|');
    }
    sha256_hex(buf.as_bytes())
}

/// Serialize with object keys sorted, independent of map ordering
fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), serde_json::Error> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}

/// Stable hash over the data snapshot plus the locale and timezone
pub fn data_hash(data: &Value, options: &RenderOptions) -> Result<String, serde_json::Error> {
    let mut bytes = Vec::new();
    write_canonical(data, &mut bytes)?;
    bytes.push(b'|');
    bytes.extend_from_slice(options.locale.as_bytes());
    bytes.push(b'|');
    bytes.extend_from_slice(options.timezone.as_bytes());
    Ok(sha256_hex(&bytes))
}

/// Cache key for a render call; an explicit `cache_key` option wins
pub fn cache_key(
    template: &Template,
    data: &Value,
    options: &RenderOptions,
) -> Result<String, serde_json::Error> {
    if let Some(key) = &options.cache_key {
        return Ok(key.clone());
    }
    Ok(format!("{}_{}", template_hash(template), data_hash(data, options)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn rendered(content: &str) -> Arc<RenderedTemplate> {
        Arc::new(RenderedTemplate {
            title: None,
            content: content.to_string(),
            link: None,
            rendered_at: Utc::now(),
            context: json!({}),
        })
    }

    #[test]
    fn test_insert_and_get() {
        let cache = RenderCache::new(Duration::from_secs(60), 10);
        let value = rendered("hello");
        assert!(cache.insert("k".to_string(), value.clone()));

        let hit = cache.get("k").unwrap();
        assert!(Arc::ptr_eq(&hit, &value));
        assert!(cache.get("other").is_none());
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let cache = RenderCache::new(Duration::from_millis(20), 10);
        cache.insert("k".to_string(), rendered("hello"));

        std::thread::sleep(Duration::from_millis(40));

        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_full_cache_skips_write() {
        let cache = RenderCache::new(Duration::from_secs(60), 2);
        assert!(cache.insert("a".to_string(), rendered("a")));
        assert!(cache.insert("b".to_string(), rendered("b")));
        assert!(!cache.insert("c".to_string(), rendered("c")));
        // Overwriting an existing key is still allowed
        assert!(cache.insert("a".to_string(), rendered("a2")));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_full_cache_purges_expired_first() {
        let cache = RenderCache::new(Duration::from_millis(20), 1);
        cache.insert("a".to_string(), rendered("a"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.insert("b".to_string(), rendered("b")));
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_clear() {
        let cache = RenderCache::new(Duration::from_secs(60), 10);
        cache.insert("a".to_string(), rendered("a"));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_key_is_stable_and_distinguishes_inputs() {
        let template = Template::new("Hi {{name}}").with_title("T");
        let options = RenderOptions::default();

        let a = cache_key(&template, &json!({"name": "Ann", "age": 3}), &options).unwrap();
        let b = cache_key(&template, &json!({"age": 3, "name": "Ann"}), &options).unwrap();
        assert_eq!(a, b);

        let other_data = cache_key(&template, &json!({"name": "Bob"}), &options).unwrap();
        assert_ne!(a, other_data);

        let other_locale =
            cache_key(&template, &json!({"name": "Ann", "age": 3}), &options.clone().with_locale("en-US"))
                .unwrap();
        assert_ne!(a, other_locale);

        let split_a = template_hash(&Template::new("bc").with_title("a"));
        let split_b = template_hash(&Template::new("c").with_title("ab"));
        assert_ne!(split_a, split_b);
    }

    #[test]
    fn test_explicit_cache_key_wins() {
        let options = RenderOptions::default().with_cache_key("welcome:42");
        let key = cache_key(&Template::new("x"), &json!({}), &options).unwrap();
        assert_eq!(key, "welcome:42");
    }
}
