//! Cache API: named stores of request → response.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::request::{FetchResponse, Request};

// ==================== Entries ====================

/// A cached request/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Snapshot a response for storage under the request's key.
    pub fn from_response(request: &Request, response: &FetchResponse) -> Self {
        Self {
            url: request.cache_key().to_string(),
            method: request.method.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            cached_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        }
    }
}

// ==================== Cache ====================

/// A cache instance.
#[derive(Debug, Default)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    /// Cached entries.
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request.
    pub fn match_request(&self, url: &str) -> Option<&CacheEntry> {
        self.entries.get(url)
    }

    /// Store an entry, replacing any previous one for the same URL.
    pub fn put(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.url.clone(), entry);
    }

    /// Delete entry.
    pub fn delete(&mut self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    /// Get all keys (URLs).
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ==================== Cache Storage ====================

/// Cache storage (caches global).
///
/// Stores are enumerated and searched in creation order.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, Cache>,
    order: Vec<String>,
}

impl CacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a cache (creates if doesn't exist).
    pub fn open(&mut self, name: &str) -> &mut Cache {
        if !self.caches.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }

    /// Look up an existing cache without creating it.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    /// Check if cache exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Delete a cache.
    pub fn delete(&mut self, name: &str) -> bool {
        self.order.retain(|n| n != name);
        self.caches.remove(name).is_some()
    }

    /// Get all cache names.
    pub fn keys(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Match across all caches.
    pub fn match_request(&self, url: &str) -> Option<&CacheEntry> {
        self.order
            .iter()
            .filter_map(|name| self.caches.get(name))
            .find_map(|cache| cache.match_request(url))
    }
}

// ==================== Store Names ====================

/// The six store names of one build, all suffixed with its version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheNames {
    /// Install-time copies of the precache set.
    pub precache: String,
    /// Page navigations.
    pub runtime: String,
    /// Scripts, styles and workers.
    pub static_assets: String,
    /// Images and fonts.
    pub images: String,
    /// First-party API reads.
    pub api: String,
    /// Third-party data API reads.
    pub remote_api: String,
}

impl CacheNames {
    /// Derive every store name for `version`, optionally namespaced by `prefix`.
    pub fn versioned(prefix: Option<&str>, version: &str) -> Self {
        let name = |purpose: &str| match prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}-{purpose}-{version}"),
            _ => format!("{purpose}-{version}"),
        };
        Self {
            precache: name("precache"),
            runtime: name("runtime"),
            static_assets: name("static"),
            images: name("images"),
            api: name("api"),
            remote_api: name("remote-api"),
        }
    }

    pub fn all(&self) -> [&str; 6] {
        [
            self.precache.as_str(),
            self.runtime.as_str(),
            self.static_assets.as_str(),
            self.images.as_str(),
            self.api.as_str(),
            self.remote_api.as_str(),
        ]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.all().contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn entry(url: &str) -> CacheEntry {
        let request = Request::get(Url::parse(url).unwrap());
        CacheEntry::from_response(&request, &FetchResponse::new(200, "body"))
    }

    #[test]
    fn test_cache() {
        let mut cache = Cache::new("v1");

        cache.put(entry("https://app.test/style.css"));

        assert!(cache.match_request("https://app.test/style.css").is_some());
        assert!(cache.match_request("https://app.test/other.css").is_none());
    }

    #[test]
    fn test_cache_put_replaces() {
        let mut cache = Cache::new("v1");
        cache.put(entry("https://app.test/a.js"));

        let mut newer = entry("https://app.test/a.js");
        newer.body = b"newer".to_vec();
        cache.put(newer);

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.match_request("https://app.test/a.js").unwrap().body,
            b"newer"
        );
    }

    #[test]
    fn test_cache_delete() {
        let mut cache = Cache::new("v1");

        cache.put(entry("https://app.test/style.css"));
        assert!(cache.delete("https://app.test/style.css"));
        assert!(cache.match_request("https://app.test/style.css").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_storage() {
        let mut storage = CacheStorage::new();

        assert!(!storage.has("v1"));

        storage.open("v1");
        assert!(storage.has("v1"));

        assert!(storage.delete("v1"));
        assert!(!storage.has("v1"));
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn test_cache_storage_match_in_creation_order() {
        let mut storage = CacheStorage::new();
        let mut first = entry("https://app.test/a.js");
        first.body = b"first".to_vec();
        storage.open("first").put(first);
        storage.open("second").put(entry("https://app.test/a.js"));

        assert_eq!(storage.keys(), vec!["first", "second"]);
        let hit = storage.match_request("https://app.test/a.js").unwrap();
        assert_eq!(hit.body, b"first");
    }

    #[test]
    fn test_cache_names_versioned() {
        let names = CacheNames::versioned(None, "abc123");
        assert_eq!(names.precache, "precache-abc123");
        assert_eq!(names.remote_api, "remote-api-abc123");

        let names = CacheNames::versioned(Some("linknest"), "abc123");
        assert_eq!(names.static_assets, "linknest-static-abc123");
        assert!(names.contains("linknest-images-abc123"));
        assert!(!names.contains("linknest-images-other"));
    }

    #[test]
    fn test_cache_names_are_distinct() {
        let names = CacheNames::versioned(None, "v");
        let all = names.all();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
