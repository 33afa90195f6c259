//! Worker synthesis.
//!
//! The worker is plain JavaScript generated from `templates/sw.js`. Every
//! value closed over by the worker (version, store names, precache URLs,
//! routes) is substituted as a JSON literal, so the template itself holds
//! only the cache policy.

use pwa_common::Result;
use pwa_runtime::{CacheNames, RemoteApiRoute, WorkerConfig};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::info;
use url::Url;

use crate::assets::{normalize_base, PrecacheSet, PrecacheUrls};
use crate::config::{PluginOptions, RegisterType};

/// Output path of the worker script, relative to the build root.
pub const WORKER_FILE: &str = "sw.js";

const WORKER_TEMPLATE: &str = include_str!("../templates/sw.js");

const VERSION_LEN: usize = 12;

// ==================== Version ====================

/// Content-derived build version: the first 12 hex digits of SHA-256 over
/// the precache URLs joined by `|`, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionHash(String);

impl VersionHash {
    pub fn of<S: AsRef<str>>(urls: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for (index, url) in urls.iter().enumerate() {
            if index > 0 {
                hasher.update(b"|");
            }
            hasher.update(url.as_ref().as_bytes());
        }
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(VERSION_LEN);
        Self(digest)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ==================== Synthesizer ====================

/// Generates the worker for one build.
#[derive(Debug, Clone)]
pub struct WorkerSynthesizer {
    base: String,
    register_type: RegisterType,
    cache_prefix: Option<String>,
    remote_api: RemoteApiRoute,
}

impl WorkerSynthesizer {
    pub fn new(base: &str, register_type: RegisterType) -> Self {
        Self {
            base: normalize_base(base),
            register_type,
            cache_prefix: None,
            remote_api: RemoteApiRoute::default(),
        }
    }

    pub fn from_options(options: &PluginOptions) -> Self {
        Self::new(&options.base(), options.register_type)
            .with_cache_prefix(options.cache_prefix.clone())
            .with_remote_api(options.remote_api.clone())
    }

    pub fn with_cache_prefix(mut self, prefix: Option<String>) -> Self {
        self.cache_prefix = prefix;
        self
    }

    pub fn with_remote_api(mut self, remote_api: RemoteApiRoute) -> Self {
        self.remote_api = remote_api;
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Version, store names and source of the worker for `precache`.
    pub fn synthesize(&self, precache: &PrecacheSet) -> Result<SynthesizedWorker> {
        let precache_urls = precache.resolve(&self.base);
        let version = VersionHash::of(precache_urls.as_slice());
        let cache_names = CacheNames::versioned(self.cache_prefix.as_deref(), version.as_str());
        let api_prefix = format!("{}api/", self.base);
        let skip_waiting = self.register_type.is_auto_update();

        let source = render(
            WORKER_TEMPLATE,
            &[
                ("VERSION", literal(version.as_str())?),
                ("PRECACHE", literal(&cache_names.precache)?),
                ("RUNTIME", literal(&cache_names.runtime)?),
                ("STATIC_CACHE", literal(&cache_names.static_assets)?),
                ("IMAGE_CACHE", literal(&cache_names.images)?),
                ("API_CACHE", literal(&cache_names.api)?),
                ("REMOTE_API_CACHE", literal(&cache_names.remote_api)?),
                ("OFFLINE_URL", literal(precache_urls.offline_url())?),
                ("PRECACHE_URLS", literal(precache_urls.as_slice())?),
                ("API_PREFIX", literal(&api_prefix)?),
                ("REMOTE_API", literal(&self.remote_api)?),
                ("SKIP_WAITING", literal(&skip_waiting)?),
            ],
        );

        info!(
            version = %version,
            urls = precache_urls.len(),
            skip_waiting,
            "Synthesized worker"
        );

        Ok(SynthesizedWorker {
            version,
            cache_names,
            precache_urls,
            base: self.base.clone(),
            remote_api: self.remote_api.clone(),
            skip_waiting,
            source,
        })
    }
}

/// A generated worker and the values baked into it.
#[derive(Debug, Clone)]
pub struct SynthesizedWorker {
    pub version: VersionHash,
    pub cache_names: CacheNames,
    pub precache_urls: PrecacheUrls,
    pub base: String,
    pub remote_api: RemoteApiRoute,
    pub skip_waiting: bool,
    /// JavaScript source of `sw.js`.
    pub source: String,
}

impl SynthesizedWorker {
    /// The same worker as the runtime crate executes it, served from `origin`.
    pub fn worker_config(&self, origin: Url) -> WorkerConfig {
        WorkerConfig {
            origin,
            base: self.base.clone(),
            version: self.version.to_string(),
            script_url: format!("{}{WORKER_FILE}", self.base),
            precache_urls: self.precache_urls.as_slice().to_vec(),
            offline_url: self.precache_urls.offline_url().to_string(),
            cache_names: self.cache_names.clone(),
            remote_api: self.remote_api.clone(),
            skip_waiting: self.skip_waiting,
        }
    }
}

/// Substitute `__NAME__` placeholders in a template, in one pass.
///
/// Substituted values are never rescanned, so a value that happens to
/// contain a placeholder is emitted as it is.
pub(crate) fn render(template: &str, values: &[(&str, String)]) -> String {
    let mut source = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("__") {
        let after = &rest[start + 2..];
        let value = after
            .find("__")
            .map(|end| &after[..end])
            .filter(|name| is_placeholder_name(name))
            .and_then(|name| {
                values
                    .iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| (name.len(), value))
            });

        match value {
            Some((len, value)) => {
                source.push_str(&rest[..start]);
                source.push_str(value);
                rest = &after[len + 2..];
            }
            None => {
                source.push_str(&rest[..start + 2]);
                rest = after;
            }
        }
    }

    source.push_str(rest);
    source
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_uppercase() || b == b'_')
}

/// A value as a JavaScript literal.
pub(crate) fn literal<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
