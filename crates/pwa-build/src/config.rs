//! Plugin options

use pwa_common::{PwaError, Result, ResultExt};
use pwa_runtime::RemoteApiRoute;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::assets::normalize_base;

/// How a new worker version reaches the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegisterType {
    /// The new version waits until the page asks for it.
    #[default]
    Prompt,
    /// The new version activates as soon as it is installed.
    AutoUpdate,
}

impl RegisterType {
    pub fn is_auto_update(&self) -> bool {
        matches!(self, RegisterType::AutoUpdate)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkboxOptions {
    /// Patterns whose extensions select which build assets are precached,
    /// e.g. `**/*.{js,css,html,png}`.
    pub glob_patterns: Vec<String>,
}

/// Plugin options, as written in `pwa.config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginOptions {
    pub register_type: RegisterType,

    /// Extra files to precache regardless of extension.
    pub include_assets: Vec<String>,

    /// Application descriptor, passed through to `manifest.webmanifest`.
    pub manifest: Option<serde_json::Value>,

    pub workbox: WorkboxOptions,

    /// Public base path the app is served from.
    pub base: Option<String>,

    /// Prefix for every cache store name.
    pub cache_prefix: Option<String>,

    /// Third-party data API answered network-first.
    pub remote_api: RemoteApiRoute,
}

impl PluginOptions {
    /// Load options from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .context(format!("reading plugin options from {}", path.display()))?;
        debug!(path = %path.display(), "Loaded plugin options");
        Self::from_json(&text)
    }

    /// Parse options from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let options: Self =
            serde_json::from_str(text).context("plugin options are not valid JSON")?;
        options.validate()?;
        Ok(options)
    }

    /// Reject options that would produce an unusable worker.
    pub fn validate(&self) -> Result<()> {
        if let Some(prefix) = &self.cache_prefix {
            if prefix.is_empty() || prefix.contains(char::is_whitespace) {
                return Err(PwaError::config(format!(
                    "cachePrefix must be a non-empty word, got {prefix:?}"
                )));
            }
        }
        if self.remote_api.host_suffix.is_empty() {
            return Err(PwaError::config("remoteApi.hostSuffix must not be empty"));
        }
        if !self.remote_api.path_prefix.starts_with('/') {
            return Err(PwaError::config(format!(
                "remoteApi.pathPrefix must start with '/', got {:?}",
                self.remote_api.path_prefix
            )));
        }
        if let Some(base) = &self.base {
            if base.contains("://") {
                return Err(PwaError::config(format!(
                    "base must be a path, not a URL: {base}"
                )));
            }
        }
        Ok(())
    }

    /// Normalized base path, always ending in `/`.
    pub fn base(&self) -> String {
        normalize_base(self.base.as_deref().unwrap_or("/"))
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_register_type(mut self, register_type: RegisterType) -> Self {
        self.register_type = register_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_uses_defaults() {
        let options = PluginOptions::from_json("{}").unwrap();

        assert_eq!(options.register_type, RegisterType::Prompt);
        assert!(options.include_assets.is_empty());
        assert!(options.manifest.is_none());
        assert_eq!(options.base(), "/");
        assert_eq!(options.remote_api.host_suffix, "supabase.co");
    }

    #[test]
    fn test_camel_case_fields() {
        let options = PluginOptions::from_json(
            r#"{
                "registerType": "autoUpdate",
                "includeAssets": ["/favicon.svg", "robots.txt"],
                "manifest": { "name": "LinkNest", "short_name": "LinkNest" },
                "workbox": { "globPatterns": ["**/*.{js,css,html,png}"] },
                "base": "/app",
                "cachePrefix": "linknest",
                "remoteApi": { "hostSuffix": "example.co", "pathPrefix": "/data/" }
            }"#,
        )
        .unwrap();

        assert!(options.register_type.is_auto_update());
        assert_eq!(options.include_assets.len(), 2);
        assert_eq!(options.workbox.glob_patterns, vec!["**/*.{js,css,html,png}"]);
        assert_eq!(options.base(), "/app/");
        assert_eq!(options.cache_prefix.as_deref(), Some("linknest"));
        assert_eq!(options.remote_api.path_prefix, "/data/");
        assert_eq!(options.manifest.unwrap()["name"], "LinkNest");
    }

    #[test]
    fn test_unknown_register_type_is_config_error() {
        let err = PluginOptions::from_json(r#"{ "registerType": "eager" }"#).unwrap_err();
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_validation() {
        assert!(PluginOptions::from_json(r#"{ "cachePrefix": "" }"#).is_err());
        assert!(PluginOptions::from_json(r#"{ "base": "https://cdn.test/" }"#).is_err());
        assert!(PluginOptions::from_json(
            r#"{ "remoteApi": { "hostSuffix": "x.co", "pathPrefix": "rest" } }"#
        )
        .is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pwa.config.json");
        std::fs::write(&path, r#"{ "registerType": "prompt" }"#).unwrap();

        let options = PluginOptions::from_file(&path).unwrap();
        assert_eq!(options.register_type, RegisterType::Prompt);

        let missing = PluginOptions::from_file(dir.path().join("nope.json")).unwrap_err();
        assert!(missing.to_string().contains("nope.json"));
    }
}
