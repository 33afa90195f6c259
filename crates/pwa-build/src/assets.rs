//! Precache collection.
//!
//! Turns the finished build output into the ordered set of files the
//! worker stores at install time, and resolves that set into the URLs the
//! worker fetches.

use hashbrown::HashSet;
use indexmap::IndexSet;
use pwa_common::{PwaError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::manifest::MANIFEST_FILE;
use crate::register_module::REGISTER_MODULE_FILE;
use crate::synth::WORKER_FILE;

/// Root document of the app.
pub const INDEX_FILE: &str = "index.html";
/// Document served for navigations while offline.
pub const OFFLINE_FILE: &str = "offline.html";

const CHUNK_EXTENSIONS: [&str; 3] = ["js", "mjs", "cjs"];

// ==================== Build Output ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Executable code emitted by the bundler.
    Chunk,
    /// Anything else: documents, styles, images, fonts.
    Asset,
}

/// One file of the build output, path relative to the output root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildAsset {
    pub path: String,
    pub kind: AssetKind,
}

impl BuildAsset {
    pub fn chunk(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: AssetKind::Chunk,
        }
    }

    pub fn asset(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: AssetKind::Asset,
        }
    }

    /// Lower-cased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.path).map(|ext| ext.to_ascii_lowercase())
    }
}

/// The finished list of files a build produced.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    assets: Vec<BuildAsset>,
    root: Option<PathBuf>,
}

impl BuildOutput {
    pub fn new(assets: Vec<BuildAsset>) -> Self {
        Self { assets, root: None }
    }

    /// Scan a finished output directory.
    ///
    /// Files are listed in sorted order with `/` separators. Scripts are
    /// chunks, everything else is an asset. Artifacts this plugin emitted
    /// on a previous run are skipped.
    pub fn scan(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(PwaError::InvalidArgument(format!(
                "build output {} is not a directory",
                dir.display()
            )));
        }

        let mut assets = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| PwaError::InvalidArgument(e.to_string()))?;
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if is_plugin_output(&path) {
                trace!(path = %path, "Skipping previous plugin output");
                continue;
            }

            let is_chunk = extension_of(&path)
                .map(|ext| CHUNK_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            assets.push(if is_chunk {
                BuildAsset::chunk(path)
            } else {
                BuildAsset::asset(path)
            });
        }

        debug!(dir = %dir.display(), files = assets.len(), "Scanned build output");
        Ok(Self {
            assets,
            root: Some(dir.to_path_buf()),
        })
    }

    pub fn push(&mut self, asset: BuildAsset) {
        self.assets.push(asset);
    }

    pub fn assets(&self) -> &[BuildAsset] {
        &self.assets
    }

    /// Directory the output was scanned from, if any.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Check that every file the worker will precache exists and can be
    /// opened. The manifest is emitted by the plugin itself and is exempt.
    ///
    /// In-memory outputs have nothing to check.
    pub fn verify_sources(&self, precache: &PrecacheSet) -> Result<()> {
        let Some(root) = &self.root else {
            return Ok(());
        };
        for entry in precache.iter() {
            if entry == MANIFEST_FILE {
                continue;
            }
            let path = root.join(entry);
            if std::fs::File::open(&path).is_err() || !path.is_file() {
                return Err(PwaError::missing_asset(path));
            }
        }
        Ok(())
    }
}

impl FromIterator<BuildAsset> for BuildOutput {
    fn from_iter<I: IntoIterator<Item = BuildAsset>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn is_plugin_output(path: &str) -> bool {
    path == WORKER_FILE || path == MANIFEST_FILE || path == REGISTER_MODULE_FILE
}

/// Extension of the last path segment, without the dot. Dotfiles have none.
fn extension_of(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&name[idx + 1..]).filter(|ext| !ext.is_empty()),
    }
}

// ==================== Extension Filters ====================

/// Extract the extension filter set from glob patterns.
///
/// `**/*.{js,css,.png}` contributes `js`, `css` and `png`; `*.svg`
/// contributes `svg`; a pattern with neither contributes nothing.
pub fn parse_extensions<S: AsRef<str>>(patterns: &[S]) -> HashSet<String> {
    let mut extensions = HashSet::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        if let Some(group) = brace_group(pattern) {
            extensions.extend(
                group
                    .split(',')
                    .map(|entry| entry.trim().trim_start_matches('.'))
                    .filter(|entry| !entry.is_empty())
                    .map(str::to_ascii_lowercase),
            );
            continue;
        }
        if let Some(ext) = extension_of(pattern) {
            extensions.insert(ext.to_ascii_lowercase());
        }
    }
    extensions
}

fn brace_group(pattern: &str) -> Option<&str> {
    let start = pattern.find('{')?;
    let len = pattern[start + 1..].find('}')?;
    Some(&pattern[start + 1..start + 1 + len]).filter(|group| !group.is_empty())
}

// ==================== Precache Set ====================

/// Files stored at install time, relative to the output root, in
/// discovery order and without duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheSet {
    entries: IndexSet<String>,
}

impl PrecacheSet {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains(entry)
    }

    /// Set equality, ignoring order.
    pub fn same_members(&self, other: &PrecacheSet) -> bool {
        self.len() == other.len() && self.iter().all(|entry| other.contains(entry))
    }

    /// Resolve every entry against `base`.
    ///
    /// The root URL goes first when absent; the offline document and the
    /// manifest are appended when absent.
    pub fn resolve(&self, base: &str) -> PrecacheUrls {
        let base = normalize_base(base);
        let mut urls: IndexSet<String> =
            self.iter().map(|entry| join_url(&base, entry)).collect();

        if !urls.contains(&base) {
            urls.shift_insert(0, base.clone());
        }
        let offline_url = join_url(&base, OFFLINE_FILE);
        urls.insert(offline_url.clone());
        urls.insert(join_url(&base, MANIFEST_FILE));

        PrecacheUrls {
            urls: urls.into_iter().collect(),
            offline_url,
        }
    }
}

/// Collect the precache set from a build output.
///
/// Chunks are always included. Assets are included when their extension
/// is in the filter set, or always when the filter set is empty. Explicit
/// includes follow with any leading `/` stripped, then the root document,
/// the offline document and the manifest.
pub fn collect_precache_assets<S: AsRef<str>>(
    output: &BuildOutput,
    glob_patterns: &[S],
    include_assets: &[S],
) -> PrecacheSet {
    let extensions = parse_extensions(glob_patterns);
    let mut entries = IndexSet::new();

    for asset in output.assets() {
        if asset.path.is_empty() {
            continue;
        }
        let included = match asset.kind {
            AssetKind::Chunk => true,
            AssetKind::Asset => {
                extensions.is_empty()
                    || asset
                        .extension()
                        .is_some_and(|ext| extensions.contains(&ext))
            }
        };
        if included {
            entries.insert(asset.path.clone());
        } else {
            trace!(path = %asset.path, "Asset not precached");
        }
    }

    for include in include_assets {
        let include = include.as_ref();
        let include = include.strip_prefix('/').unwrap_or(include);
        if !include.is_empty() {
            entries.insert(include.to_string());
        }
    }

    for fixed in [INDEX_FILE, OFFLINE_FILE, MANIFEST_FILE] {
        entries.insert(fixed.to_string());
    }

    debug!(entries = entries.len(), filters = extensions.len(), "Collected precache set");
    PrecacheSet { entries }
}

/// Precache entries resolved against the base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheUrls {
    urls: Vec<String>,
    offline_url: String,
}

impl PrecacheUrls {
    pub fn as_slice(&self) -> &[String] {
        &self.urls
    }

    pub fn offline_url(&self) -> &str {
        &self.offline_url
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.urls
    }
}

// ==================== URL Helpers ====================

/// Normalize a base path: empty or `./` becomes `/`, anything else gets a
/// trailing slash.
pub fn normalize_base(base: &str) -> String {
    if base.is_empty() || base == "./" {
        return "/".to_string();
    }
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

/// Join an output file onto the base. Absolute paths are kept as they are.
pub fn join_url(base: &str, file: &str) -> String {
    if file.starts_with('/') {
        file.to_string()
    } else {
        format!("{base}{file}")
    }
}
