//! # PWA Build
//!
//! The build-time half of the LinkNest offline support. Given a finished
//! build output and the plugin options it produces three artifacts:
//!
//! - `manifest.webmanifest`: the application descriptor, pretty-printed
//! - `sw.js`: the worker source, stamped with a content-derived version
//! - `registerSW.js`: the page-side registration module (on request)
//!
//! ```text
//! BuildOutput ──► collect_precache_assets ──► PrecacheSet ──► PrecacheUrls
//!                                                                 │
//!                                                           VersionHash
//!                                                                 │
//! PluginOptions.manifest ──► emit_manifest        WorkerSynthesizer ──► sw.js
//! ```
//!
//! Everything here is a pure function of its inputs except
//! [`BuildOutput::scan`] and [`Artifacts::write_to`].

pub mod assets;
pub mod config;
pub mod manifest;
pub mod plugin;
pub mod register_module;
pub mod synth;

pub use assets::{
    collect_precache_assets, join_url, normalize_base, parse_extensions, AssetKind, BuildAsset,
    BuildOutput, PrecacheSet, PrecacheUrls, INDEX_FILE, OFFLINE_FILE,
};
pub use config::{PluginOptions, RegisterType, WorkboxOptions};
pub use manifest::{emit_manifest, validate_manifest, MANIFEST_FILE};
pub use plugin::{synthesize, Artifacts};
pub use register_module::{build_register_module, REGISTER_MODULE_FILE, VIRTUAL_MODULE_ID};
pub use synth::{SynthesizedWorker, VersionHash, WorkerSynthesizer, WORKER_FILE};

pub use pwa_common::{PwaError, Result};
