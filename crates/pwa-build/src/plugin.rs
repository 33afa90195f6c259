//! The plugin as one function: build output and options in, artifacts out.

use pwa_common::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::assets::{collect_precache_assets, BuildOutput};
use crate::config::PluginOptions;
use crate::manifest::{emit_manifest, MANIFEST_FILE};
use crate::register_module::{build_register_module, REGISTER_MODULE_FILE};
use crate::synth::{SynthesizedWorker, WorkerSynthesizer, WORKER_FILE};

/// Everything one build emits.
#[derive(Debug, Clone)]
pub struct Artifacts {
    /// Contents of `manifest.webmanifest`.
    pub manifest: String,
    pub worker: SynthesizedWorker,
    /// Contents of `registerSW.js`.
    pub register_module: String,
}

impl Artifacts {
    /// Files to write, as (relative path, contents). The registration
    /// module is only listed when requested.
    pub fn files(&self, with_register_module: bool) -> Vec<(&'static str, &str)> {
        let mut files = vec![
            (MANIFEST_FILE, self.manifest.as_str()),
            (WORKER_FILE, self.worker.source.as_str()),
        ];
        if with_register_module {
            files.push((REGISTER_MODULE_FILE, self.register_module.as_str()));
        }
        files
    }

    /// Write the artifacts into `dir`, returning the written paths.
    pub fn write_to(&self, dir: impl AsRef<Path>, with_register_module: bool) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        for (name, contents) in self.files(with_register_module) {
            let path = dir.join(name);
            std::fs::write(&path, contents)?;
            debug!(path = %path.display(), bytes = contents.len(), "Wrote artifact");
            written.push(path);
        }
        Ok(written)
    }
}

/// Run the plugin over a finished build.
///
/// Fails before producing anything when the manifest descriptor is
/// malformed or, for a scanned output, when a file to be precached is
/// missing.
pub fn synthesize(output: &BuildOutput, options: &PluginOptions) -> Result<Artifacts> {
    options.validate()?;
    let base = options.base();

    let precache = collect_precache_assets(
        output,
        options.workbox.glob_patterns.as_slice(),
        options.include_assets.as_slice(),
    );
    output.verify_sources(&precache)?;

    let manifest = emit_manifest(options.manifest.as_ref())?;
    let worker = WorkerSynthesizer::from_options(options).synthesize(&precache)?;
    let register_module = build_register_module(&base, options.register_type)?;

    info!(
        base = %base,
        version = %worker.version,
        precache = precache.len(),
        "Plugin artifacts ready"
    );
    Ok(Artifacts {
        manifest,
        worker,
        register_module,
    })
}
