//! Command-line front end for the offline build plugin.
//!
//! Runs the plugin over a build directory that already exists, for hosts
//! whose bundler cannot call it directly.
//!
//! ## Usage
//!
//! ```bash
//! # Emit sw.js and manifest.webmanifest into dist/
//! pwa-gen build --dist dist --config pwa.config.json
//!
//! # Show what would be written
//! pwa-gen build --dist dist --dry-run
//!
//! # Print the registration module for a sub-path deployment
//! pwa-gen register-module --base /app/
//! ```

use clap::{Parser, Subcommand};
use pwa_build::{synthesize, BuildOutput, PluginOptions};
use pwa_common::{init_logging, LogConfig, LogFormat};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "pwa-gen")]
#[command(about = "Generate offline worker, manifest and registration module")]
struct Cli {
    /// Log output format (pretty, compact, json)
    #[arg(long, global = true, default_value = "pretty")]
    log_format: LogFormat,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Emit the worker and manifest for a finished build
    Build {
        /// Build output directory
        #[arg(short, long)]
        dist: PathBuf,
        /// Plugin options file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Public base path, overriding the options file
        #[arg(long)]
        base: Option<String>,
        /// Where to write the artifacts (defaults to the build directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Also write registerSW.js
        #[arg(long)]
        register_module: bool,
        /// List the artifacts without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print or write the registerSW module
    RegisterModule {
        /// Plugin options file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Public base path, overriding the options file
        #[arg(long)]
        base: Option<String>,
        /// Output file (stdout when absent)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log = if cli.verbose {
        LogConfig::debug()
    } else {
        LogConfig::default()
    };
    init_logging(log.with_format(cli.log_format));

    if let Err(err) = run(cli.command) {
        error!(category = err.category(), error = %err, "pwa-gen failed");
        return Err(err.into());
    }
    Ok(())
}

fn run(command: Commands) -> pwa_common::Result<()> {
    match command {
        Commands::Build {
            dist,
            config,
            base,
            out,
            register_module,
            dry_run,
        } => {
            let options = load_options(config.as_deref(), base)?;
            let output = BuildOutput::scan(&dist)?;
            let artifacts = synthesize(&output, &options)?;

            println!("Version:  {}", artifacts.worker.version);
            println!("Precache: {} URLs", artifacts.worker.precache_urls.len());

            if dry_run {
                for (name, contents) in artifacts.files(register_module) {
                    println!("  {name} ({} bytes)", contents.len());
                }
                return Ok(());
            }

            let out = out.unwrap_or(dist);
            for path in artifacts.write_to(&out, register_module)? {
                println!("  wrote {}", path.display());
            }
            info!(out = %out.display(), "Build artifacts written");
        }

        Commands::RegisterModule { config, base, out } => {
            let options = load_options(config.as_deref(), base)?;
            let source = pwa_build::build_register_module(&options.base(), options.register_type)?;

            match out {
                Some(path) => {
                    std::fs::write(&path, source)?;
                    info!(path = %path.display(), "Registration module written");
                }
                None => print!("{source}"),
            }
        }
    }

    Ok(())
}

fn load_options(config: Option<&Path>, base: Option<String>) -> pwa_common::Result<PluginOptions> {
    let mut options = match config {
        Some(path) => PluginOptions::from_file(path)?,
        None => PluginOptions::default(),
    };
    if let Some(base) = base {
        options = options.with_base(base);
    }
    options.validate()?;
    Ok(options)
}
