//! This is the CLI driver for the compilation of C and C++ to `FLO` by way of
//! GCC's GIMPLE. For more detail, please see the documentation for the
//! [`gbr_compiler`] and [`gbr_driver`] crates.
//!
//! Logging is controlled by the `RUST_LOG` environment variable, and defaults
//! to showing warnings.

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming
#![allow(clippy::multiple_crate_versions)] // Enforced by our dependencies

mod args;
mod report;

use std::{fs, path::Path, process::ExitCode};

use anyhow::{anyhow, Context};
use clap::Parser;
use gbr_compiler::{manifest::CompilationManifest, source::SourceContext, CompilerBuilder};
use gbr_driver::Driver;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::{Cli, Command};

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (source, manifest) = match &cli.command {
        Command::Compile(args) => {
            let config = args.gcc_config().build()?;
            let manifest = Driver::new(config)
                .with_parallelism(!cli.sequential)
                .compile(&args.source)?;
            (args.source.display().to_string(), manifest)
        }
        Command::Translate { input } => {
            let context = SourceContext::create(input)?;
            let source = context
                .unit()
                .source_file
                .clone()
                .unwrap_or_else(|| input.display().to_string());
            let manifest = CompilerBuilder::new(context)
                .with_parallelism(!cli.sequential)
                .build()
                .run()?;
            (source, manifest)
        }
    };

    write_objects(&cli.output_dir, &source, manifest)
}

/// Writes each successfully translated function in `manifest` to
/// `<output_dir>/<function>.flo`, and reports each failure against the
/// `source` file.
///
/// Returns a failing exit code if any function failed to translate.
fn write_objects(
    output_dir: &Path,
    source: &str,
    manifest: CompilationManifest,
) -> anyhow::Result<ExitCode> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Could not create {}", output_dir.display()))?;

    let mut failed = 0usize;
    for (name, result) in manifest {
        match result {
            Ok(flo) => {
                let path = output_dir.join(format!("{name}.flo"));
                let path = path
                    .to_str()
                    .ok_or_else(|| anyhow!("{} is not a valid UTF-8 path", path.display()))?;
                flo.write_to_file(path)
                    .map_err(|e| anyhow!("Could not write {path}: {e}"))?;
                info!("Wrote {path}");
            }
            Err(failure) => {
                report::report_failure(source, &failure);
                failed += 1;
            }
        }
    }

    if failed == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("{failed} function(s) could not be translated");
        Ok(ExitCode::FAILURE)
    }
}
