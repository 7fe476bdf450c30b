//! The driver plumbs together the portions of the compilation process. It
//! invokes GCC with our GIMPLE plugin on a C or C++ source file, reads the
//! compilation unit that the plugin dumps, and runs the
//! [`gbr_compiler::Compiler`] over it.
//!
//! Failures of the native compiler, and a plugin output that cannot be read,
//! are fatal to the whole unit. Once the unit has been read, each function
//! succeeds or fails on its own, as recorded in the resulting
//! [`CompilationManifest`].

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming
#![allow(clippy::multiple_crate_versions)] // Enforced by our dependencies

pub mod config;
pub mod gcc;

#[cfg(all(test, unix))]
mod test_util;

use std::path::Path;

use gbr_compiler::{
    manifest::CompilationManifest,
    polyfill::PolyfillMap,
    source::SourceContext,
    CompilerBuilder,
};
use gbr_errors::Result;
use gbr_gimple::GimpleCompilationUnit;
use tracing::info;

use crate::config::GccConfig;

/// Compiles source files to `FLO` by way of GCC.
#[derive(Clone, Debug)]
pub struct Driver {
    /// How GCC is invoked.
    config: GccConfig,

    /// The polyfills that the compiler may call.
    polyfill_map: PolyfillMap,

    /// Whether the functions of a unit are translated in parallel.
    parallel: bool,
}

impl Driver {
    /// Creates a driver that invokes GCC as described by `config`, with the
    /// default polyfills and parallel translation.
    #[must_use]
    pub fn new(config: GccConfig) -> Self {
        Self {
            config,
            polyfill_map: PolyfillMap::default(),
            parallel: true,
        }
    }

    /// Specifies the polyfills that the compiler may call.
    ///
    /// # API Style
    ///
    /// Please note that the API for the builder consumes `self` and is hence
    /// designed to have calls chained in the "fluent" API style.
    #[must_use]
    pub fn with_polyfills(mut self, polyfill_map: PolyfillMap) -> Self {
        self.polyfill_map = polyfill_map;
        self
    }

    /// Specifies whether the functions of a unit are translated in parallel.
    ///
    /// # API Style
    ///
    /// Please note that the API for the builder consumes `self` and is hence
    /// designed to have calls chained in the "fluent" API style.
    #[must_use]
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Gets the configuration used to invoke GCC.
    #[must_use]
    pub fn config(&self) -> &GccConfig {
        &self.config
    }

    /// Compiles the C or C++ file at `source`.
    ///
    /// # Errors
    ///
    /// - [`gbr_errors::driver::Error`] if GCC cannot be run or does not
    ///   compile the file.
    /// - [`gbr_errors::compile::Error::MalformedIR`] if the plugin output is
    ///   not a valid compilation unit.
    /// - [`gbr_errors::compile::Error`] if the compiler cannot run at all.
    ///   Failures of individual functions are recorded in the manifest
    ///   instead.
    pub fn compile(&self, source: &Path) -> Result<CompilationManifest> {
        let output = gcc::compile_to_gimple(&self.config, source)?;
        let mut unit = GimpleCompilationUnit::read(output.as_slice())?;
        if unit.source_file.is_none() {
            unit.source_file = Some(source.display().to_string());
        }

        info!(
            source = %source.display(),
            functions = unit.functions.len(),
            "Read GIMPLE compilation unit"
        );

        let compiler = CompilerBuilder::new(SourceContext::new(unit))
            .with_polyfills(self.polyfill_map.clone())
            .with_parallelism(self.parallel)
            .build();
        Ok(compiler.run()?)
    }
}

#[cfg(all(test, unix))]
mod test {
    use std::path::Path;

    use gbr_errors::{compile, driver, Error};

    use crate::{config::GccConfigBuilder, test_util::FakeGcc, Driver};

    /// Gets a fake compiler that prints the compiler test fixture `name`.
    fn fake_gcc_for_fixture(name: &str) -> anyhow::Result<FakeGcc> {
        let fixture = std::fs::canonicalize(Path::new("../compiler/input").join(name))?;
        Ok(FakeGcc::new(&format!("cat '{}'", fixture.display()))?)
    }

    #[test]
    fn compiles_through_gcc() -> anyhow::Result<()> {
        let gcc = fake_gcc_for_fixture("partial-failure.json")?;
        let config = GccConfigBuilder::new(gcc.plugin()).with_compiler(gcc.path()).build()?;

        let manifest = Driver::new(config).compile(Path::new("partial.c"))?;
        assert_eq!(manifest.len(), 3);
        assert!(matches!(manifest.get("square"), Some(Ok(_))));
        assert_eq!(manifest.failures().count(), 2);

        Ok(())
    }

    #[test]
    fn names_objects_after_their_functions() -> anyhow::Result<()> {
        let gcc = fake_gcc_for_fixture("add.json")?;
        let config = GccConfigBuilder::new(gcc.plugin()).with_compiler(gcc.path()).build()?;

        let manifest = Driver::new(config).with_parallelism(false).compile(Path::new("add.c"))?;
        let Some(Ok(flo)) = manifest.get("add") else {
            anyhow::bail!("`add` did not translate");
        };
        assert_eq!(flo.module_name, "add");

        Ok(())
    }

    #[test]
    fn unreadable_plugin_output_fails_the_unit() -> anyhow::Result<()> {
        let gcc = FakeGcc::new("echo '{ \"functions\": ['")?;
        let config = GccConfigBuilder::new(gcc.plugin()).with_compiler(gcc.path()).build()?;

        let result = Driver::new(config).compile(Path::new("main.c"));
        assert!(matches!(
            result,
            Err(Error::Compile(compile::Error::MalformedIR(_)))
        ));

        Ok(())
    }

    #[test]
    fn native_failures_fail_the_unit() -> anyhow::Result<()> {
        let gcc = FakeGcc::new("echo 'fatal error: stdio.h: No such file' >&2; exit 1")?;
        let config = GccConfigBuilder::new(gcc.plugin()).with_compiler(gcc.path()).build()?;

        let result = Driver::new(config).compile(&gcc.dir().join("main.c"));
        assert!(matches!(
            result,
            Err(Error::Driver(driver::Error::NativeCompileFailed { status: Some(1), .. }))
        ));

        Ok(())
    }
}
