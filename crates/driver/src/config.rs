//! The configuration for invoking the native compiler.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use gbr_errors::driver::{Error, Result};

/// The compiler executable used when none is configured.
pub const DEFAULT_COMPILER: &str = "gcc";

/// How the native compiler is invoked to produce GIMPLE.
///
/// The plugin path is checked when the configuration is built, so a
/// `GccConfig` always refers to a plugin that existed at that time.
#[derive(Clone, Debug, PartialEq)]
pub struct GccConfig {
    /// The native compiler executable.
    pub compiler: PathBuf,

    /// The plugin that dumps GIMPLE as JSON on the compiler's standard output.
    pub plugin: PathBuf,

    /// The directories to search for included headers, in order.
    pub include_dirs: Vec<PathBuf>,

    /// How long the compiler may run before it is killed, or [`None`] to wait
    /// forever.
    pub timeout: Option<Duration>,
}

impl GccConfig {
    /// Gets the arguments with which the compiler is invoked on `source`.
    #[must_use]
    pub fn arguments(&self, source: &Path) -> Vec<String> {
        let mut args = vec![
            "-c".to_string(),
            "-S".to_string(),
            "-O0".to_string(),
            format!("-fplugin={}", self.plugin.display()),
        ];
        for dir in &self.include_dirs {
            args.push("-I".to_string());
            args.push(dir.display().to_string());
        }
        args.push(source.display().to_string());
        args.push("-o".to_string());
        args.push("/dev/null".to_string());

        args
    }
}

/// Allows for building a [`GccConfig`] while retaining the defaults for the
/// fields that do not need to be customized.
#[derive(Clone, Debug)]
pub struct GccConfigBuilder {
    compiler:     Option<PathBuf>,
    plugin:       PathBuf,
    include_dirs: Vec<PathBuf>,
    timeout:      Option<Duration>,
}

impl GccConfigBuilder {
    /// Creates a new builder for a configuration that uses the GIMPLE
    /// `plugin`.
    ///
    /// # API Style
    ///
    /// Please note that the API for the builder consumes `self` and is hence
    /// designed to have calls chained in the "fluent" API style.
    #[must_use]
    pub fn new(plugin: impl Into<PathBuf>) -> Self {
        Self {
            compiler:     None,
            plugin:       plugin.into(),
            include_dirs: Vec::new(),
            timeout:      None,
        }
    }

    /// Specifies the compiler executable, which defaults to
    /// [`DEFAULT_COMPILER`].
    #[must_use]
    pub fn with_compiler(mut self, compiler: impl Into<PathBuf>) -> Self {
        self.compiler = Some(compiler.into());
        self
    }

    /// Adds `dir` to the end of the include search path.
    #[must_use]
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    /// Specifies how long the compiler may run before it is killed.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::PluginNotFound`] if the plugin does not exist.
    pub fn build(self) -> Result<GccConfig> {
        if !self.plugin.exists() {
            Err(Error::PluginNotFound(self.plugin.clone()))?;
        }

        Ok(GccConfig {
            compiler:     self.compiler.unwrap_or_else(|| PathBuf::from(DEFAULT_COMPILER)),
            plugin:       self.plugin,
            include_dirs: self.include_dirs,
            timeout:      self.timeout,
        })
    }
}
