//! Error types and utilities to do with invoking the native compiler and
//! plumbing its output into the translator.

use std::{path::PathBuf, time::Duration};

use thiserror::Error;

/// The result type for use in the driver.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that are fatal to an entire compilation unit.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// The GIMPLE dumping plugin could not be found at the configured path.
    #[error("The GIMPLE plugin could not be found at `{}`", .0.display())]
    PluginNotFound(PathBuf),

    /// The native compiler exited unsuccessfully. The standard error output is
    /// carried verbatim.
    #[error("Native compilation failed:\n{stderr}")]
    NativeCompileFailed {
        /// The exit code, if the process exited normally.
        status: Option<i32>,

        /// Everything the compiler wrote to its standard error.
        stderr: String,
    },

    /// The native compiler did not exit within the configured timeout and was
    /// killed.
    #[error("Native compilation did not finish within {_0:?}")]
    NativeCompileTimedOut(Duration),

    /// An error when doing IO while driving the compilation.
    ///
    /// We store the rendered message rather than the [`std::io::Error`] itself
    /// as we want our error types to be [`Clone`].
    #[error("IO Error: {_0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    /// Wrap an IO error into our error type.
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}
