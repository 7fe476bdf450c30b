//! Contains the source compilation context, which tracks the GIMPLE
//! compilation unit being processed by the compiler.

use std::{fs::File, io::BufReader, path::Path};

use gbr_errors::compile::{Error, Result};
use gbr_gimple::GimpleCompilationUnit;

/// The source compilation context owns the GIMPLE compilation unit across
/// compiler operations.
///
/// It is intended to exist only throughout the compilation process, after which
/// it may be safely discarded.
#[derive(Clone, Debug)]
pub struct SourceContext {
    unit: GimpleCompilationUnit,
}

impl SourceContext {
    /// Creates a new source context wrapping the provided `unit`.
    #[must_use]
    pub fn new(unit: GimpleCompilationUnit) -> Self {
        Self { unit }
    }

    /// Creates a new source context by reading the plugin output at `path`.
    ///
    /// # Errors
    ///
    /// - [`Error::CompilationFailure`] if the file cannot be opened.
    /// - [`Error::MalformedIR`] if the file does not contain a valid
    ///   compilation unit.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::CompilationFailure(format!("Could not open {}: {e}", path.display()))
        })?;
        let unit = GimpleCompilationUnit::read(BufReader::new(file))?;

        Ok(Self::new(unit))
    }

    /// Runs analysis on the compilation unit using the provided function, and
    /// returns the analysis result.
    ///
    /// It does not have the ability to modify the unit at all.
    ///
    /// # Errors
    ///
    /// - [`Error`] if the analysis fails.
    pub fn analyze_unit<T>(&self, op: impl FnOnce(&GimpleCompilationUnit) -> Result<T>) -> Result<T> {
        op(&self.unit)
    }

    /// Runs a transformation on the compilation unit using the provided
    /// function, returning any result from the modification.
    ///
    /// # Errors
    ///
    /// - [`Error`] if the transformation fails.
    pub fn modify_unit<T>(
        &mut self,
        op: impl FnOnce(&mut GimpleCompilationUnit) -> Result<T>,
    ) -> Result<T> {
        op(&mut self.unit)
    }

    /// Gets the compilation unit.
    #[must_use]
    pub fn unit(&self) -> &GimpleCompilationUnit {
        &self.unit
    }
}

impl From<SourceContext> for GimpleCompilationUnit {
    fn from(value: SourceContext) -> Self {
        value.unit
    }
}
