//! Reading of compilation units from the JSON written by our GCC plugin.
//!
//! Reading is strict. Any unknown variant tag or missing required field fails
//! the whole unit with [`Error::MalformedIR`], as no function can be trusted
//! to translate correctly without a valid IR. Once the JSON itself has been
//! read, we additionally check the structural properties that the translator
//! relies on but that the JSON schema cannot express.

use std::{collections::HashSet, io::Read, str::FromStr};

use gbr_errors::compile::{Error, Result};

use crate::ir::{GimpleCompilationUnit, GimpleFunction, EXIT_BLOCK};

impl GimpleCompilationUnit {
    /// Reads a compilation unit from the provided `reader`.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedIR`] if the input is not a valid compilation unit.
    pub fn read(reader: impl Read) -> Result<Self> {
        let unit: Self =
            serde_json::from_reader(reader).map_err(|e| Error::MalformedIR(e.to_string()))?;
        unit.validate()?;
        Ok(unit)
    }

    /// Checks the structural invariants of the unit that the type system does
    /// not enforce for us.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedIR`] if any two functions or record definitions
    ///   share a name.
    ///
    /// The blocks of each function are left to [`validate_function`], so that
    /// a malformed function fails on its own.
    pub fn validate(&self) -> Result<()> {
        let mut function_names = HashSet::new();
        for function in &self.functions {
            if !function_names.insert(function.name.as_str()) {
                Err(Error::MalformedIR(format!(
                    "function `{}` is defined more than once",
                    function.name
                )))?;
            }
        }

        let mut record_names = HashSet::new();
        for record in &self.records {
            if record.name.is_empty() {
                Err(Error::MalformedIR(
                    "record definitions must be named".to_string(),
                ))?;
            }
            if !record_names.insert(record.name.as_str()) {
                Err(Error::MalformedIR(format!(
                    "record `{}` is defined more than once",
                    record.name
                )))?;
            }
        }

        Ok(())
    }
}

impl FromStr for GimpleCompilationUnit {
    type Err = Error;

    /// Reads a compilation unit from its JSON text.
    fn from_str(json: &str) -> Result<Self> {
        Self::read(json.as_bytes())
    }
}

/// Checks that the basic blocks of `function` are uniquely indexed and that
/// its entry block exists.
///
/// # Errors
///
/// - [`Error::MalformedIR`] if the function is malformed.
pub fn validate_function(function: &GimpleFunction) -> Result<()> {
    let mut indices = HashSet::new();
    for block in &function.blocks {
        if block.index == EXIT_BLOCK {
            Err(Error::MalformedIR(format!(
                "function `{}` defines the reserved exit block {EXIT_BLOCK}",
                function.name
            )))?;
        }
        if !indices.insert(block.index) {
            Err(Error::MalformedIR(format!(
                "function `{}` defines block {} more than once",
                function.name, block.index
            )))?;
        }
    }

    if function.block(function.entry_block).is_none() {
        Err(Error::MalformedIR(format!(
            "the entry block {} of function `{}` does not exist",
            function.entry_block, function.name
        )))?;
    }

    Ok(())
}
