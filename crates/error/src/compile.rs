//! Error types and utilities to do with the translation from GIMPLE to the
//! FLO target format.

use std::fmt::{Display, Formatter};

use thiserror::Error;

/// The result type for use in the compiler.
pub type Result<T> = std::result::Result<T, Error>;

/// This error type is for use during the process of translating GIMPLE to the
/// target object format.
///
/// Apart from [`Error::MalformedIR`] raised while _parsing_ a compilation unit,
/// every one of these is fatal only to the function that contains the
/// offending construct.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// A generic compilation failure with a string message, used as a catch-all
    /// for cases that are uncommon enough to not have specific error variants
    /// for them.
    #[error("Compilation failed: {_0}")]
    CompilationFailure(String),

    /// The input IR fails structural validation, such as an unknown variant
    /// tag, a missing field, or a reference to a block that does not exist.
    #[error("Malformed GIMPLE: {_0}")]
    MalformedIR(String),

    /// Emitted when we encounter a GIMPLE type that we do not support.
    #[error("The GIMPLE type {_0} is not supported")]
    UnsupportedType(String),

    /// Emitted when we encounter a statement or expression shape that we
    /// deliberately do not support.
    #[error("Unsupported construct: {_0}")]
    UnsupportedConstruct(String),

    /// Two operands whose types are required to be equal disagree.
    #[error("Types do not match: {left}:{left_type} <> {right}:{right_type}")]
    TypeMismatch {
        left:       String,
        left_type:  String,
        right:      String,
        right_type: String,
    },

    /// A call passes a different number of arguments than the callee declares.
    #[error("Call to `{callee}` expects {expected} arguments but was given {actual}")]
    ArityMismatch {
        callee:   String,
        expected: usize,
        actual:   usize,
    },

    /// A record type cannot be laid out, either because it contains itself by
    /// value or because it was never defined.
    #[error("Invalid record layout: {_0}")]
    InvalidRecordLayout(String),

    /// A switch statement has duplicate or overlapping case values.
    #[error("Malformed switch: {_0}")]
    MalformedSwitch(String),

    /// Emitted when code tries to construct an invalid ordering of compiler
    /// passes.
    #[error("Invalid Pass Ordering: {_0}")]
    InvalidPassOrdering(String),

    /// Emitted when a pass or the code generator asks for the data of a pass
    /// that has not been run.
    #[error("The data for pass `{_0}` is not available")]
    MissingPassData(String),
}

impl Error {
    /// Constructs a [`Error::TypeMismatch`] from the textual form and the type
    /// of each of the two operands.
    #[must_use]
    pub fn type_mismatch(
        left: impl ToString,
        left_type: impl ToString,
        right: impl ToString,
        right_type: impl ToString,
    ) -> Self {
        Self::TypeMismatch {
            left:       left.to_string(),
            left_type:  left_type.to_string(),
            right:      right.to_string(),
            right_type: right_type.to_string(),
        }
    }
}

/// Identifies the GIMPLE statement at which the translation of a function
/// failed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatementLocation {
    /// The GCC index of the basic block containing the statement.
    pub block: u32,

    /// The position of the statement within its block.
    pub statement: usize,

    /// The source line of the statement, if the plugin recorded one.
    pub line: Option<u32>,
}

impl Display for StatementLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "block {}, statement {}", self.block, self.statement)?;
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        Ok(())
    }
}

/// The failure to translate a single function.
///
/// This carries enough information to find the offending construct from the
/// failure alone.
#[derive(Clone, Debug, PartialEq)]
pub struct TranslationFailure {
    /// The name of the function that could not be translated.
    pub function: String,

    /// The statement being translated when the failure occurred, or [`None`]
    /// if it was not caused by a specific statement (e.g. by an unsupported
    /// parameter type).
    pub location: Option<StatementLocation>,

    /// The underlying error.
    pub error: Error,
}

impl TranslationFailure {
    /// Creates a failure of `function` that is not attributable to a
    /// statement.
    #[must_use]
    pub fn new(function: impl Into<String>, error: Error) -> Self {
        Self {
            function: function.into(),
            location: None,
            error,
        }
    }

    /// Attaches the provided `location` to the failure.
    #[must_use]
    pub fn at(mut self, location: StatementLocation) -> Self {
        self.location = Some(location);
        self
    }
}

impl Display for TranslationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to translate `{}`", self.function)?;
        if let Some(location) = &self.location {
            write!(f, " at {location}")?;
        }
        write!(f, ": {}", self.error)
    }
}

impl std::error::Error for TranslationFailure {}
