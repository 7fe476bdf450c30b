//! Error handling types and utilities for the GCC Bridge project.
//!
//! # Error Conventions
//!
//! As we are providing libraries that others may want to interact with from
//! _code_ as well as from the CLI driver, we keep our errors strongly typed at
//! all times. While libraries like
//! [anyhow](https://docs.rs/anyhow/latest/anyhow/) are well-suited for
//! application code, they make it more difficult than is necessary to handle
//! specific errors in library code. To that end, we make sure that our errors
//! are kept strongly typed within the libraries as much as is possible.
//!
//! All of our errors are [`Clone`] so that a single failure can be recorded in
//! a compilation manifest and still be reported by a caller.

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming
#![allow(clippy::multiple_crate_versions)] // Enforced by our dependencies

pub mod compile;
pub mod driver;

use thiserror::Error;

/// The result type to be used at the boundaries of the project's libraries.
pub type Result<T> = std::result::Result<T, Error>;

/// The root of the error hierarchy for the project.
///
/// All errors should be able to be implicitly converted to this error type as
/// this is the type that is used at the boundaries of the libraries. Any
/// function intended to be part of the _truly_ public interface of the driver
/// should return this error type.
#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] compile::Error),

    #[error(transparent)]
    Driver(#[from] driver::Error),
}
