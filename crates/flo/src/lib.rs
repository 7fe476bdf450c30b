//! The `FlatLowered` Object (`FLO`) is the object format produced by the
//! translator, and loaded by the managed runtime.
//!
//! The runtime has no addressable memory. Composite values are either held
//! directly in variables (structs and their fields are values), or referred
//! to through [`types::Type::Handle`]s, which the runtime manages. Every
//! operation that is not a plain data movement is a call to a block in the
//! runtime library.

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming
#![allow(clippy::multiple_crate_versions)] // Enforced by our dependencies

pub mod flo;
pub mod intern;
pub mod poison;
pub mod types;

pub use flo::FlatLoweredObject;
