//! The in-memory model of [GIMPLE](https://gcc.gnu.org/onlinedocs/gccint/GIMPLE.html),
//! the three-address intermediate representation emitted by GCC, as dumped by
//! our GCC plugin.
//!
//! The model is split into two halves:
//!
//! - [`types`] contains the closed set of value types that the translator
//!   understands.
//! - [`ir`] contains the statements, expressions, basic blocks, functions and
//!   compilation units built on top of those types.
//!
//! Both are deliberately closed sum types. Every consumer matches on them
//! exhaustively, so adding a variant is a compile-time-checked change rather
//! than a risk of an unhandled case at runtime.
//!
//! The [`parse`] module reads the JSON that the plugin writes to standard
//! output. Values are constructed once by this reader and are never mutated
//! afterward.

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming
#![allow(clippy::multiple_crate_versions)] // Enforced by our dependencies

pub mod ir;
pub mod parse;
pub mod types;

pub use ir::GimpleCompilationUnit;
pub use types::GimpleType;
