//! The translation of GIMPLE functions into [`FlatLoweredObject`]s.
//!
//! Each function is translated independently by a
//! [`function::FunctionTranslator`], sharing only the
//! [`TranslationContext`] of its compilation unit. This is what allows the
//! functions of a unit to be translated in parallel.

pub mod check;
pub mod data;
pub mod function;
pub mod types;
pub mod variable;

use gbr_errors::compile::TranslationFailure;
use gbr_flo::FlatLoweredObject;
use gbr_gimple::ir::GimpleFunction;

use crate::{context::TranslationContext, translate::function::FunctionTranslator};

/// Translates the provided `function` into an object of its own, whose
/// locations refer to the `source` file.
///
/// # Errors
///
/// - [`TranslationFailure`] if the function cannot be translated.
pub fn translate_function(
    ctx: &TranslationContext,
    function: &GimpleFunction,
    source: &str,
) -> Result<FlatLoweredObject, TranslationFailure> {
    FunctionTranslator::new(ctx, function, source).translate()
}
