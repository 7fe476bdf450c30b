//! The result of compiling a unit.

use gbr_errors::compile::TranslationFailure;
use gbr_flo::FlatLoweredObject;

/// The outcome of translating a single function.
pub type FunctionResult = Result<FlatLoweredObject, TranslationFailure>;

/// The outcome of translating every function defined in a compilation unit,
/// in the order that the unit defines them.
///
/// A function that fails to translate has no effect on any other function, so
/// the manifest may contain a mix of successes and failures.
#[derive(Debug, Default)]
pub struct CompilationManifest {
    entries: Vec<(String, FunctionResult)>,
}

impl CompilationManifest {
    /// Creates a manifest from the provided `(function_name, result)` pairs.
    #[must_use]
    pub fn new(entries: Vec<(String, FunctionResult)>) -> Self {
        Self { entries }
    }

    /// Gets the result for the function `name`, if the unit defines it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FunctionResult> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    /// Iterates over the result of each function, in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FunctionResult)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), r))
    }

    /// Iterates over the functions that were translated successfully.
    pub fn successes(&self) -> impl Iterator<Item = (&str, &FlatLoweredObject)> {
        self.iter().filter_map(|(n, r)| r.as_ref().ok().map(|flo| (n, flo)))
    }

    /// Iterates over the functions that failed to translate.
    pub fn failures(&self) -> impl Iterator<Item = &TranslationFailure> {
        self.entries.iter().filter_map(|(_, r)| r.as_ref().err())
    }

    /// Gets the number of functions in the manifest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the unit defined no functions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for CompilationManifest {
    type IntoIter = std::vec::IntoIter<(String, FunctionResult)>;
    type Item = (String, FunctionResult);

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
