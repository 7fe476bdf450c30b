//! This library implements the retargeting of
//! [GIMPLE](https://gcc.gnu.org/onlinedocs/gccint/GIMPLE.html), the
//! three-address IR of the GCC compiler, to our `FLO` object format for
//! execution on a managed runtime that has no addressable memory.
//!
//! # Stages
//!
//! 1. We ingest a GIMPLE compilation unit, as written by our GCC plugin.
//! 2. We run analysis passes over the unit to build a map of its functions,
//!    globals, and record types.
//! 3. We translate every function of the unit independently to a
//!    [`FlatLoweredObject`] of its own. Pointers become managed handles and
//!    operations the target lacks become polyfill calls.
//!
//! Point 3 is where most of the work happens. Native pointers cannot be
//! represented on the target, so each pointer becomes either a handle to a
//! managed struct or a _cell_ holding a single scalar. Anything that would
//! require real addresses, such as taking the address of a local or doing
//! pointer arithmetic, is rejected.
//!
//! # Failure Isolation
//!
//! A function that cannot be translated does not prevent the translation of any
//! other function in the unit. The result of compilation is hence a
//! [`CompilationManifest`] that records the outcome of each function
//! separately.

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming
#![allow(clippy::multiple_crate_versions)] // Enforced by our dependencies

pub mod constant;
pub mod context;
pub mod manifest;
pub mod pass;
pub mod polyfill;
pub mod source;
pub mod structs;
pub mod translate;

use gbr_errors::compile::{Error, Result};
use gbr_flo::FlatLoweredObject;
use gbr_gimple::ir::GimpleFunction;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    context::TranslationContext,
    manifest::{CompilationManifest, FunctionResult},
    pass::{analysis::unit_map::BuildUnitMap, PassManager, PassManagerReturnData},
    polyfill::PolyfillMap,
    source::SourceContext,
    translate::translate_function,
};

/// Translates a GIMPLE compilation unit into one [`FlatLoweredObject`] per
/// function.
///
/// Control flow, calls and record accesses through handles map directly onto
/// `FLO`. Arithmetic and comparisons become calls into the runtime library, as
/// described in the [`polyfill`] module.
pub struct Compiler {
    pub context: SourceContext,

    /// Run before translation. They must produce a [`BuildUnitMap`] result.
    pub passes: PassManager,

    pub polyfill_map: PolyfillMap,

    /// Whether functions are translated on the rayon thread pool.
    pub parallel: bool,
}

impl Compiler {
    /// Creates a compiler for the unit in `context`. Prefer
    /// [`CompilerBuilder`], which fills in the usual passes and polyfills.
    #[must_use]
    pub fn new(
        context: SourceContext,
        passes: PassManager,
        polyfill_map: PolyfillMap,
        parallel: bool,
    ) -> Self {
        Self {
            context,
            passes,
            polyfill_map,
            parallel,
        }
    }

    /// Runs the passes and then translates every function of the unit.
    ///
    /// The order of the entries in the resulting manifest is the order in
    /// which the unit defines its functions, regardless of whether they were
    /// translated in parallel.
    ///
    /// # Errors
    ///
    /// - [`Error`] if any of the passes fail, or if the unit map is not
    ///   produced by the configured passes. Failures of individual functions
    ///   are instead recorded in the manifest.
    pub fn run(mut self) -> Result<CompilationManifest> {
        let PassManagerReturnData { context, data } = self.passes.run(self.context)?;

        let unit_map = data
            .get::<BuildUnitMap>()
            .ok_or_else(|| Error::MissingPassData("BuildUnitMap".to_string()))?
            .clone();
        let ctx = TranslationContext::new(unit_map, self.polyfill_map);

        let unit = context.unit();
        let source = unit.source_file.clone().unwrap_or_default();
        let translate = |function: &GimpleFunction| -> (String, FunctionResult) {
            (
                function.name.clone(),
                translate_function(&ctx, function, &source),
            )
        };

        let entries: Vec<(String, FunctionResult)> = if self.parallel {
            unit.functions.par_iter().map(translate).collect()
        } else {
            unit.functions.iter().map(translate).collect()
        };

        // Only once every function is done do we know every struct that the
        // unit uses, so the type tables are shared by all the objects.
        ctx.finalize_structs();
        let types = ctx.type_tables();

        let entries = entries
            .into_iter()
            .map(|(name, result)| {
                let result = result.map(|mut flo: FlatLoweredObject| {
                    flo.types = types.clone();
                    flo
                });
                match &result {
                    Ok(flo) => debug!(
                        function = name.as_str(),
                        blocks = flo.blocks.len(),
                        "Translated function"
                    ),
                    Err(failure) => warn!(function = name.as_str(), "{failure}"),
                }
                (name, result)
            })
            .collect();

        Ok(CompilationManifest::new(entries))
    }
}

/// Configures a [`Compiler`], defaulting whatever is not set.
pub struct CompilerBuilder {
    context:      SourceContext,
    passes:       Option<PassManager>,
    polyfill_map: Option<PolyfillMap>,
    parallel:     bool,
}

impl CompilerBuilder {
    /// Starts from the default passes and polyfills, translating in parallel.
    #[must_use]
    pub fn new(context: SourceContext) -> Self {
        Self {
            context,
            passes: None,
            polyfill_map: None,
            parallel: true,
        }
    }

    #[must_use]
    pub fn with_passes(mut self, passes: PassManager) -> Self {
        self.passes = Some(passes);
        self
    }

    /// Replaces the names that operations are lowered to.
    #[must_use]
    pub fn with_polyfills(mut self, polyfills: PolyfillMap) -> Self {
        self.polyfill_map = Some(polyfills);
        self
    }

    /// Turning parallelism off does not change the output.
    #[must_use]
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[must_use]
    pub fn build(self) -> Compiler {
        Compiler::new(
            self.context,
            self.passes.unwrap_or_default(),
            self.polyfill_map.unwrap_or_default(),
            self.parallel,
        )
    }
}
