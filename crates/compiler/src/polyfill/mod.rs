//! In the context of this project, a polyfill is an implementation of some
//! functionality that is _not_ supported by our target runtime in terms of
//! functionality that _is_ supported by our target.
//!
//! The runtime has no instructions beyond moving data around, so every
//! arithmetic, comparison, logical, and conversion operation in GIMPLE is
//! translated into a call to a block in the runtime library. These calls are
//! emitted as [`gbr_flo::types::BlockRef::Builtin`] references, and are
//! resolved when the translated objects are loaded.
//!
//! Our polyfill mechanism aims to be generic, such that we can implement and
//! improve our polyfills without requiring invasive changes to the code-base.
//! In order to do this, the compilation process (see [`crate::Compiler`])
//! selects polyfills dynamically from a [`PolyfillMap`].

pub mod mappings;

use bimap::{BiHashMap, BiMap};
use gbr_flo::types::Type;
use gbr_gimple::ir::{GimpleOp, OpClass};
use itertools::Itertools;

use crate::polyfill::mappings::{signatures, LIBRARY_OPERATIONS};

/// A bidirectional mapping from the GIMPLE names for operations to the
/// internal names for the corresponding polyfills.
///
/// # GIMPLE Names
///
/// Every GIMPLE operation maps to potentially multiple implementations, one
/// for each of the operand types it supports. The GIMPLE-side name of an
/// operation instance is given by [`Self::gimple_name`], and the polyfill name
/// by [`Self::of_opcode`].
#[derive(Clone, Debug, PartialEq)]
pub struct PolyfillMap {
    /// A mapping from the GIMPLE-side names to the corresponding polyfill
    /// names.
    mapping: BiMap<String, String>,
}

impl PolyfillMap {
    /// Constructs a new polyfill map from the provided `mapping`.
    #[must_use]
    pub fn new(mapping: BiHashMap<String, String>) -> Self {
        Self { mapping }
    }

    /// Queries for the polyfill name that corresponds to the provided
    /// `gimple_name`, returning it if it exists or returning [`None`]
    /// otherwise.
    pub fn polyfill(&self, gimple_name: impl Into<String>) -> Option<&String> {
        self.mapping.get_by_left(&gimple_name.into())
    }

    /// Queries for the GIMPLE name (as built by [`Self::gimple_name`]) that
    /// corresponds to the provided `polyfill_name`, returning it if it exists
    /// or returning [`None`] otherwise.
    pub fn gimple(&self, polyfill_name: impl Into<String>) -> Option<&String> {
        self.mapping.get_by_right(&polyfill_name.into())
    }

    /// Gets the polyfill implementing `op` over operands of the runtime types
    /// `operands`.
    ///
    /// For the conversion operations the `result` type is part of the
    /// signature, and is ignored otherwise. Returns [`None`] if the runtime
    /// library does not implement the operation for the provided types.
    #[must_use]
    pub fn for_operation(&self, op: GimpleOp, operands: &[Type], result: &Type) -> Option<&String> {
        let mut names = operands.iter().map(type_name).collect::<Option<Vec<_>>>()?;
        if op.class() == OpClass::Conversion {
            names.push(type_name(result)?);
        }
        self.polyfill(Self::gimple_name(op.name(), &names))
    }

    /// Builds the GIMPLE-side name for the operation `opcode` applied to
    /// operands of the provided `types`.
    ///
    /// ```
    /// use gbr_compiler::polyfill::PolyfillMap;
    ///
    /// assert_eq!(
    ///     PolyfillMap::gimple_name("plus_expr", &["i32", "i32"]),
    ///     "plus_expr(i32, i32)"
    /// );
    /// ```
    #[must_use]
    pub fn gimple_name(opcode: &str, types: &[&str]) -> String {
        format!("{opcode}({})", types.join(", "))
    }

    /// Builds the name of the polyfill for the operation `opcode` applied to
    /// operands of the provided `types`.
    ///
    /// Note that this is a purely _syntactic_ transformation.
    ///
    /// ```
    /// use gbr_compiler::polyfill::PolyfillMap;
    ///
    /// let opcode_name = "plus_expr";
    /// let arg_types = vec!["i32", "i32"];
    ///
    /// assert_eq!(
    ///     PolyfillMap::of_opcode(opcode_name, arg_types.as_slice()),
    ///     "__gimple_plus_expr_i32_i32"
    /// );
    /// ```
    #[must_use]
    pub fn of_opcode(opcode: &str, types: &[&str]) -> String {
        let types_str = if types.is_empty() {
            "void".to_string()
        } else {
            types.join("_")
        };
        format!("__gimple_{opcode}_{types_str}")
    }

    /// Iterates over all `(gimple_name, polyfill_name)` pairs in the map, in
    /// sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.mapping.iter().sorted()
    }
}

/// Gets the name used for the runtime type `typ` in polyfill names, or
/// [`None`] if no polyfill operates on values of that type.
#[must_use]
pub fn type_name(typ: &Type) -> Option<&'static str> {
    match typ {
        Type::Bool => Some("bool"),
        Type::Signed32 => Some("i32"),
        Type::Signed64 => Some("i64"),
        Type::Double => Some("f64"),
        Type::Handle(_) => Some("handle"),
        Type::Array(_) | Type::Struct(_) | Type::Unspecified => None,
    }
}

impl Default for PolyfillMap {
    /// Contains the default mapping from every operation that the runtime
    /// library implements to the corresponding polyfill names.
    fn default() -> Self {
        let defaults = LIBRARY_OPERATIONS.iter().flat_map(|op| {
            signatures(*op).iter().map(move |signature| {
                (
                    Self::gimple_name(op.name(), signature),
                    Self::of_opcode(op.name(), signature),
                )
            })
        });

        Self::new(defaults.collect())
    }
}

#[cfg(test)]
mod test {
    use gbr_flo::types::Type;
    use gbr_gimple::ir::GimpleOp;

    use crate::polyfill::PolyfillMap;

    #[test]
    fn gimple_lookup_works() {
        let map = PolyfillMap::default();

        assert_eq!(
            map.gimple("__gimple_lt_expr_f64_f64").map(String::as_str),
            Some("lt_expr(f64, f64)")
        );
    }

    #[test]
    fn polyfill_lookup_works() {
        let map = PolyfillMap::default();

        assert_eq!(
            map.polyfill("trunc_div_expr(i64, i64)").map(String::as_str),
            Some("__gimple_trunc_div_expr_i64_i64")
        );
        assert_eq!(map.polyfill("trunc_div_expr(f64, f64)"), None);
    }

    #[test]
    fn conversions_include_their_result_type() {
        let map = PolyfillMap::default();

        assert_eq!(
            map.for_operation(GimpleOp::Float, &[Type::Signed32], &Type::Double)
                .map(String::as_str),
            Some("__gimple_float_expr_i32_f64")
        );
        assert_eq!(
            map.for_operation(GimpleOp::Plus, &[Type::Signed32, Type::Signed32], &Type::Signed32)
                .map(String::as_str),
            Some("__gimple_plus_expr_i32_i32")
        );
        assert_eq!(
            map.for_operation(GimpleOp::BitAnd, &[Type::Double, Type::Double], &Type::Double),
            None
        );
    }

    #[test]
    fn of_opcode_works() {
        let opcode_name = "my_opcode";
        let tys_1 = vec!["i32", "i64"];
        let tys_2 = vec!["bool"];
        let tys_3 = vec![];

        assert_eq!(
            PolyfillMap::of_opcode(opcode_name, tys_1.as_slice()),
            "__gimple_my_opcode_i32_i64"
        );
        assert_eq!(
            PolyfillMap::of_opcode(opcode_name, tys_2.as_slice()),
            "__gimple_my_opcode_bool"
        );
        assert_eq!(
            PolyfillMap::of_opcode(opcode_name, tys_3.as_slice()),
            "__gimple_my_opcode_void"
        );
    }
}
