//! The operand signatures for which the runtime library provides an
//! implementation of each GIMPLE operation.
//!
//! Each signature lists the runtime type names of the operands, followed by
//! the result type for the conversions. These constants are left largely
//! undocumented as they have extremely self-describing names.

use gbr_gimple::ir::GimpleOp;

/// A signature of an operation, as a list of runtime type names.
type Signature<'a> = &'a [&'a str];

pub const INTEGER_BINARY: &[Signature<'static>] = &[&["i32", "i32"], &["i64", "i64"]];
pub const NUMERIC_BINARY: &[Signature<'static>] =
    &[&["i32", "i32"], &["i64", "i64"], &["f64", "f64"]];
pub const REAL_BINARY: &[Signature<'static>] = &[&["f64", "f64"]];
pub const INTEGER_UNARY: &[Signature<'static>] = &[&["i32"], &["i64"]];
pub const NUMERIC_UNARY: &[Signature<'static>] = &[&["i32"], &["i64"], &["f64"]];

pub const COMPARABLE: &[Signature<'static>] = &[
    &["i32", "i32"],
    &["i64", "i64"],
    &["f64", "f64"],
    &["bool", "bool"],
];
/// Pointers may only be compared for equality, most commonly against null.
pub const EQUATABLE: &[Signature<'static>] = &[
    &["i32", "i32"],
    &["i64", "i64"],
    &["f64", "f64"],
    &["bool", "bool"],
    &["handle", "handle"],
];

pub const LOGICAL_BINARY: &[Signature<'static>] = &[&["bool", "bool"]];
pub const LOGICAL_UNARY: &[Signature<'static>] = &[&["bool"]];

pub const FLOAT: &[Signature<'static>] = &[&["i32", "f64"], &["i64", "f64"]];
pub const FIX_TRUNC: &[Signature<'static>] = &[&["f64", "i32"], &["f64", "i64"]];
pub const CONVERT: &[Signature<'static>] = &[
    &["i32", "i64"],
    &["i64", "i32"],
    &["bool", "i32"],
    &["bool", "i64"],
    &["i32", "bool"],
    &["i64", "bool"],
];

/// Gets the signatures supported by the runtime library for `op`.
///
/// Copies and pointer arithmetic are never implemented as library calls, and
/// hence have no signatures.
#[must_use]
pub fn signatures(op: GimpleOp) -> &'static [Signature<'static>] {
    match op {
        GimpleOp::Plus | GimpleOp::Minus | GimpleOp::Mult | GimpleOp::Min | GimpleOp::Max => {
            NUMERIC_BINARY
        }
        GimpleOp::TruncDiv
        | GimpleOp::TruncMod
        | GimpleOp::BitAnd
        | GimpleOp::BitIor
        | GimpleOp::BitXor
        | GimpleOp::LShift
        | GimpleOp::RShift => INTEGER_BINARY,
        GimpleOp::RDiv => REAL_BINARY,
        GimpleOp::Negate | GimpleOp::Abs => NUMERIC_UNARY,
        GimpleOp::BitNot => INTEGER_UNARY,
        GimpleOp::Eq | GimpleOp::Ne => EQUATABLE,
        GimpleOp::Lt | GimpleOp::Le | GimpleOp::Gt | GimpleOp::Ge => COMPARABLE,
        GimpleOp::TruthAnd | GimpleOp::TruthOr => LOGICAL_BINARY,
        GimpleOp::TruthNot => LOGICAL_UNARY,
        GimpleOp::Float => FLOAT,
        GimpleOp::FixTrunc => FIX_TRUNC,
        GimpleOp::Convert => CONVERT,
        GimpleOp::Nop | GimpleOp::PointerPlus => &[],
    }
}

/// Every operation that may be implemented by the runtime library.
pub const LIBRARY_OPERATIONS: &[GimpleOp] = &[
    GimpleOp::Plus,
    GimpleOp::Minus,
    GimpleOp::Mult,
    GimpleOp::TruncDiv,
    GimpleOp::RDiv,
    GimpleOp::TruncMod,
    GimpleOp::Negate,
    GimpleOp::Abs,
    GimpleOp::Min,
    GimpleOp::Max,
    GimpleOp::BitAnd,
    GimpleOp::BitIor,
    GimpleOp::BitXor,
    GimpleOp::BitNot,
    GimpleOp::LShift,
    GimpleOp::RShift,
    GimpleOp::Eq,
    GimpleOp::Ne,
    GimpleOp::Lt,
    GimpleOp::Le,
    GimpleOp::Gt,
    GimpleOp::Ge,
    GimpleOp::TruthAnd,
    GimpleOp::TruthOr,
    GimpleOp::TruthNot,
    GimpleOp::Float,
    GimpleOp::FixTrunc,
    GimpleOp::Convert,
];
