//! Type checks performed on GIMPLE statements before they are translated.
//!
//! None of these checks emit any code, so a statement that fails one leaves
//! nothing behind in the object being built.

use std::fmt::Display;

use gbr_errors::compile::{Error, Result};
use gbr_gimple::{
    ir::{GimpleExpr, GimpleOp, OpClass},
    GimpleType,
};

/// Returns `true` if the types `a` and `b` are the same.
///
/// Records are compared structurally, except that a forward reference to a
/// named record is the same as any record of that name.
#[must_use]
pub fn same(a: &GimpleType, b: &GimpleType) -> bool {
    match (a, b) {
        (
            GimpleType::Record {
                name: left_name,
                fields: left_fields,
            },
            GimpleType::Record {
                name: right_name,
                fields: right_fields,
            },
        ) => {
            if left_name != right_name {
                return false;
            }
            if !left_name.is_empty() && (left_fields.is_empty() || right_fields.is_empty()) {
                return true;
            }

            left_fields.len() == right_fields.len()
                && left_fields
                    .iter()
                    .zip(right_fields)
                    .all(|(l, r)| l.name == r.name && same(&l.ty, &r.ty))
        }
        (GimpleType::Pointer { base: left }, GimpleType::Pointer { base: right })
        | (GimpleType::Reference { base: left }, GimpleType::Reference { base: right }) => {
            same(left, right)
        }
        (
            GimpleType::Array {
                base: left,
                length: left_length,
            },
            GimpleType::Array {
                base: right,
                length: right_length,
            },
        ) => left_length == right_length && same(left, right),
        _ => a == b,
    }
}

/// Checks that `left` of type `left_type` and `right` of type `right_type`
/// have the same type.
///
/// # Errors
///
/// - [`Error::TypeMismatch`] if the types differ.
pub fn same_type(
    left: &impl Display,
    left_type: &GimpleType,
    right: &impl Display,
    right_type: &GimpleType,
) -> Result<()> {
    if same(left_type, right_type) {
        Ok(())
    } else {
        Err(Error::type_mismatch(left, left_type, right, right_type))
    }
}

/// Checks that `expr` is a boolean, as needed for `purpose`.
fn boolean(expr: &GimpleExpr, purpose: &str) -> Result<()> {
    same_type(expr, expr.ty(), &purpose, &GimpleType::Boolean)
}

/// Checks the types of the operands of `lhs = op(operands...)`, which must
/// already have the arity that `op` expects.
///
/// # Errors
///
/// - [`Error::TypeMismatch`] if the operand and result types do not agree
///   with what `op` requires of them.
/// - [`Error::UnsupportedConstruct`] for pointer arithmetic.
pub fn check_operation(op: GimpleOp, lhs: &GimpleExpr, operands: &[GimpleExpr]) -> Result<()> {
    match op.class() {
        OpClass::Copy | OpClass::Arithmetic => {
            for operand in operands {
                same_type(lhs, lhs.ty(), operand, operand.ty())?;
            }
        }
        OpClass::Comparison => {
            if let [left, right] = operands {
                same_type(left, left.ty(), right, right.ty())?;
            }
            boolean(lhs, "the result of a comparison")?;
        }
        OpClass::Logical => {
            boolean(lhs, "the result of a logical operation")?;
            for operand in operands {
                boolean(operand, "an operand of a logical operation")?;
            }
        }
        OpClass::Conversion => {
            for operand in operands {
                let from = operand.ty();
                let to = lhs.ty();
                let permitted = match op {
                    GimpleOp::Float => from.is_integral() && to.is_real(),
                    GimpleOp::FixTrunc => from.is_real() && to.is_integral(),
                    _ => {
                        let convertible =
                            |ty: &GimpleType| ty.is_integral() || *ty == GimpleType::Boolean;
                        convertible(from) && convertible(to)
                    }
                };
                if !permitted {
                    Err(Error::type_mismatch(lhs, to, operand, from))?;
                }
            }
        }
        OpClass::PointerArithmetic => Err(Error::UnsupportedConstruct(format!(
            "pointer arithmetic in `{lhs} = {}(...)`",
            op.name()
        )))?,
    }

    Ok(())
}
