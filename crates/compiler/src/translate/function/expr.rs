//! Reading and writing GIMPLE operands.
//!
//! Every operand is read into a runtime variable before it is used, and every
//! assignment target is written from one. Fields of records held by value are
//! written by taking the record apart and building a new one, as the runtime
//! has no way to update a value in place.

use gbr_errors::compile::{Error, Result};
use gbr_flo::types::{
    ConstantValue,
    ConstructStatement,
    DestructureStatement,
    LoadStatement,
    Member,
    Statement,
    StoreStatement,
    Type,
    VariableId,
};
use gbr_gimple::{ir::GimpleExpr, GimpleType};

use super::FunctionTranslator;
use crate::{
    structs::{Struct, StructField},
    translate::check,
};

/// Builds the integer constant `value` of the runtime integer type `typ`.
///
/// # Errors
///
/// - [`Error::MalformedIR`] if `value` is out of the range of `typ`.
/// - [`Error::CompilationFailure`] if `typ` is not an integer type.
pub(super) fn int_constant(typ: &Type, value: i64) -> Result<ConstantValue> {
    match typ {
        Type::Signed32 => i32::try_from(value)
            .map(ConstantValue::signed32)
            .map_err(|_| {
                Error::MalformedIR(format!("the integer {value} does not fit in {typ:?}"))
            }),
        Type::Signed64 => Ok(ConstantValue::signed64(value)),
        _ => Err(Error::CompilationFailure(format!(
            "the integer {value} cannot be held in a value of type {typ:?}"
        ))),
    }
}

/// Returns `true` if `value` is in the range of the runtime integer type
/// `typ`.
pub(super) fn fits(typ: &Type, value: i64) -> bool {
    match typ {
        Type::Signed32 => i32::try_from(value).is_ok(),
        Type::Signed64 => true,
        _ => false,
    }
}

/// Rejects the null constant `value` being written into a location of the
/// non-nullable `target` type.
///
/// # Errors
///
/// - [`Error::MalformedIR`] if `target` is a reference and `value` is null.
pub(super) fn reject_null_reference(target: &GimpleType, value: &GimpleExpr) -> Result<()> {
    match (target, value) {
        (GimpleType::Reference { .. }, GimpleExpr::IntegerConstant { value: 0, .. }) => {
            Err(Error::MalformedIR(format!(
                "null cannot be stored into the non-nullable reference type {target}"
            )))
        }
        _ => Ok(()),
    }
}

impl FunctionTranslator<'_> {
    /// Reads the operand `expr` into a runtime variable.
    ///
    /// Variables are read in place, while everything else is read into a
    /// temporary.
    pub(super) fn read(&mut self, expr: &GimpleExpr) -> Result<VariableId> {
        match expr {
            GimpleExpr::IntegerConstant { ty, value } => self.integer_constant(ty, *value),
            GimpleExpr::RealConstant { ty, value } => {
                if self.value_type(ty)? != Type::Double {
                    Err(Error::MalformedIR(format!(
                        "the real constant {value:?} has the non-real type {ty}"
                    )))?;
                }
                Ok(self.constant(ConstantValue::double(*value)))
            }
            GimpleExpr::Variable { ty, name } => Ok(self.lookup(name, ty, expr)?.id),
            GimpleExpr::ComponentRef { ty, value, member } => match value.as_ref() {
                GimpleExpr::MemRef { pointer, .. } => {
                    let (handle, field) = self.field_through(pointer, member, ty, expr)?;
                    let target = self.temporary(field.typ.clone());
                    self.load(handle, field.member(), target);
                    Ok(target)
                }
                base => {
                    let (parts, field) = self.destructure(base, member, ty, expr)?;
                    Ok(parts[field.index])
                }
            },
            GimpleExpr::MemRef { ty, pointer } => {
                let handle = self.read_pointer(pointer, ty, expr)?;
                let target = self.temporary(self.value_type(ty)?);
                self.load(handle, Member::Whole, target);
                Ok(target)
            }
            GimpleExpr::ArrayRef { ty, array, index } => {
                let (array, index) = self.element(array, index, ty, expr)?;
                let target = self.temporary(self.value_type(ty)?);
                self.load(array, Member::Element(index), target);
                Ok(target)
            }
            GimpleExpr::AddressOf { value, .. } => Err(Error::UnsupportedConstruct(format!(
                "taking the address of `{value}`"
            ))),
        }
    }

    /// Writes the runtime variable `value` into the assignment target `lhs`.
    pub(super) fn write(&mut self, lhs: &GimpleExpr, value: VariableId) -> Result<()> {
        match lhs {
            GimpleExpr::Variable { ty, name } => {
                let target = self.lookup(name, ty, lhs)?;
                self.assign(target.id, value);
                Ok(())
            }
            GimpleExpr::ComponentRef { ty, value: base, member } => match base.as_ref() {
                GimpleExpr::MemRef { pointer, .. } => {
                    let (handle, field) = self.field_through(pointer, member, ty, lhs)?;
                    self.store(handle, field.member(), value);
                    Ok(())
                }
                base => {
                    let (mut parts, field) = self.destructure(base, member, ty, lhs)?;
                    parts[field.index] = value;

                    let strukt = self.ctx.resolve(base.ty())?;
                    let rebuilt = self.temporary(strukt.typ());
                    let location = self.location();
                    self.emit(&Statement::Construct(ConstructStatement {
                        target: rebuilt,
                        initializer: parts,
                        diagnostics: Vec::new(),
                        location,
                    }));

                    self.write(base, rebuilt)
                }
            },
            GimpleExpr::MemRef { ty, pointer } => {
                let handle = self.read_pointer(pointer, ty, lhs)?;
                self.store(handle, Member::Whole, value);
                Ok(())
            }
            GimpleExpr::ArrayRef { ty, array, index } => {
                let (array, index) = self.element(array, index, ty, lhs)?;
                self.store(array, Member::Element(index), value);
                Ok(())
            }
            GimpleExpr::IntegerConstant { .. } | GimpleExpr::RealConstant { .. } => Err(
                Error::MalformedIR(format!("the constant `{lhs}` cannot be assigned to")),
            ),
            GimpleExpr::AddressOf { .. } => Err(Error::UnsupportedConstruct(format!(
                "assigning to the address `{lhs}`"
            ))),
        }
    }

    /// Gets the variable that the result of an operation can be written to
    /// directly, which is only possible when `lhs` is a plain variable.
    pub(super) fn destination(&mut self, lhs: &GimpleExpr) -> Result<Option<VariableId>> {
        match lhs {
            GimpleExpr::Variable { ty, name } => Ok(Some(self.lookup(name, ty, lhs)?.id)),
            _ => Ok(None),
        }
    }

    /// Emits the integer constant `value` of GIMPLE type `ty`.
    ///
    /// Zero is the only integer that can stand for a pointer, as the null
    /// handle.
    #[allow(clippy::cast_precision_loss)]
    fn integer_constant(&mut self, ty: &GimpleType, value: i64) -> Result<VariableId> {
        let constant = match ty {
            GimpleType::Integer { .. } => int_constant(&self.value_type(ty)?, value)?,
            GimpleType::Boolean => ConstantValue::bool(value != 0),
            GimpleType::Real { .. } => ConstantValue::double(value as f64),
            GimpleType::Pointer { .. } if value == 0 => ConstantValue::null(self.value_type(ty)?),
            GimpleType::Reference { .. } if value == 0 => Err(Error::MalformedIR(format!(
                "null constant of the non-nullable type {ty}"
            )))?,
            GimpleType::Pointer { .. } | GimpleType::Reference { .. } => {
                Err(Error::UnsupportedConstruct(format!(
                    "the integer {value} used as an address of type {ty}"
                )))?
            }
            GimpleType::Array { .. } | GimpleType::Record { .. } => Err(Error::MalformedIR(
                format!("the integer constant {value} has the aggregate type {ty}"),
            ))?,
        };

        Ok(self.constant(constant))
    }

    /// Resolves `pointer->member`, where the expression `expr` is declared to
    /// have type `ty`.
    ///
    /// Returns the handle read from `pointer` along with the field.
    fn field_through(
        &mut self,
        pointer: &GimpleExpr,
        member: &str,
        ty: &GimpleType,
        expr: &GimpleExpr,
    ) -> Result<(VariableId, StructField)> {
        let Some(record) = pointer.ty().indirect_base().filter(|b| b.is_record()) else {
            return Err(Error::MalformedIR(format!(
                "`{pointer}` is dereferenced as a record but has type {}",
                pointer.ty()
            )));
        };

        let strukt = self.ctx.resolve_handle(record)?;
        let field = self.checked_field(&strukt, member, ty, expr)?;
        let handle = self.read(pointer)?;
        if pointer.ty().is_nullable() {
            self.can_panic = true;
        }

        Ok((handle, field))
    }

    /// Takes apart the record `base` to access its field `member`, where the
    /// expression `expr` is declared to have type `ty`.
    ///
    /// Returns the variables holding every field of the record along with the
    /// accessed field.
    fn destructure(
        &mut self,
        base: &GimpleExpr,
        member: &str,
        ty: &GimpleType,
        expr: &GimpleExpr,
    ) -> Result<(Vec<VariableId>, StructField)> {
        if !base.ty().is_record() {
            Err(Error::MalformedIR(format!(
                "the field `{member}` is accessed on `{base}`, which has the non-record type {}",
                base.ty()
            )))?;
        }

        let strukt = self.ctx.resolve(base.ty())?;
        let field = self.checked_field(&strukt, member, ty, expr)?;
        let types: Vec<Type> = strukt
            .fields(self.ctx)?
            .iter()
            .map(|f| f.typ.clone())
            .collect();

        let whole = self.read(base)?;
        let parts: Vec<VariableId> = types.into_iter().map(|t| self.temporary(t)).collect();
        let location = self.location();
        self.emit(&Statement::Destructure(DestructureStatement {
            whole,
            parts: parts.clone(),
            diagnostics: Vec::new(),
            location,
        }));

        Ok((parts, field))
    }

    /// Gets the field `member` of `strukt`, checking it against the type `ty`
    /// of the expression `expr` that accesses it.
    fn checked_field(
        &self,
        strukt: &Struct,
        member: &str,
        ty: &GimpleType,
        expr: &GimpleExpr,
    ) -> Result<StructField> {
        let field = strukt.field(self.ctx, member)?.clone();
        let name = format!("{}.{}", strukt.record(), field.name);
        check::same_type(expr, ty, &name, &field.ty)?;

        Ok(field)
    }

    /// Reads the `pointer` dereferenced by the expression `expr` of type `ty`.
    fn read_pointer(
        &mut self,
        pointer: &GimpleExpr,
        ty: &GimpleType,
        expr: &GimpleExpr,
    ) -> Result<VariableId> {
        let Some(pointee) = pointer.ty().indirect_base() else {
            return Err(Error::MalformedIR(format!(
                "`{pointer}` is dereferenced but has the non-pointer type {}",
                pointer.ty()
            )));
        };
        check::same_type(expr, ty, pointer, pointee)?;

        let handle = self.read(pointer)?;
        if pointer.ty().is_nullable() {
            self.can_panic = true;
        }

        Ok(handle)
    }

    /// Reads the `array` and `index` of the element access `expr` of type
    /// `ty`.
    fn element(
        &mut self,
        array: &GimpleExpr,
        index: &GimpleExpr,
        ty: &GimpleType,
        expr: &GimpleExpr,
    ) -> Result<(VariableId, VariableId)> {
        let GimpleType::Array { base, .. } = array.ty() else {
            return Err(Error::MalformedIR(format!(
                "`{array}` is indexed but has the non-array type {}",
                array.ty()
            )));
        };
        check::same_type(expr, ty, array, base)?;
        if !index.ty().is_integral() {
            Err(Error::type_mismatch(
                index,
                index.ty(),
                "an array index",
                GimpleType::int(64),
            ))?;
        }

        let array = self.read(array)?;
        let index = self.read(index)?;
        // Indices are checked against the bounds when the runtime performs the
        // access.
        self.can_panic = true;

        Ok((array, index))
    }

    /// Emits a load of `member` through `handle` into `target`.
    fn load(&mut self, handle: VariableId, member: Member, target: VariableId) {
        let location = self.location();
        self.emit(&Statement::Load(LoadStatement {
            handle,
            member,
            target,
            diagnostics: Vec::new(),
            location,
        }));
    }

    /// Emits a store of `value` into `member` through `handle`.
    fn store(&mut self, handle: VariableId, member: Member, value: VariableId) {
        let location = self.location();
        self.emit(&Statement::Store(StoreStatement {
            handle,
            member,
            value,
            diagnostics: Vec::new(),
            location,
        }));
    }
}
