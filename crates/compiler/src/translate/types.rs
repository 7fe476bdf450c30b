//! The translation of GIMPLE types into runtime types.
//!
//! Every GIMPLE type falls into one of a small number of representations,
//! captured by [`TypeTranslator`]. Each one knows the runtime type of its
//! values, how values of it cross a call boundary, and what kind of variable
//! holds it.

use std::sync::Arc;

use gbr_errors::compile::{Error, Result};
use gbr_flo::types::{ArrayTypeId, LocationId, Type, VariableLinkage};
use gbr_gimple::GimpleType;

use crate::{
    constant::{DOUBLE_WIDTH, INTEGER_32_WIDTH, INTEGER_64_WIDTH},
    context::TranslationContext,
    structs::Struct,
    translate::{
        data::CodegenData,
        variable::{Var, VarKind},
    },
};

/// How a value crosses a call boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CallingConvention {
    /// The callee receives its own copy of the value.
    ByValue,

    /// The callee receives a handle that shares the caller's object.
    ByHandle,
}

/// The runtime representation of a value at a call boundary.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Representation {
    /// The runtime type of the value.
    pub typ: Type,

    /// How the value is passed.
    pub convention: CallingConvention,
}

/// The role that a variable plays in the function being translated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VarUsage {
    /// A parameter of the function.
    Parameter,

    /// A local variable declared by the function.
    Local,

    /// The variable that holds the value the function returns.
    ReturnSlot,

    /// A variable introduced by the translator.
    Temporary,

    /// A global of the compilation unit.
    Global,
}

/// The translation strategy for a single GIMPLE type.
#[derive(Clone, Debug)]
pub enum TypeTranslator {
    /// An integer, real, or boolean, held directly.
    Primitive(Type),

    /// A record held by value.
    Record(Arc<Struct>),

    /// A pointer or reference to a record.
    RecordHandle { strukt: Arc<Struct>, nullable: bool },

    /// A fixed-length array, which is always a reference to a managed array.
    Array { id: ArrayTypeId },

    /// A pointer or reference to a single non-record value.
    Cell { pointee: Type, nullable: bool },
}

impl TypeTranslator {
    /// Selects the translation strategy for `ty`.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedType`] for integers other than 32 or 64 bits
    ///   wide, reals other than 64 bits wide, and pointers to pointers.
    /// - [`Error::InvalidRecordLayout`] for records that contain themselves by
    ///   value, or that are used by value without being defined.
    /// - [`Error`] for records used by value that have a field of a type that
    ///   cannot be translated.
    pub fn for_type(ctx: &TranslationContext, ty: &GimpleType) -> Result<Self> {
        let translator = match ty {
            GimpleType::Integer { width } => match *width {
                INTEGER_32_WIDTH => Self::Primitive(Type::Signed32),
                INTEGER_64_WIDTH => Self::Primitive(Type::Signed64),
                _ => Err(Error::UnsupportedType(ty.to_string()))?,
            },
            GimpleType::Real { width } if *width == DOUBLE_WIDTH => Self::Primitive(Type::Double),
            GimpleType::Real { .. } => Err(Error::UnsupportedType(ty.to_string()))?,
            GimpleType::Boolean => Self::Primitive(Type::Bool),
            GimpleType::Record { .. } => {
                let strukt = ctx.resolve(ty)?;
                // Values need their layout, which cannot recurse once
                // `resolve` has ruled out self-containment.
                strukt.fields(ctx)?;
                Self::Record(strukt)
            }
            GimpleType::Array { base, length } => {
                let member_type = Self::for_type(ctx, base)?.value_type();
                Self::Array {
                    id: ctx.resolve_array(member_type, *length),
                }
            }
            GimpleType::Pointer { base } | GimpleType::Reference { base } => {
                let nullable = ty.is_nullable();
                match base.as_ref() {
                    GimpleType::Record { .. } => Self::RecordHandle {
                        strukt: ctx.resolve_handle(base)?,
                        nullable,
                    },
                    GimpleType::Pointer { .. } | GimpleType::Reference { .. } => Err(
                        Error::UnsupportedType(format!("{ty} (pointers to pointers)")),
                    )?,
                    _ => Self::Cell {
                        pointee: Self::for_type(ctx, base)?.value_type(),
                        nullable,
                    },
                }
            }
        };

        Ok(translator)
    }

    /// Gets the runtime type of a value of the translated type.
    #[must_use]
    pub fn value_type(&self) -> Type {
        match self {
            Self::Primitive(typ) => typ.clone(),
            Self::Record(strukt) => strukt.typ(),
            Self::RecordHandle { strukt, nullable } => Type::handle(strukt.typ(), *nullable),
            Self::Array { id } => Type::Array(*id),
            Self::Cell { pointee, nullable } => Type::handle(pointee.clone(), *nullable),
        }
    }

    /// Gets how values of the translated type cross a call boundary.
    ///
    /// Arrays have no value form in the runtime, so they are always shared.
    #[must_use]
    pub fn convention(&self) -> CallingConvention {
        match self {
            Self::Primitive(_) | Self::Record(_) => CallingConvention::ByValue,
            Self::RecordHandle { .. } | Self::Array { .. } | Self::Cell { .. } => {
                CallingConvention::ByHandle
            }
        }
    }

    /// Gets the representation of a parameter of the translated type.
    #[must_use]
    pub fn param_repr(&self) -> Representation {
        Representation {
            typ:        self.value_type(),
            convention: self.convention(),
        }
    }

    /// Gets the representation of a return value of the translated type.
    #[must_use]
    pub fn return_repr(&self) -> Representation {
        self.param_repr()
    }

    /// Creates the variable called `name` of GIMPLE type `ty`, which must be
    /// the type this translator was selected for.
    ///
    /// Globals are linked by their name, while every other variable is local
    /// to the object.
    pub fn create_variable(
        &self,
        data: &mut CodegenData,
        name: &str,
        ty: &GimpleType,
        usage: VarUsage,
        location: Option<LocationId>,
    ) -> Var {
        let typ = self.value_type();
        let linkage = match usage {
            VarUsage::Global => VariableLinkage::External(name.to_string()),
            _ => VariableLinkage::Local,
        };
        let label = (usage != VarUsage::Temporary).then_some(name);
        let id = data.add_variable(typ.clone(), linkage, label, location);

        let kind = match self {
            Self::Primitive(_) => VarKind::Primitive,
            Self::Record(strukt) => VarKind::Value(strukt.clone()),
            Self::RecordHandle { strukt, nullable } => VarKind::Handle {
                strukt:   strukt.clone(),
                nullable: *nullable,
            },
            Self::Array { id } => VarKind::Array(*id),
            Self::Cell { nullable, .. } => VarKind::Cell {
                nullable: *nullable,
            },
        };

        Var {
            name: name.to_string(),
            ty: ty.clone(),
            id,
            typ,
            usage,
            kind,
        }
    }
}

#[cfg(test)]
mod test {
    use gbr_errors::compile::Error;
    use gbr_flo::types::{Type, VariableLinkage};
    use gbr_gimple::{types::GimpleField, GimpleType};

    use crate::{
        context::TranslationContext,
        translate::{
            data::CodegenData,
            types::{CallingConvention, TypeTranslator, VarUsage},
            variable::VarKind,
        },
    };

    #[test]
    fn scalars_map_by_width() -> anyhow::Result<()> {
        let ctx = TranslationContext::default();
        let value_type =
            |ty: GimpleType| TypeTranslator::for_type(&ctx, &ty).map(|t| t.value_type());

        assert_eq!(value_type(GimpleType::int(32))?, Type::Signed32);
        assert_eq!(value_type(GimpleType::int(64))?, Type::Signed64);
        assert_eq!(value_type(GimpleType::real(64))?, Type::Double);
        assert_eq!(value_type(GimpleType::Boolean)?, Type::Bool);
        assert!(matches!(
            value_type(GimpleType::int(16)),
            Err(Error::UnsupportedType(_))
        ));
        assert!(matches!(
            value_type(GimpleType::real(32)),
            Err(Error::UnsupportedType(_))
        ));

        Ok(())
    }

    #[test]
    fn pointers_become_handles() -> anyhow::Result<()> {
        let ctx = TranslationContext::default();
        let cell = TypeTranslator::for_type(&ctx, &GimpleType::make_pointer(GimpleType::int(32)))?;
        let reference =
            TypeTranslator::for_type(&ctx, &GimpleType::make_reference(GimpleType::real(64)))?;

        assert_eq!(cell.value_type(), Type::handle(Type::Signed32, true));
        assert_eq!(reference.value_type(), Type::handle(Type::Double, false));
        assert_eq!(cell.param_repr().convention, CallingConvention::ByHandle);

        let double_pointer = GimpleType::make_pointer(GimpleType::make_pointer(GimpleType::int(32)));
        assert!(matches!(
            TypeTranslator::for_type(&ctx, &double_pointer),
            Err(Error::UnsupportedType(_))
        ));

        Ok(())
    }

    #[test]
    fn records_pass_by_value_and_arrays_by_handle() -> anyhow::Result<()> {
        let ctx = TranslationContext::default();
        let record = GimpleType::make_record("pair", &[
            GimpleField::new("a", GimpleType::int(32)),
            GimpleField::new("b", GimpleType::int(32)),
        ]);
        let by_value = TypeTranslator::for_type(&ctx, &record)?;
        let array = TypeTranslator::for_type(&ctx, &GimpleType::make_array(record, 3))?;

        assert_eq!(by_value.return_repr().convention, CallingConvention::ByValue);
        assert_eq!(array.param_repr().convention, CallingConvention::ByHandle);
        assert!(matches!(array.value_type(), Type::Array(_)));

        Ok(())
    }

    #[test]
    fn record_values_need_every_field_translatable() -> anyhow::Result<()> {
        let ctx = TranslationContext::default();
        let record = GimpleType::make_record("wide", &[GimpleField::new("h", GimpleType::int(16))]);

        assert!(matches!(
            TypeTranslator::for_type(&ctx, &record),
            Err(Error::UnsupportedType(_))
        ));
        let handle = TypeTranslator::for_type(&ctx, &GimpleType::make_pointer(record))?;
        assert!(matches!(handle, TypeTranslator::RecordHandle { .. }));

        Ok(())
    }

    #[test]
    fn globals_are_linked_by_name() -> anyhow::Result<()> {
        let ctx = TranslationContext::default();
        let mut data = CodegenData::new("f", "f.c");
        let ty = GimpleType::int(64);
        let translator = TypeTranslator::for_type(&ctx, &ty)?;

        let global = translator.create_variable(&mut data, "counter", &ty, VarUsage::Global, None);
        let local = translator.create_variable(&mut data, "i", &ty, VarUsage::Local, None);

        assert!(matches!(global.kind, VarKind::Primitive));
        assert_eq!(
            data.flo().variables.get(global.id).linkage,
            VariableLinkage::External("counter".to_string())
        );
        assert_eq!(
            data.flo().variables.get(local.id).linkage,
            VariableLinkage::Local
        );

        Ok(())
    }
}
