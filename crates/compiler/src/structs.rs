//! The runtime-side representation of GIMPLE record types.
//!
//! Records are resolved in two phases. Resolving a record (see
//! [`TranslationContext::resolve`]) only registers a [`Struct`] with a
//! placeholder type in the type tables, which is all that a handle to the
//! record needs. The layout of its fields is computed the first time it is
//! read through [`Struct::fields`]. As pointer fields only ever need the first
//! phase of their pointee, records that refer to themselves through pointers
//! resolve without recursing.

use std::sync::Arc;

use gbr_errors::compile::{Error, Result};
use gbr_flo::types::{Member, StructType, StructTypeId, Type};
use gbr_gimple::GimpleType;
use itertools::Itertools;
use once_cell::sync::OnceCell;
use tracing::trace;

use crate::{context::TranslationContext, translate::types::TypeTranslator};

/// The resolved runtime aggregate for a single GIMPLE record type.
///
/// There is exactly one `Struct` per structurally-distinct record in a
/// [`TranslationContext`], and it is shared by every use of that record.
#[derive(Debug)]
pub struct Struct {
    /// The ID of the struct type in the context's type tables.
    id: StructTypeId,

    /// The complete GIMPLE record type that this struct represents.
    record: GimpleType,

    /// The field layout, computed on first read.
    layout: OnceCell<Vec<StructField>>,
}

/// A single field of a [`Struct`], along with how to access it.
#[derive(Clone, Debug, PartialEq)]
pub struct StructField {
    /// The name of the field.
    pub name: String,

    /// The GIMPLE type of the field.
    pub ty: GimpleType,

    /// The runtime type of the field.
    pub typ: Type,

    /// The position of the field in the struct.
    pub index: usize,
}

impl StructField {
    /// Gets the member selector that accesses this field through a handle.
    #[must_use]
    pub fn member(&self) -> Member {
        Member::Field(self.index)
    }
}

impl Struct {
    /// Creates a new, not yet laid out, struct with the provided `id` for the
    /// complete `record` type.
    pub(crate) fn new(id: StructTypeId, record: GimpleType) -> Self {
        Self {
            id,
            record,
            layout: OnceCell::new(),
        }
    }

    /// Gets the ID of the struct type in the type tables.
    #[must_use]
    pub fn id(&self) -> StructTypeId {
        self.id
    }

    /// Gets the runtime type of a value of this struct.
    #[must_use]
    pub fn typ(&self) -> Type {
        Type::Struct(self.id)
    }

    /// Gets the complete GIMPLE record type that this struct represents.
    #[must_use]
    pub fn record(&self) -> &GimpleType {
        &self.record
    }

    /// Gets the name of the record, which is empty for anonymous records.
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.record {
            GimpleType::Record { name, .. } => name,
            _ => "",
        }
    }

    /// Returns `true` if the record was never defined, and hence may only be
    /// used through handles.
    #[must_use]
    pub fn is_opaque(&self) -> bool {
        self.record.is_forward_record()
    }

    /// Returns `true` if the field layout has been computed.
    #[must_use]
    pub fn is_laid_out(&self) -> bool {
        self.layout.get().is_some()
    }

    /// Gets the fields of the struct in declaration order, computing the
    /// layout if this is the first read.
    ///
    /// If another thread is computing the layout, this waits for it to
    /// finish.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRecordLayout`] if the record is never defined, if it
    ///   contains itself by value, or if two fields share a name.
    /// - [`Error::UnsupportedType`] if a field has a type that cannot be
    ///   translated.
    pub fn fields(&self, ctx: &TranslationContext) -> Result<&[StructField]> {
        self.layout
            .get_or_try_init(|| self.lay_out(ctx))
            .map(Vec::as_slice)
    }

    /// Gets the field called `name`.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedIR`] if the struct has no such field.
    /// - [`Error`] if the layout cannot be computed, as for [`Self::fields`].
    pub fn field(&self, ctx: &TranslationContext, name: &str) -> Result<&StructField> {
        self.fields(ctx)?
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::MalformedIR(format!("{} has no field `{name}`", self.record)))
    }

    /// Computes the field layout, and publishes the complete struct type to
    /// the context's type tables.
    fn lay_out(&self, ctx: &TranslationContext) -> Result<Vec<StructField>> {
        let fields = self.record.record_fields().unwrap_or_default();
        if fields.is_empty() {
            Err(Error::InvalidRecordLayout(format!(
                "{} is used by value but never defined",
                self.record
            )))?;
        }
        if let Some(duplicate) = fields.iter().map(|f| &f.name).duplicates().next() {
            Err(Error::InvalidRecordLayout(format!(
                "{} has more than one field named `{duplicate}`",
                self.record
            )))?;
        }
        ctx.check_value_layout(&self.record)?;

        let layout = fields
            .iter()
            .enumerate()
            .map(|(index, field)| {
                Ok(StructField {
                    name: field.name.clone(),
                    ty: field.ty.clone(),
                    typ: TypeTranslator::for_type(ctx, &field.ty)?.value_type(),
                    index,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let struct_type = StructType {
            name: self.name().to_string(),
            member_names: layout.iter().map(|f| f.name.clone()).collect(),
            members: layout.iter().map(|f| f.typ.clone()).collect(),
            ..StructType::default()
        };
        ctx.define_struct(self.id, &struct_type);
        trace!(record = %self.record, id = self.id, "laid out struct");

        Ok(layout)
    }
}

/// Structs are equal only if they are the same instance.
impl PartialEq for Struct {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// A shared reference to a resolved struct.
pub type StructRef = Arc<Struct>;

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use gbr_errors::compile::Error;
    use gbr_flo::{poison::Poisonable, types::StructType};
    use gbr_gimple::{types::GimpleField, GimpleType};

    use crate::context::TranslationContext;

    fn point() -> GimpleType {
        GimpleType::make_record("point", &[
            GimpleField::new("x", GimpleType::int(32)),
            GimpleField::new("y", GimpleType::real(64)),
        ])
    }

    #[test]
    fn equal_records_resolve_to_one_struct() -> anyhow::Result<()> {
        let ctx = TranslationContext::default();
        let first = ctx.resolve(&point())?;
        let second = ctx.resolve(&point())?;
        let through_pointer = ctx.resolve_handle(&point())?;

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &through_pointer));

        Ok(())
    }

    #[test]
    fn fields_report_the_declared_order() -> anyhow::Result<()> {
        let ctx = TranslationContext::default();
        let strukt = ctx.resolve(&point())?;
        assert!(!strukt.is_laid_out());

        let fields = strukt.fields(&ctx)?;
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        let types: Vec<_> = fields.iter().map(|f| f.ty.clone()).collect();

        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(types, vec![GimpleType::int(32), GimpleType::real(64)]);
        assert!(strukt.is_laid_out());

        let tables = ctx.type_tables();
        let struct_type = tables.structs.get(strukt.id());
        assert!(!StructType::is_poisoned(&struct_type));
        assert_eq!(struct_type.member_names, vec!["x", "y"]);

        Ok(())
    }

    #[test]
    fn undefined_records_cannot_be_laid_out() -> anyhow::Result<()> {
        let ctx = TranslationContext::default();
        let opaque = ctx.resolve_handle(&GimpleType::make_record("FILE", &[]))?;

        assert!(opaque.is_opaque());
        assert!(matches!(
            opaque.fields(&ctx),
            Err(Error::InvalidRecordLayout(_))
        ));

        Ok(())
    }

    #[test]
    fn duplicate_field_names_are_invalid() -> anyhow::Result<()> {
        let ctx = TranslationContext::default();
        let record = GimpleType::make_record("twice", &[
            GimpleField::new("a", GimpleType::int(32)),
            GimpleField::new("a", GimpleType::int(64)),
        ]);
        let strukt = ctx.resolve(&record)?;

        assert!(matches!(
            strukt.fields(&ctx),
            Err(Error::InvalidRecordLayout(_))
        ));

        Ok(())
    }
}
