//! The state shared by every function translated from a single compilation
//! unit.
//!
//! Functions are translated concurrently, but they must agree on the runtime
//! identity of every record and array type. The [`TranslationContext`] owns
//! those identities, and is safe to share between the translating threads.
//!
//! # Locking
//!
//! Two kinds of lock live here: the shard locks of the `structs` and `arrays`
//! maps, and the lock on the type tables. The type tables lock is only ever
//! taken while holding a shard lock or while holding no lock, never the other
//! way around.

use std::{collections::HashSet, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};
use gbr_errors::compile::{Error, Result};
use gbr_flo::{
    flo::TypeTables,
    types::{ArrayType, ArrayTypeId, PoisonType, StructType, StructTypeId, Type},
};
use gbr_gimple::{ir::GimpleRecordDefinition, GimpleType};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::{pass::analysis::unit_map::UnitMap, polyfill::PolyfillMap, structs::Struct};

/// The context for translating the functions of a compilation unit.
#[derive(Debug)]
pub struct TranslationContext {
    /// The top-level structure of the unit being translated.
    unit_map: UnitMap,

    /// The polyfills that operations are translated into calls to.
    polyfill_map: PolyfillMap,

    /// The struct for each complete record type that has been resolved.
    structs: DashMap<GimpleType, Arc<Struct>>,

    /// The array type for each distinct element type and length.
    arrays: DashMap<(Type, usize), ArrayTypeId>,

    /// The type tables shared by every object translated in this context.
    types: Mutex<TypeTables>,
}

impl TranslationContext {
    /// Creates a new translation context for the unit described by `unit_map`,
    /// translating operations using the provided `polyfill_map`.
    #[must_use]
    pub fn new(unit_map: UnitMap, polyfill_map: PolyfillMap) -> Self {
        Self {
            unit_map,
            polyfill_map,
            structs: DashMap::new(),
            arrays: DashMap::new(),
            types: Mutex::new(TypeTables::new()),
        }
    }

    /// Gets the map of the unit being translated.
    #[must_use]
    pub fn unit_map(&self) -> &UnitMap {
        &self.unit_map
    }

    /// Gets the polyfills that operations are translated into.
    #[must_use]
    pub fn polyfills(&self) -> &PolyfillMap {
        &self.polyfill_map
    }

    /// Completes a forward reference to a named record with its definition in
    /// the unit.
    ///
    /// Any other type, including a forward reference to a record that the unit
    /// never defines, is returned unchanged.
    #[must_use]
    pub fn complete(&self, ty: &GimpleType) -> GimpleType {
        match ty {
            GimpleType::Record { name, .. } if ty.is_forward_record() && !name.is_empty() => self
                .unit_map
                .record(name)
                .map_or_else(|| ty.clone(), GimpleRecordDefinition::to_type),
            _ => ty.clone(),
        }
    }

    /// Resolves the struct for a `record` that is used by value.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRecordLayout`] if the record contains itself by value.
    /// - [`Error::CompilationFailure`] if `record` is not a record type.
    pub fn resolve(&self, record: &GimpleType) -> Result<Arc<Struct>> {
        let record = self.complete_record(record)?;
        self.check_value_layout(&record)?;
        Ok(self.register(record))
    }

    /// Resolves the struct for a `record` that is only used through a handle.
    ///
    /// This never inspects the fields of the record, and hence succeeds for
    /// records that refer to themselves and for records that are never
    /// defined.
    ///
    /// # Errors
    ///
    /// - [`Error::CompilationFailure`] if `record` is not a record type.
    pub fn resolve_handle(&self, record: &GimpleType) -> Result<Arc<Struct>> {
        let record = self.complete_record(record)?;
        Ok(self.register(record))
    }

    /// Gets the array type with elements of the runtime type `member_type` and
    /// the provided `length`, creating it if it does not yet exist.
    pub fn resolve_array(&self, member_type: Type, length: usize) -> ArrayTypeId {
        match self.arrays.entry((member_type, length)) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let (member_type, length) = entry.key().clone();
                let array_type = ArrayType {
                    member_type,
                    length,
                    ..ArrayType::default()
                };
                let id = self.types.lock().arrays.insert(&array_type);
                entry.insert(id);
                id
            }
        }
    }

    /// Checks that the `record` does not contain itself by value, whether
    /// directly, through an array, or through another record.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRecordLayout`] if the record contains itself by value.
    pub fn check_value_layout(&self, record: &GimpleType) -> Result<()> {
        let mut path = Vec::new();
        self.check_contained(record, &mut path)
    }

    /// Walks the types that `ty` contains by value, failing if any record is
    /// reached twice along a single path.
    fn check_contained(&self, ty: &GimpleType, path: &mut Vec<GimpleType>) -> Result<()> {
        match ty {
            GimpleType::Array { base, .. } => self.check_contained(base, path),
            GimpleType::Record { .. } => {
                let record = self.complete(ty);
                if path.contains(&record) {
                    Err(Error::InvalidRecordLayout(format!(
                        "{record} contains itself by value"
                    )))?;
                }

                path.push(record.clone());
                for field in record.record_fields().unwrap_or_default() {
                    self.check_contained(&field.ty, path)?;
                }
                path.pop();

                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Completes `record`, failing if it is not a record type at all.
    fn complete_record(&self, record: &GimpleType) -> Result<GimpleType> {
        if !record.is_record() {
            Err(Error::CompilationFailure(format!(
                "attempted to resolve the non-record type {record} as a struct"
            )))?;
        }

        Ok(self.complete(record))
    }

    /// Gets the struct for the complete `record`, registering a placeholder
    /// for it in the type tables if this is the first time it is seen.
    fn register(&self, record: GimpleType) -> Arc<Struct> {
        match self.structs.entry(record) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let id = self.types.lock().structs.reserve(PoisonType::Undefined);
                trace!(record = %entry.key(), id, "registered struct");

                let strukt = Arc::new(Struct::new(id, entry.key().clone()));
                entry.insert(strukt.clone());
                strukt
            }
        }
    }

    /// Publishes the complete `struct_type` for the struct with the provided
    /// `id`.
    pub(crate) fn define_struct(&self, id: StructTypeId, struct_type: &StructType) {
        self.types.lock().structs.swap(id, struct_type);
    }

    /// Computes the layout of every struct that has been resolved in this
    /// context but not yet read by value.
    ///
    /// Opaque structs are left as undefined. So is any struct whose layout
    /// cannot be computed: translating a value or a field of it fails, so the
    /// functions that translated only ever hold it through handles.
    pub fn finalize_structs(&self) {
        let mut finalized = HashSet::new();

        // Laying out a struct can resolve the structs of its fields, so we go
        // until nothing new turns up.
        loop {
            let pending: Vec<Arc<Struct>> = self
                .structs
                .iter()
                .filter(|entry| !finalized.contains(&entry.value().id()))
                .map(|entry| entry.value().clone())
                .collect();
            if pending.is_empty() {
                break;
            }

            for strukt in pending {
                finalized.insert(strukt.id());
                if strukt.is_opaque() {
                    trace!(record = %strukt.record(), "leaving opaque struct undefined");
                    continue;
                }

                if let Err(error) = strukt.fields(self) {
                    warn!(record = %strukt.record(), %error, "leaving struct opaque");
                }
            }
        }
    }

    /// Gets a snapshot of the type tables as they currently stand.
    #[must_use]
    pub fn type_tables(&self) -> TypeTables {
        self.types.lock().clone()
    }
}

impl Default for TranslationContext {
    fn default() -> Self {
        Self::new(UnitMap::default(), PolyfillMap::default())
    }
}

#[cfg(test)]
mod test {
    use gbr_errors::compile::Error;
    use gbr_flo::types::{PoisonType, Type};
    use gbr_gimple::{ir::GimpleRecordDefinition, types::GimpleField, GimpleType};

    use crate::{
        context::TranslationContext,
        pass::analysis::unit_map::UnitMap,
        polyfill::PolyfillMap,
    };

    fn linked_list() -> GimpleType {
        let forward = GimpleType::make_record("node", &[]);
        GimpleType::make_record("node", &[
            GimpleField::new("value", GimpleType::int(32)),
            GimpleField::new("next", GimpleType::make_pointer(forward)),
        ])
    }

    fn context_with(records: &[GimpleType]) -> TranslationContext {
        let mut unit_map = UnitMap::new();
        for record in records {
            if let GimpleType::Record { name, fields } = record {
                unit_map.records.insert(name.clone(), GimpleRecordDefinition {
                    name:   name.clone(),
                    fields: fields.clone(),
                });
            }
        }

        TranslationContext::new(unit_map, PolyfillMap::default())
    }

    #[test]
    fn forward_references_complete_from_the_unit() -> anyhow::Result<()> {
        let ctx = context_with(&[linked_list()]);
        let forward = GimpleType::make_record("node", &[]);

        let by_name = ctx.resolve_handle(&forward)?;
        let by_definition = ctx.resolve(&linked_list())?;

        assert!(std::sync::Arc::ptr_eq(&by_name, &by_definition));
        assert_eq!(ctx.complete(&forward), linked_list());

        Ok(())
    }

    #[test]
    fn self_reference_through_a_pointer_is_allowed() -> anyhow::Result<()> {
        let ctx = context_with(&[linked_list()]);
        let node = ctx.resolve(&linked_list())?;
        let fields = node.fields(&ctx)?;

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].typ, Type::handle(node.typ(), true));

        Ok(())
    }

    #[test]
    fn containing_yourself_by_value_is_invalid() {
        let forward = GimpleType::make_record("loop", &[]);
        let looping = GimpleType::make_record("loop", &[
            GimpleField::new("value", GimpleType::int(32)),
            GimpleField::new("again", GimpleType::make_array(forward, 2)),
        ]);
        let ctx = context_with(&[looping.clone()]);

        assert!(matches!(
            ctx.resolve(&looping),
            Err(Error::InvalidRecordLayout(_))
        ));
    }

    #[test]
    fn arrays_are_interned_by_element_and_length() {
        let ctx = TranslationContext::default();
        let first = ctx.resolve_array(Type::Signed32, 4);
        let second = ctx.resolve_array(Type::Signed32, 4);
        let longer = ctx.resolve_array(Type::Signed32, 8);

        assert_eq!(first, second);
        assert_ne!(first, longer);
        assert_eq!(ctx.type_tables().arrays.len(), 2);
    }

    #[test]
    fn finalizing_lays_out_defined_structs_only() -> anyhow::Result<()> {
        let ctx = context_with(&[linked_list()]);
        let node = ctx.resolve_handle(&linked_list())?;
        let file = ctx.resolve_handle(&GimpleType::make_record("FILE", &[]))?;

        ctx.finalize_structs();
        let tables = ctx.type_tables();

        assert_eq!(tables.structs.get(node.id()).poison, PoisonType::None);
        assert_eq!(tables.structs.get(file.id()).poison, PoisonType::Undefined);

        Ok(())
    }
}
