//! This module contains the output structures for the translation of a single
//! function.

use std::{collections::HashMap, num::NonZeroU32};

use gbr_flo::{
    types::{
        Block,
        BlockId,
        BlockRef,
        Diagnostic,
        Location,
        LocationId,
        MatchArm,
        MatchArmId,
        PoisonType,
        Statement,
        StatementId,
        Type,
        Variable,
        VariableId,
        VariableLinkage,
    },
    FlatLoweredObject,
};

/// The data store for the in-progress work of translating a function.
///
/// This is intended to be handed as a mutable reference through each of the
/// steps of the translation process, and modified by each step.
#[derive(Debug)]
pub struct CodegenData {
    /// The underlying FLO that is being generated as part of the translation
    /// process.
    ///
    /// Please note that at any point this object may be in an **invalid
    /// state**, as this is allowed to aid compilation. Blocks in particular are
    /// reserved before their contents are known. The consumer of the API is
    /// responsible for ensuring that the FLO is in a coherent or valid state
    /// _before_ finalizing its generation.
    flat_lowered_object: FlatLoweredObject,

    /// The source file that locations refer to.
    source: String,

    /// The location already interned for each source line.
    locations: HashMap<NonZeroU32, LocationId>,
}

impl CodegenData {
    /// Constructs a new data store for the object with the provided `name`,
    /// whose locations refer to the provided `source` file.
    #[must_use]
    pub fn new(name: &str, source: &str) -> Self {
        let flat_lowered_object = FlatLoweredObject::new(name);

        Self {
            flat_lowered_object,
            source: source.to_string(),
            locations: HashMap::new(),
        }
    }

    /// Gets an immutable reference to the underlying FLO being built.
    #[must_use]
    pub fn flo(&self) -> &FlatLoweredObject {
        &self.flat_lowered_object
    }

    /// Gets a mutable reference to the underlying FLO being built.
    pub fn flo_mut(&mut self) -> &mut FlatLoweredObject {
        &mut self.flat_lowered_object
    }

    /// Gets the location of the provided source `line`, if there is one.
    pub fn location(&mut self, line: Option<u32>) -> Option<LocationId> {
        let line = NonZeroU32::new(line?)?;
        if let Some(location) = self.locations.get(&line) {
            return Some(*location);
        }

        let location = self.flat_lowered_object.locations.insert(&Location {
            source: self.source.clone(),
            line: Some(line),
            ..Location::default()
        });
        self.locations.insert(line, location);

        Some(location)
    }

    /// Adds a new variable of type `typ` with the provided `linkage`.
    ///
    /// A `name`, where provided, is attached to the variable as a diagnostic
    /// so that the variable can be related back to the source.
    pub fn add_variable(
        &mut self,
        typ: Type,
        linkage: VariableLinkage,
        name: Option<&str>,
        location: Option<LocationId>,
    ) -> VariableId {
        let diagnostics = name
            .map(|name| {
                self.flat_lowered_object.diagnostics.insert(&Diagnostic {
                    message: format!("`{name}`"),
                    location,
                    ..Diagnostic::default()
                })
            })
            .into_iter()
            .collect();

        self.flat_lowered_object.variables.insert(&Variable {
            typ,
            linkage,
            diagnostics,
            location,
            ..Variable::default()
        })
    }

    /// Adds the provided `statement` to the object, returning its ID.
    pub fn add_statement(&mut self, statement: &Statement) -> StatementId {
        self.flat_lowered_object.statements.insert(statement)
    }

    /// Adds an arm that continues to the block `target` if the boolean
    /// `condition` holds.
    pub fn add_match_arm(
        &mut self,
        condition: VariableId,
        target: BlockId,
        location: Option<LocationId>,
    ) -> MatchArmId {
        self.flat_lowered_object.match_arms.insert(&MatchArm {
            condition,
            target_block: BlockRef::Local(target),
            location,
            ..MatchArm::default()
        })
    }

    /// Adds a complete `block`, returning its ID.
    pub fn add_block(&mut self, block: &Block) -> BlockId {
        self.flat_lowered_object.blocks.insert(block)
    }

    /// Reserves the ID of a block whose contents are not yet known.
    ///
    /// The block must be filled in using [`Self::fill_block`] before the
    /// object is complete.
    pub fn reserve_block(&mut self) -> BlockId {
        self.flat_lowered_object
            .blocks
            .reserve(PoisonType::Undefined)
    }

    /// Fills in the reserved block `id` with the provided `block`.
    pub fn fill_block(&mut self, id: BlockId, block: &Block) {
        self.flat_lowered_object.blocks.swap(id, block);
    }
}

impl From<CodegenData> for FlatLoweredObject {
    fn from(value: CodegenData) -> Self {
        value.flat_lowered_object
    }
}

#[cfg(test)]
mod test {
    use gbr_flo::types::{Type, VariableLinkage};

    use crate::translate::data::CodegenData;

    #[test]
    fn locations_are_shared_between_uses_of_a_line() {
        let mut data = CodegenData::new("f", "f.c");
        let first = data.location(Some(3));
        let second = data.location(Some(3));
        let other = data.location(Some(4));

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(data.location(None), None);
        assert_eq!(data.location(Some(0)), None);
        assert_eq!(data.flo().locations.len(), 2);
    }

    #[test]
    fn named_variables_carry_a_diagnostic() {
        let mut data = CodegenData::new("f", "f.c");
        let named = data.add_variable(Type::Signed32, VariableLinkage::Local, Some("x"), None);
        let anonymous = data.add_variable(Type::Signed32, VariableLinkage::Local, None, None);

        let flo = data.flo();
        let diagnostic = flo.variables.get(named).diagnostics[0];
        assert_eq!(flo.diagnostics.get(diagnostic).message, "`x`");
        assert!(flo.variables.get(anonymous).diagnostics.is_empty());
    }
}
