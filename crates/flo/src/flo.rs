//! The object itself, and its serialized `.flo` form.
//!
//! The translator produces one object per translated function. The runtime's
//! loader reads them back and links them together through their external
//! references.

use std::{
    fs::File,
    io::{Read, Write},
    str::FromStr,
};

use bimap::BiMap;
use serde::{Deserialize, Serialize};

use crate::{
    intern::InternTable,
    poison::Poisonable,
    types::{
        ArrayType,
        ArrayTypeId,
        Block,
        BlockId,
        Diagnostic,
        DiagnosticId,
        FunctionSymbol,
        Location,
        LocationId,
        MatchArm,
        MatchArmId,
        PoisonType,
        Statement,
        StatementId,
        StructType,
        StructTypeId,
        Variable,
        VariableId,
    },
};

/// The names that an object exports.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct SymbolTables {
    /// The entry block of each function defined by the object.
    pub code: BiMap<FunctionSymbol, BlockId>,
}

/// The array and struct types that the variables of an object refer to.
///
/// The objects translated from one compilation unit all carry the same type
/// tables, so type ids agree between them.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct TypeTables {
    pub arrays:  InternTable<ArrayTypeId, ArrayType>,
    pub structs: InternTable<StructTypeId, StructType>,
}

impl TypeTables {
    /// Creates empty type tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// An in-memory `FLO`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct FlatLoweredObject {
    /// The name of the object, which is the name of the function it defines.
    pub module_name: String,

    pub symbols: SymbolTables,

    /// Every block of the object. Those with a [`crate::types::Signature`] are
    /// function entries.
    pub blocks: InternTable<BlockId, Block>,

    pub statements: InternTable<StatementId, Statement>,

    pub match_arms: InternTable<MatchArmId, MatchArm>,

    /// Every variable of the object, whatever its lifetime or linkage.
    pub variables: InternTable<VariableId, Variable>,

    pub types: TypeTables,

    pub diagnostics: InternTable<DiagnosticId, Diagnostic>,

    pub locations: InternTable<LocationId, Location>,
}

impl FlatLoweredObject {
    /// Creates an empty object with the provided `module_name`.
    #[must_use]
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_owned(),
            symbols:     SymbolTables::default(),
            blocks:      InternTable::new(),
            statements:  InternTable::new(),
            match_arms:  InternTable::new(),
            variables:   InternTable::new(),
            types:       TypeTables::new(),
            diagnostics: InternTable::new(),
            locations:   InternTable::new(),
        }
    }

    /// Gets the table name and id of every poisoned entry that code can reach.
    ///
    /// An opaque struct that is only ever used through handles legitimately
    /// stays [`PoisonType::Undefined`], so only structs whose layout failed are
    /// reported.
    #[must_use]
    pub fn poisoned_entries(&self) -> Vec<(&'static str, usize)> {
        let mut entries = Vec::new();
        entries.extend(poisoned_ids("blocks", &self.blocks));
        entries.extend(poisoned_ids("statements", &self.statements));
        entries.extend(poisoned_ids("match_arms", &self.match_arms));
        entries.extend(poisoned_ids("variables", &self.variables));
        entries.extend(
            self.types
                .structs
                .iter()
                .filter(|(_, strukt)| matches!(strukt.poison, PoisonType::Poison(_)))
                .map(|(id, _)| ("structs", id)),
        );

        entries
    }

    /// Asserts that the object is complete.
    ///
    /// # Panics
    ///
    /// Panics if code can reach a poisoned entry, which means that whatever
    /// built the object is broken.
    fn assert_complete(&self) {
        let poisoned = self.poisoned_entries();
        assert!(
            poisoned.is_empty(),
            "object `{}` contains poisoned entries {poisoned:?}",
            self.module_name
        );
    }

    /// Reads an object from its `.flo` form in `reader`.
    ///
    /// # Errors
    ///
    /// - [`serde_sexpr::Error`] if `reader` does not hold an object.
    ///
    /// # Panics
    ///
    /// Panics if the object that was read contains reachable poison.
    pub fn read(reader: impl Read) -> serde_sexpr::Result<Self> {
        let flo: Self = serde_sexpr::from_reader(reader)?;
        flo.assert_complete();

        Ok(flo)
    }

    /// Reads the `.flo` file at `filename`.
    ///
    /// # Errors
    ///
    /// - [`serde_sexpr::Error`] if the file cannot be read or does not hold an
    ///   object.
    ///
    /// # Panics
    ///
    /// Panics if the object that was read contains reachable poison.
    pub fn read_from_file(filename: &str) -> serde_sexpr::Result<Self> {
        Self::read(File::open(filename)?)
    }

    /// Gets the `.flo` form of the object.
    ///
    /// # Errors
    ///
    /// - [`serde_sexpr::Error`] if the object cannot be serialized.
    ///
    /// # Panics
    ///
    /// Panics if the object contains reachable poison.
    pub fn to_str(&self) -> serde_sexpr::Result<String> {
        self.assert_complete();
        serde_sexpr::to_string(&self)
    }

    /// Writes the `.flo` form of the object to `writer`.
    ///
    /// # Errors
    ///
    /// - [`serde_sexpr::Error`] if the object cannot be written.
    ///
    /// # Panics
    ///
    /// Panics if the object contains reachable poison.
    pub fn write(&self, writer: impl Write) -> serde_sexpr::Result<()> {
        self.assert_complete();
        serde_sexpr::to_writer(writer, &self)
    }

    /// Writes the `.flo` form of the object to the file at `filename`,
    /// replacing it if it exists.
    ///
    /// # Errors
    ///
    /// - [`serde_sexpr::Error`] if the file cannot be written.
    ///
    /// # Panics
    ///
    /// Panics if the object contains reachable poison.
    pub fn write_to_file(&self, filename: &str) -> serde_sexpr::Result<()> {
        self.write(File::create(filename)?)
    }
}

impl FromStr for FlatLoweredObject {
    type Err = serde_sexpr::Error;

    fn from_str(encoded: &str) -> serde_sexpr::Result<Self> {
        Self::read(encoded.as_bytes())
    }
}

/// Gets the ids of the poisoned entries of `table`, each tagged with
/// `table_name`.
fn poisoned_ids<IdType, ValueType>(
    table_name: &'static str,
    table: &InternTable<IdType, ValueType>,
) -> Vec<(&'static str, usize)>
where
    IdType: From<usize> + Into<usize> + Copy,
    ValueType: Poisonable + Clone,
{
    table
        .iter()
        .filter(|(_, value)| ValueType::is_poisoned(value))
        .map(|(id, _)| (table_name, id.into()))
        .collect()
}

#[cfg(test)]
mod test {
    use crate::{
        flo::FlatLoweredObject,
        poison::Poisonable,
        types::{Block, BlockExit, PoisonType, StructType},
    };

    #[test]
    fn opaque_structs_are_not_reported() {
        let mut flo = FlatLoweredObject::new("f");
        let block = flo.blocks.insert(&Block {
            exit: BlockExit::Return(Vec::new()),
            ..Block::default()
        });
        flo.symbols.code.insert("f".to_string(), block);
        let opaque = flo.types.structs.reserve(PoisonType::Undefined);

        assert!(StructType::is_poisoned(&flo.types.structs.get(opaque)));
        assert!(flo.poisoned_entries().is_empty());
    }

    #[test]
    fn structs_that_failed_to_lay_out_are_reported() {
        let mut flo = FlatLoweredObject::new("f");
        let broken = flo.types.structs.insert(&StructType {
            name: "s".to_string(),
            poison: PoisonType::Poison("int16 is not supported".to_string()),
            ..StructType::default()
        });

        assert_eq!(flo.poisoned_entries(), vec![("structs", broken)]);
    }

    #[test]
    fn unfilled_blocks_are_reported() {
        let mut flo = FlatLoweredObject::new("f");
        let block = flo.blocks.reserve(PoisonType::Undefined);

        assert_eq!(flo.poisoned_entries(), vec![("blocks", block)]);
    }

    #[test]
    #[should_panic(expected = "poisoned entries")]
    fn incomplete_objects_are_not_written() {
        let mut flo = FlatLoweredObject::new("f");
        flo.blocks.reserve(PoisonType::Undefined);

        let _ = flo.to_str();
    }
}
