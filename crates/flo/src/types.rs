//! The entries of a [`crate::flo::FlatLoweredObject`].
//!
//! Every entry is stored in one of the object's intern tables and referred to
//! by an integer id. Entries that can be reserved before they are known carry
//! a [`PoisonType`] so that an object can be checked for holes before it is
//! written out.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::intern::InternIdentifier;

/// A straight-line run of [`Statement`]s, ended by a [`BlockExit`].
///
/// A block that carries a [`Signature`] is the entry of a function.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct Block {
    /// Present only on function entry blocks.
    pub signature: Option<Signature>,

    pub poison: PoisonType,

    /// The statements of the block, in execution order.
    pub statements: Vec<StatementId>,

    /// Where control goes once the statements are done.
    pub exit: BlockExit,

    pub diagnostics: Vec<DiagnosticId>,
}

pub type BlockId = InternIdentifier;

/// The calling interface of a function, attached to its entry [`Block`].
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct Signature {
    /// The variables that the arguments of a call are bound to, in order.
    pub params: Vec<VariableId>,

    /// The variables that hold the results when the function returns.
    pub returns: Vec<VariableId>,

    /// Whether any path through the function may panic, whether through an
    /// explicit [`BlockExit::Panic`] or a null handle.
    pub can_panic: bool,

    pub location: Option<LocationId>,
}

/// Marks an entry that must not be used as-is.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub enum PoisonType {
    /// The entry is usable.
    #[default]
    None,

    /// The entry could not be produced, for the provided reason.
    Poison(String),

    /// The entry has been reserved but not yet filled in.
    ///
    /// A struct type left in this state is opaque. It may be referred to
    /// through handles, but never destructured.
    Undefined,

    /// The entry at id zero of every intern table, so that a zeroed id never
    /// refers to anything real.
    NullInternedValue,
}

impl PoisonType {
    /// Returns `true` unless this is [`PoisonType::None`].
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        !matches!(self, PoisonType::None)
    }
}

/// The transfer of control at the end of a [`Block`].
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub enum BlockExit {
    /// Return to the caller with the values of the provided variables.
    Return(Vec<VariableId>),

    /// Abort execution with the provided message, followed by the values of
    /// the provided variables.
    Panic(String, Vec<VariableId>),

    /// Continue at the provided block.
    Goto(BlockId),

    /// Continue at the target of the first arm whose condition holds.
    Match(Vec<MatchArmId>),

    /// Only valid in a poisoned block.
    #[default]
    Unspecified,
}

/// A single step of execution within a [`Block`].
#[derive(Clone, Serialize, Deserialize, Debug)]
pub enum Statement {
    AssignConst(AssignConstStatement),
    Assign(AssignStatement),
    Call(CallStatement),
    Construct(ConstructStatement),
    Destructure(DestructureStatement),
    Load(LoadStatement),
    Store(StoreStatement),

    /// Only found in a slot that was reserved and never filled.
    Poisoned(PoisonType),
}

pub type StatementId = InternIdentifier;

/// `variable = value`, for a constant `value`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AssignConstStatement {
    pub variable:    VariableId,
    pub value:       ConstantValue,
    pub diagnostics: Vec<DiagnosticId>,
    pub location:    Option<LocationId>,
}

/// `target = source`.
///
/// Structs are copied. Handles and arrays are shared, so that afterwards both
/// variables refer to the same managed object.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AssignStatement {
    pub target:      VariableId,
    pub source:      VariableId,
    pub diagnostics: Vec<DiagnosticId>,
    pub location:    Option<LocationId>,
}

/// `outputs... = block(input...)`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct CallStatement {
    pub block:       BlockRef,
    pub input:       Vec<VariableId>,
    pub outputs:     Vec<VariableId>,
    pub diagnostics: Vec<DiagnosticId>,
    pub location:    Option<LocationId>,
}

/// Builds the struct held by `target` from one variable per member, in member
/// order.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ConstructStatement {
    pub target:      VariableId,
    pub initializer: Vec<VariableId>,
    pub diagnostics: Vec<DiagnosticId>,
    pub location:    Option<LocationId>,
}

/// Copies each member of the struct held by `whole` into the corresponding
/// variable of `parts`.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct DestructureStatement {
    pub whole:       VariableId,
    pub parts:       Vec<VariableId>,
    pub diagnostics: Vec<DiagnosticId>,
    pub location:    Option<LocationId>,
}

/// `target = handle.member`.
///
/// Panics at runtime if `handle` is null, or if an element index is out of
/// bounds.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct LoadStatement {
    pub handle:      VariableId,
    pub member:      Member,
    pub target:      VariableId,
    pub diagnostics: Vec<DiagnosticId>,
    pub location:    Option<LocationId>,
}

/// `handle.member = value`, which is visible through every handle to the same
/// object.
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct StoreStatement {
    pub handle:      VariableId,
    pub member:      Member,
    pub value:       VariableId,
    pub diagnostics: Vec<DiagnosticId>,
    pub location:    Option<LocationId>,
}

/// The part of a managed object accessed by a load or a store.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Member {
    /// The whole object, such as the scalar in a cell.
    Whole,

    /// A struct field, by position.
    Field(usize),

    /// An array element, at the index held in the variable.
    Element(VariableId),
}

/// The block that a call or a match arm transfers control to.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub enum BlockRef {
    /// A block of this object.
    Local(BlockId),

    /// The function exported under the provided symbol by some object,
    /// resolved when objects are linked.
    External(String),

    /// A routine of the runtime library.
    Builtin(String),

    /// Only valid in a poisoned entry.
    #[default]
    Unspecified,
}

/// A typed storage slot.
///
/// Variables are usually anonymous. Those that stand for a named source
/// variable carry its name as a diagnostic.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct Variable {
    pub typ:         Type,
    pub linkage:     VariableLinkage,
    pub poison:      PoisonType,
    pub diagnostics: Vec<DiagnosticId>,
    pub location:    Option<LocationId>,
}

pub type VariableId = InternIdentifier;

/// Where the storage of a [`Variable`] lives.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub enum VariableLinkage {
    /// In the frame of the function using it.
    Local,

    /// In the global exported under the provided symbol, resolved when
    /// objects are linked.
    External(String),

    /// Only valid in a poisoned entry.
    #[default]
    Unspecified,
}

/// The runtime type of a variable.
#[derive(Clone, Serialize, Deserialize, Debug, Default, Eq, Hash, PartialEq)]
pub enum Type {
    Bool,
    Signed32,
    Signed64,
    Double,

    /// A managed array, always shared by reference.
    Array(ArrayTypeId),

    /// A struct held by value.
    Struct(StructTypeId),

    /// A managed reference to a value of the pointee type.
    Handle(HandleType),

    /// Only valid in a poisoned entry.
    #[default]
    Unspecified,
}

impl Type {
    /// Builds a handle to a value of type `pointee`.
    #[must_use]
    pub fn handle(pointee: Type, nullable: bool) -> Self {
        Self::Handle(HandleType {
            pointee: Box::new(pointee),
            nullable,
        })
    }
}

/// The type of a managed reference.
#[derive(Clone, Serialize, Deserialize, Debug, Eq, Hash, PartialEq)]
pub struct HandleType {
    /// A handle to a scalar is a single mutable cell.
    pub pointee: Box<Type>,

    /// Handles that stand for C++ references are never null.
    pub nullable: bool,
}

/// A fixed-length array type.
///
/// The length is part of the type, so two arrays have the same type exactly
/// when they have the same id.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct ArrayType {
    pub member_type: Type,
    pub length:      usize,
    pub poison:      PoisonType,
}

pub type ArrayTypeId = InternIdentifier;

/// A struct type, with named members in declaration order.
///
/// Struct types are nominal: two structs have the same type exactly when they
/// have the same id.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct StructType {
    /// The tag of the struct, or the empty string if it is anonymous.
    pub name:         String,
    pub member_names: Vec<String>,
    pub members:      Vec<Type>,
    pub poison:       PoisonType,
}

pub type StructTypeId = InternIdentifier;

/// A message attached to an entry, such as the source name of a variable.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct Diagnostic {
    pub message:  String,
    pub poison:   PoisonType,
    pub location: Option<LocationId>,
}

pub type DiagnosticId = InternIdentifier;

/// A position in the source file that an entry was translated from.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct Location {
    /// The path of the source file.
    pub source: String,
    pub line:   Option<NonZeroU32>,
    pub poison: PoisonType,
}

pub type LocationId = InternIdentifier;

/// One arm of a [`BlockExit::Match`]. It is taken when the [`Type::Bool`]
/// variable `condition` is true.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct MatchArm {
    pub condition:    VariableId,
    pub target_block: BlockRef,
    pub poison:       PoisonType,
    pub diagnostics:  Vec<DiagnosticId>,
    pub location:     Option<LocationId>,
}

pub type MatchArmId = InternIdentifier;

/// A constant of a scalar or handle type.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct ConstantValue {
    /// The bits of the constant.
    ///
    /// Signed integers are stored in two's complement at the width of their
    /// type, and doubles as their IEEE-754 bit pattern. A handle constant of
    /// zero is the null handle.
    pub value: u128,

    pub typ: Type,
}

impl ConstantValue {
    /// Builds a boolean constant.
    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self {
            value: u128::from(value),
            typ:   Type::Bool,
        }
    }

    /// Builds a 32-bit signed integer constant.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn signed32(value: i32) -> Self {
        Self {
            value: u128::from(value as u32),
            typ:   Type::Signed32,
        }
    }

    /// Builds a 64-bit signed integer constant.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn signed64(value: i64) -> Self {
        Self {
            value: u128::from(value as u64),
            typ:   Type::Signed64,
        }
    }

    /// Builds a double-precision floating-point constant.
    #[must_use]
    pub fn double(value: f64) -> Self {
        Self {
            value: u128::from(value.to_bits()),
            typ:   Type::Double,
        }
    }

    /// Builds the null value of the handle type `typ`.
    #[must_use]
    pub fn null(typ: Type) -> Self {
        Self { value: 0, typ }
    }
}

/// The name under which a function is exported for linking.
pub type FunctionSymbol = String;

#[cfg(test)]
mod test {
    use crate::types::{ConstantValue, PoisonType, Type};

    #[test]
    fn signed_constants_are_twos_complement_at_width() {
        assert_eq!(ConstantValue::signed32(-1).value, 0xffff_ffff);
        assert_eq!(ConstantValue::signed64(-1).value, 0xffff_ffff_ffff_ffff);
        assert_eq!(ConstantValue::double(1.0).value, 0x3ff0_0000_0000_0000);
    }

    #[test]
    fn null_handles_are_zero() {
        let null = ConstantValue::null(Type::handle(Type::Signed32, true));
        assert_eq!(null.value, 0);
        assert!(matches!(null.typ, Type::Handle(h) if h.nullable));
    }

    #[test]
    fn only_none_is_unpoisoned() {
        assert!(!PoisonType::None.is_poisoned());
        assert!(PoisonType::Undefined.is_poisoned());
        assert!(PoisonType::Poison("layout".to_string()).is_poisoned());
    }
}
