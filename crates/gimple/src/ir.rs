//! The statements, expressions, and containers that make up a GIMPLE
//! compilation unit.
//!
//! GIMPLE is a three-address code. Each [`GimpleStatement`] operates on a small
//! number of [`GimpleExpr`] operands, each of which carries its own
//! [`GimpleType`]. Statements live in [`GimpleBasicBlock`]s, which form the
//! control-flow graph of a [`GimpleFunction`].

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::types::GimpleType;

/// The index of a basic block within a function, as assigned by GCC.
pub type BlockIndex = u32;

/// GCC's index for the sentinel entry block of every function.
pub const ENTRY_BLOCK: BlockIndex = 0;

/// GCC's index for the sentinel exit block of every function.
///
/// This block never appears in the plugin output, but jumping to it is how a
/// function leaves its body without an explicit `return`.
pub const EXIT_BLOCK: BlockIndex = 1;

/// An operand of a [`GimpleStatement`].
///
/// Each variant is tagged by the `code` property in the plugin output, using
/// the name of the corresponding GCC tree code.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code")]
pub enum GimpleExpr {
    /// An integer constant.
    #[serde(rename = "integer_cst")]
    IntegerConstant {
        #[serde(rename = "type")]
        ty:    GimpleType,
        value: i64,
    },

    /// A floating-point constant.
    #[serde(rename = "real_cst")]
    RealConstant {
        #[serde(rename = "type")]
        ty:    GimpleType,
        value: f64,
    },

    /// A reference by name to a local variable, a parameter, or a global.
    #[serde(rename = "var_decl", alias = "parm_decl", alias = "ssa_name")]
    Variable {
        #[serde(rename = "type")]
        ty:   GimpleType,
        name: String,
    },

    /// The field `member` of the record-typed `value`.
    ///
    /// When `value` is a [`GimpleExpr::MemRef`] this is the C expression
    /// `p->member`.
    #[serde(rename = "component_ref")]
    ComponentRef {
        #[serde(rename = "type")]
        ty:     GimpleType,
        value:  Box<GimpleExpr>,
        member: String,
    },

    /// The dereference `*pointer`.
    #[serde(rename = "mem_ref")]
    MemRef {
        #[serde(rename = "type")]
        ty:      GimpleType,
        pointer: Box<GimpleExpr>,
    },

    /// The element `array[index]`.
    #[serde(rename = "array_ref")]
    ArrayRef {
        #[serde(rename = "type")]
        ty:    GimpleType,
        array: Box<GimpleExpr>,
        index: Box<GimpleExpr>,
    },

    /// The address `&value`.
    ///
    /// Our target has no addressable memory, so this is read but always
    /// rejected by the translator.
    #[serde(rename = "addr_expr")]
    AddressOf {
        #[serde(rename = "type")]
        ty:    GimpleType,
        value: Box<GimpleExpr>,
    },
}

impl GimpleExpr {
    /// Gets the type of the value produced by `self`.
    #[must_use]
    pub fn ty(&self) -> &GimpleType {
        match self {
            Self::IntegerConstant { ty, .. }
            | Self::RealConstant { ty, .. }
            | Self::Variable { ty, .. }
            | Self::ComponentRef { ty, .. }
            | Self::MemRef { ty, .. }
            | Self::ArrayRef { ty, .. }
            | Self::AddressOf { ty, .. } => ty,
        }
    }

    /// Builds a reference to the variable `name` of type `ty`.
    #[must_use]
    pub fn var(name: impl Into<String>, ty: GimpleType) -> Self {
        Self::Variable {
            ty,
            name: name.into(),
        }
    }

    /// Builds an integer constant with the provided `value` and type `ty`.
    #[must_use]
    pub fn int(value: i64, ty: GimpleType) -> Self {
        Self::IntegerConstant { ty, value }
    }

    /// Returns `true` if `self` is a constant.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        matches!(self, Self::IntegerConstant { .. } | Self::RealConstant { .. })
    }
}

/// Renders operands as C source text for use in diagnostics.
impl Display for GimpleExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GimpleExpr::IntegerConstant { value, .. } => write!(f, "{value}"),
            GimpleExpr::RealConstant { value, .. } => write!(f, "{value:?}"),
            GimpleExpr::Variable { name, .. } => write!(f, "{name}"),
            GimpleExpr::ComponentRef { value, member, .. } => match value.as_ref() {
                GimpleExpr::MemRef { pointer, .. } => write!(f, "{pointer}->{member}"),
                other => write!(f, "{other}.{member}"),
            },
            GimpleExpr::MemRef { pointer, .. } => write!(f, "*{pointer}"),
            GimpleExpr::ArrayRef { array, index, .. } => write!(f, "{array}[{index}]"),
            GimpleExpr::AddressOf { value, .. } => write!(f, "&{value}"),
        }
    }
}

/// The operation performed by a [`GimpleAssign`] or tested by a
/// [`GimpleConditional`].
///
/// The wire names are the GCC tree codes. For a plain copy GCC reports the
/// code of the right-hand operand itself, so all of those codes are accepted
/// as aliases of [`GimpleOp::Nop`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum GimpleOp {
    #[serde(
        rename = "nop_expr",
        alias = "var_decl",
        alias = "parm_decl",
        alias = "ssa_name",
        alias = "integer_cst",
        alias = "real_cst",
        alias = "component_ref",
        alias = "mem_ref",
        alias = "array_ref"
    )]
    Nop,

    #[serde(rename = "plus_expr")]
    Plus,
    #[serde(rename = "minus_expr")]
    Minus,
    #[serde(rename = "mult_expr")]
    Mult,
    #[serde(rename = "trunc_div_expr")]
    TruncDiv,
    #[serde(rename = "rdiv_expr")]
    RDiv,
    #[serde(rename = "trunc_mod_expr")]
    TruncMod,
    #[serde(rename = "negate_expr")]
    Negate,
    #[serde(rename = "abs_expr")]
    Abs,
    #[serde(rename = "min_expr")]
    Min,
    #[serde(rename = "max_expr")]
    Max,

    #[serde(rename = "bit_and_expr")]
    BitAnd,
    #[serde(rename = "bit_ior_expr")]
    BitIor,
    #[serde(rename = "bit_xor_expr")]
    BitXor,
    #[serde(rename = "bit_not_expr")]
    BitNot,
    #[serde(rename = "lshift_expr")]
    LShift,
    #[serde(rename = "rshift_expr")]
    RShift,

    #[serde(rename = "eq_expr")]
    Eq,
    #[serde(rename = "ne_expr")]
    Ne,
    #[serde(rename = "lt_expr")]
    Lt,
    #[serde(rename = "le_expr")]
    Le,
    #[serde(rename = "gt_expr")]
    Gt,
    #[serde(rename = "ge_expr")]
    Ge,

    #[serde(rename = "truth_and_expr")]
    TruthAnd,
    #[serde(rename = "truth_or_expr")]
    TruthOr,
    #[serde(rename = "truth_not_expr")]
    TruthNot,

    #[serde(rename = "float_expr")]
    Float,
    #[serde(rename = "fix_trunc_expr")]
    FixTrunc,
    #[serde(rename = "convert_expr", alias = "nop_convert_expr")]
    Convert,

    #[serde(rename = "pointer_plus_expr")]
    PointerPlus,
}

/// The broad category of a [`GimpleOp`], which determines how its operand
/// types are checked.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpClass {
    /// A plain copy of a single operand.
    Copy,

    /// Arithmetic or bitwise operation whose operands and result share a type.
    Arithmetic,

    /// Comparison of two operands of the same type, producing a boolean.
    Comparison,

    /// Logical operation on booleans.
    Logical,

    /// Conversion between numeric types.
    Conversion,

    /// Arithmetic on native addresses.
    PointerArithmetic,
}

impl GimpleOp {
    /// Gets the GCC tree code name of the operation.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "nop_expr",
            Self::Plus => "plus_expr",
            Self::Minus => "minus_expr",
            Self::Mult => "mult_expr",
            Self::TruncDiv => "trunc_div_expr",
            Self::RDiv => "rdiv_expr",
            Self::TruncMod => "trunc_mod_expr",
            Self::Negate => "negate_expr",
            Self::Abs => "abs_expr",
            Self::Min => "min_expr",
            Self::Max => "max_expr",
            Self::BitAnd => "bit_and_expr",
            Self::BitIor => "bit_ior_expr",
            Self::BitXor => "bit_xor_expr",
            Self::BitNot => "bit_not_expr",
            Self::LShift => "lshift_expr",
            Self::RShift => "rshift_expr",
            Self::Eq => "eq_expr",
            Self::Ne => "ne_expr",
            Self::Lt => "lt_expr",
            Self::Le => "le_expr",
            Self::Gt => "gt_expr",
            Self::Ge => "ge_expr",
            Self::TruthAnd => "truth_and_expr",
            Self::TruthOr => "truth_or_expr",
            Self::TruthNot => "truth_not_expr",
            Self::Float => "float_expr",
            Self::FixTrunc => "fix_trunc_expr",
            Self::Convert => "convert_expr",
            Self::PointerPlus => "pointer_plus_expr",
        }
    }

    /// Gets the category of the operation.
    #[must_use]
    pub fn class(self) -> OpClass {
        match self {
            Self::Nop => OpClass::Copy,
            Self::Plus
            | Self::Minus
            | Self::Mult
            | Self::TruncDiv
            | Self::RDiv
            | Self::TruncMod
            | Self::Negate
            | Self::Abs
            | Self::Min
            | Self::Max
            | Self::BitAnd
            | Self::BitIor
            | Self::BitXor
            | Self::BitNot
            | Self::LShift
            | Self::RShift => OpClass::Arithmetic,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => OpClass::Comparison,
            Self::TruthAnd | Self::TruthOr | Self::TruthNot => OpClass::Logical,
            Self::Float | Self::FixTrunc | Self::Convert => OpClass::Conversion,
            Self::PointerPlus => OpClass::PointerArithmetic,
        }
    }

    /// Gets the number of operands that the operation expects.
    #[must_use]
    pub fn arity(self) -> usize {
        match self {
            Self::Nop
            | Self::Negate
            | Self::Abs
            | Self::BitNot
            | Self::TruthNot
            | Self::Float
            | Self::FixTrunc
            | Self::Convert => 1,
            _ => 2,
        }
    }
}

impl Display for GimpleOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single GIMPLE statement.
///
/// Each variant is tagged by the `type` property in the plugin output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GimpleStatement {
    #[serde(rename = "assign")]
    Assign(GimpleAssign),

    #[serde(rename = "call")]
    Call(GimpleCall),

    #[serde(rename = "conditional")]
    Conditional(GimpleConditional),

    #[serde(rename = "return")]
    Return(GimpleReturn),

    #[serde(rename = "goto")]
    Goto(GimpleGoto),

    #[serde(rename = "switch")]
    Switch(GimpleSwitch),
}

impl GimpleStatement {
    /// Gets the source line that the statement was generated from, if the
    /// plugin recorded one.
    #[must_use]
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::Assign(s) => s.line,
            Self::Call(s) => s.line,
            Self::Conditional(s) => s.line,
            Self::Return(s) => s.line,
            Self::Goto(s) => s.line,
            Self::Switch(s) => s.line,
        }
    }

    /// Returns `true` if `self` ends its basic block by transferring control.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Conditional(_) | Self::Return(_) | Self::Goto(_) | Self::Switch(_)
        )
    }

    /// Gets the short name of the statement kind, as used on the wire.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Assign(_) => "assign",
            Self::Call(_) => "call",
            Self::Conditional(_) => "conditional",
            Self::Return(_) => "return",
            Self::Goto(_) => "goto",
            Self::Switch(_) => "switch",
        }
    }
}

/// Computes `lhs = operator(operands...)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GimpleAssign {
    pub operator: GimpleOp,
    pub lhs:      GimpleExpr,
    pub operands: Vec<GimpleExpr>,
    #[serde(default)]
    pub line:     Option<u32>,
}

/// Calls `function`, optionally storing its result into `lhs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GimpleCall {
    pub function:  String,
    #[serde(default)]
    pub arguments: Vec<GimpleExpr>,
    #[serde(default)]
    pub lhs:       Option<GimpleExpr>,
    #[serde(default)]
    pub line:      Option<u32>,
}

/// Branches to `true_label` if `operator(operands...)` holds, and to
/// `false_label` otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GimpleConditional {
    pub operator:    GimpleOp,
    pub operands:    Vec<GimpleExpr>,
    pub true_label:  BlockIndex,
    pub false_label: BlockIndex,
    #[serde(default)]
    pub line:        Option<u32>,
}

/// Returns from the function, with a value unless the function is `void`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GimpleReturn {
    #[serde(default)]
    pub value: Option<GimpleExpr>,
    #[serde(default)]
    pub line:  Option<u32>,
}

/// Unconditionally transfers control to the block `target`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GimpleGoto {
    pub target: BlockIndex,
    #[serde(default)]
    pub line:   Option<u32>,
}

/// Dispatches on the integer `value` to one of the `cases`, falling back to
/// `default_label`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GimpleSwitch {
    pub value:         GimpleExpr,
    #[serde(default)]
    pub cases:         Vec<GimpleCase>,
    pub default_label: BlockIndex,
    #[serde(default)]
    pub line:          Option<u32>,
}

/// A single label of a [`GimpleSwitch`].
///
/// GCC allows `case low ... high:` ranges, in which case `high` is set and the
/// range is inclusive on both ends.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GimpleCase {
    pub low:   i64,
    #[serde(default)]
    pub high:  Option<i64>,
    pub block: BlockIndex,
}

impl GimpleCase {
    /// Creates a case matching exactly `value`.
    #[must_use]
    pub fn single(value: i64, block: BlockIndex) -> Self {
        Self {
            low: value,
            high: None,
            block,
        }
    }

    /// Gets the inclusive upper bound of the case.
    #[must_use]
    pub fn high(&self) -> i64 {
        self.high.unwrap_or(self.low)
    }

    /// Returns `true` if `self` and `other` match at least one common value.
    #[must_use]
    pub fn overlaps(&self, other: &GimpleCase) -> bool {
        self.low <= other.high() && other.low <= self.high()
    }
}

/// A named and typed declaration, used for parameters, locals, and globals.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GimpleVarDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty:   GimpleType,
}

impl GimpleVarDecl {
    /// Creates a declaration of `name` with type `ty`.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: GimpleType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A maximal straight-line sequence of statements.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GimpleBasicBlock {
    pub index:      BlockIndex,
    #[serde(default)]
    pub statements: Vec<GimpleStatement>,
}

/// A function definition and its control-flow graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GimpleFunction {
    pub name:        String,
    #[serde(default)]
    pub parameters:  Vec<GimpleVarDecl>,
    /// The declared return type, or [`None`] for a `void` function.
    #[serde(default)]
    pub return_type: Option<GimpleType>,
    pub entry_block: BlockIndex,
    #[serde(default)]
    pub variables:   Vec<GimpleVarDecl>,
    pub blocks:      Vec<GimpleBasicBlock>,
}

impl GimpleFunction {
    /// Gets the block with the provided `index`, if it exists.
    #[must_use]
    pub fn block(&self, index: BlockIndex) -> Option<&GimpleBasicBlock> {
        self.blocks.iter().find(|b| b.index == index)
    }

    /// Gets the block that follows the block with the provided `index` in
    /// declaration order, which is where control falls through to.
    #[must_use]
    pub fn block_after(&self, index: BlockIndex) -> Option<&GimpleBasicBlock> {
        let position = self.blocks.iter().position(|b| b.index == index)?;
        self.blocks.get(position + 1)
    }

    /// Gets the declaration that describes how to call this function.
    #[must_use]
    pub fn declaration(&self) -> GimpleFunctionDecl {
        GimpleFunctionDecl {
            name:            self.name.clone(),
            parameter_types: self.parameters.iter().map(|p| p.ty.clone()).collect(),
            return_type:     self.return_type.clone(),
        }
    }
}

/// The signature of a function that is called from, but possibly not defined
/// in, the compilation unit.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GimpleFunctionDecl {
    pub name:            String,
    #[serde(default)]
    pub parameter_types: Vec<GimpleType>,
    #[serde(default)]
    pub return_type:     Option<GimpleType>,
}

/// The full definition of a named record type.
///
/// Records in the unit are referenced by name from
/// [`GimpleType::Record`] forward references.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GimpleRecordDefinition {
    pub name:   String,
    pub fields: Vec<crate::types::GimpleField>,
}

impl GimpleRecordDefinition {
    /// Gets the complete record type described by this definition.
    #[must_use]
    pub fn to_type(&self) -> GimpleType {
        GimpleType::make_record(self.name.clone(), &self.fields)
    }
}

/// Everything GCC produced for one source file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GimpleCompilationUnit {
    /// The path of the source file that was compiled, if known.
    #[serde(default)]
    pub source_file:  Option<String>,
    #[serde(default)]
    pub functions:    Vec<GimpleFunction>,
    #[serde(default)]
    pub globals:      Vec<GimpleVarDecl>,
    #[serde(default)]
    pub records:      Vec<GimpleRecordDefinition>,
    /// Functions that are called but defined in other units.
    #[serde(default)]
    pub declarations: Vec<GimpleFunctionDecl>,
}
