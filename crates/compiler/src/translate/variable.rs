//! The variables of a function under translation.

use std::sync::Arc;

use gbr_flo::types::{ArrayTypeId, Type, VariableId};
use gbr_gimple::GimpleType;

use crate::{structs::Struct, translate::types::VarUsage};

/// How a variable holds its value, which determines how it may be read and
/// written.
#[derive(Clone, Debug)]
pub enum VarKind {
    /// A scalar held directly.
    Primitive,

    /// A record held by value, which is read through destructuring.
    Value(Arc<Struct>),

    /// A handle to a record, whose fields are read and written through the
    /// handle.
    Handle { strukt: Arc<Struct>, nullable: bool },

    /// A reference to a managed array.
    Array(ArrayTypeId),

    /// A handle to a single scalar cell.
    Cell { nullable: bool },
}

/// A GIMPLE variable together with the runtime variable that holds it.
#[derive(Clone, Debug)]
pub struct Var {
    /// The GIMPLE name of the variable.
    pub name: String,

    /// The declared GIMPLE type of the variable.
    pub ty: GimpleType,

    /// The runtime variable.
    pub id: VariableId,

    /// The runtime type of the variable.
    pub typ: Type,

    /// The role of the variable in its function.
    pub usage: VarUsage,

    /// How the variable holds its value.
    pub kind: VarKind,
}

impl Var {
    /// Returns `true` if the variable is a handle that may be null.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        matches!(
            self.kind,
            VarKind::Handle { nullable: true, .. } | VarKind::Cell { nullable: true }
        )
    }

    /// Gets the struct that the variable holds or refers to, if any.
    #[must_use]
    pub fn strukt(&self) -> Option<&Arc<Struct>> {
        match &self.kind {
            VarKind::Value(strukt) | VarKind::Handle { strukt, .. } => Some(strukt),
            VarKind::Primitive | VarKind::Array(_) | VarKind::Cell { .. } => None,
        }
    }
}
