//! Entries that can stand in a table slot without holding a usable value.

use crate::types::{
    ArrayType,
    Block,
    Diagnostic,
    Location,
    MatchArm,
    PoisonType,
    Statement,
    StructType,
    Variable,
};

/// An entry type of an [`crate::intern::InternTable`].
pub trait Poisonable {
    /// Builds an entry that is poisoned with `typ`.
    fn poisoned(typ: PoisonType) -> Self;

    /// Returns `true` if `value` is poisoned.
    fn is_poisoned(value: &Self) -> bool;
}

macro_rules! poisonable {
    (struct $($val:ty),+) => {$(
        impl Poisonable for $val {
            fn poisoned(typ: PoisonType) -> Self {
                Self {
                    poison: typ,
                    ..Default::default()
                }
            }

            fn is_poisoned(value: &Self) -> bool {
                value.poison.is_poisoned()
            }
        }
    )+};
    (enum $($val:ty),+) => {$(
        impl Poisonable for $val {
            fn poisoned(typ: PoisonType) -> Self {
                Self::Poisoned(typ)
            }

            fn is_poisoned(value: &Self) -> bool {
                matches!(value, Self::Poisoned(_))
            }
        }
    )+};
}

poisonable!(struct Block, MatchArm, Variable, Diagnostic, Location, ArrayType, StructType);
poisonable!(enum Statement);
