//! The results that passes compute about a compilation unit.
//!
//! Results are stored type-erased, keyed by the pass that produced them, and
//! are recovered as concrete types through the pass that owns them.

use std::{any::Any, collections::HashMap, fmt::Debug};

use derivative::Derivative;
use downcast_rs::Downcast;

use crate::{
    pass::{ConcretePass, PassKey},
    source::SourceContext,
};

/// A type-erased pass result.
pub type PassData = Box<dyn PassDataOps>;

/// Marks a type as something a pass can produce.
///
/// Results are shared with the translator, which may read them from several
/// threads at once.
pub trait PassDataOps
where
    Self: Any + Debug + Downcast + Send + Sync,
{
}

impl dyn PassDataOps {
    /// Recovers the result as `T`, if that is what it is.
    pub fn view_as<T: ConcretePassData>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Ties a result type to the one pass that produces it.
pub trait ConcretePassData
where
    Self: Clone + Debug + PassDataOps,
{
    type Pass: ConcretePass;
}

pub type DynPassReturnData = PassReturnData<PassData>;

/// What a single pass hands back to the pass manager.
#[derive(Derivative)]
#[derivative(Debug(bound = "T: Debug"))]
pub struct PassReturnData<T> {
    /// The context to give to the next pass.
    pub source_context: SourceContext,

    pub data: T,
}

impl<T> PassReturnData<T> {
    pub fn new(source_context: SourceContext, data: T) -> Self {
        Self {
            source_context,
            data,
        }
    }
}

pub type DynPassDataMap = PassDataMap<PassData>;

/// The live results of the passes that have run so far.
///
/// A pass has an entry once it has run, and loses it when a later pass
/// invalidates it.
#[derive(Derivative)]
#[derivative(
    Clone(bound = "T: Clone"),
    Debug(bound = "T: Debug"),
    PartialEq(bound = "T: PartialEq"),
    Default(bound = "")
)]
pub struct PassDataMap<T> {
    results: HashMap<PassKey, T>,
}

impl<T> PassDataMap<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains_key(&self, key: PassKey) -> bool {
        self.results.contains_key(&key)
    }

    /// Stores `data` as the result of the pass `key`, replacing any earlier
    /// result.
    pub fn put_key(&mut self, key: PassKey, data: T) {
        self.results.insert(key, data);
    }

    pub fn clear_key(&mut self, key: PassKey) {
        self.results.remove(&key);
    }
}

impl PassDataMap<PassData> {
    /// Gets the live result of the pass `P`.
    #[must_use]
    pub fn get<P: ConcretePass>(&self) -> Option<&P::Data> {
        self.results.get(&P::key())?.view_as::<P::Data>()
    }
}
