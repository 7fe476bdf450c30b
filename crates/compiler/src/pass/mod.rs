//! Passes over a GIMPLE compilation unit, and the [`PassManager`] that runs
//! them before translation.
//!
//! A pass either analyses the unit, producing data that the translator or a
//! later pass reads, or rewrites the unit in place. Passes name the passes
//! whose results they read and those whose results they make stale, and the
//! manager derives a run order from those declarations.
//!
//! Each pass implements both [`PassOps`], through which the manager drives it,
//! and [`ConcretePass`], which ties it to the type of its result.

pub mod analysis;
pub mod data;

use std::{
    any::{Any, TypeId},
    collections::HashSet,
    fmt::Debug,
};

use downcast_rs::Downcast;
use gbr_errors::compile::{Error, Result};
use itertools::Itertools;

use crate::{
    pass::data::{ConcretePassData, DynPassDataMap, DynPassReturnData},
    source::SourceContext,
};

pub type Pass = Box<dyn PassOps>;

/// Identifies a pass, and hence the slot its result occupies.
pub type PassKey = TypeId;

/// The interface through which the manager drives a pass.
pub trait PassOps
where
    Self: Any + Debug + Downcast,
{
    /// Runs the pass over `context`.
    ///
    /// `pass_data` holds a live result for every pass in [`Self::depends`].
    ///
    /// # Errors
    ///
    /// - [`Error`] if the unit cannot be processed.
    fn run(&mut self, context: SourceContext, pass_data: &DynPassDataMap)
    -> Result<DynPassReturnData>;

    /// The passes whose results this pass reads.
    fn depends(&self) -> &[PassKey];

    /// The passes whose results are stale once this pass has run.
    fn invalidates(&self) -> &[PassKey];

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Must agree with [`ConcretePass::key`].
    fn key_dyn(&self) -> PassKey {
        self.type_id()
    }
}

impl dyn PassOps {
    pub fn is<T: ConcretePass>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// The statically known side of a pass.
pub trait ConcretePass
where
    Self: Clone + Debug + PassOps,
{
    /// What the pass produces.
    type Data: ConcretePassData;

    /// Must agree with [`PassOps::key_dyn`].
    #[must_use]
    fn key() -> PassKey {
        TypeId::of::<Self>()
    }
}

/// The outcome of running every pass.
#[derive(Debug)]
pub struct PassManagerReturnData {
    /// The unit as the last pass left it.
    pub context: SourceContext,

    /// The results that were still live when the last pass finished.
    pub data: DynPassDataMap,
}

/// Runs passes in an order that satisfies their dependencies.
#[derive(Debug)]
pub struct PassManager {
    pass_ordering: Vec<Pass>,
}

impl PassManager {
    /// Creates a manager that runs `passes`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPassOrdering`] if no valid pass ordering can be
    ///   generated from the provided `passes`.
    pub fn new(passes: Vec<Pass>) -> Result<Self> {
        let pass_ordering = Self::generate_pass_ordering(passes)?;
        Ok(Self { pass_ordering })
    }

    /// Runs every pass over `context` in turn.
    ///
    /// # Errors
    ///
    /// - [`Error`] if any pass fails.
    /// - [`Error::MissingPassData`] if a pass runs after the data it depends
    ///   on has been invalidated.
    pub fn run(&mut self, mut context: SourceContext) -> Result<PassManagerReturnData> {
        let mut pass_data_map = DynPassDataMap::new();

        for pass in &mut self.pass_ordering {
            if let Some(missing) = pass.depends().iter().find(|k| !pass_data_map.contains_key(**k))
            {
                Err(Error::MissingPassData(format!("{missing:?} for {}", pass.name())))?;
            }

            let DynPassReturnData {
                source_context,
                data,
            } = pass.run(context, &pass_data_map)?;

            for key in pass.invalidates() {
                pass_data_map.clear_key(*key);
            }
            pass_data_map.put_key(pass.key_dyn(), data);

            context = source_context;
        }

        Ok(PassManagerReturnData {
            context,
            data: pass_data_map,
        })
    }

    /// Gets the passes in the order they run.
    #[must_use]
    pub fn passes(&self) -> &[Pass] {
        &self.pass_ordering
    }

    /// Generates a valid pass ordering from `passes` wherever possible.
    ///
    /// Every pass is placed after all the passes it depends on. Passes that do
    /// not depend on each other keep the relative order in which they were
    /// provided.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPassOrdering`] if a pass depends on a pass that was
    ///   not provided, if a pass is provided twice, or if the dependencies
    ///   between passes are circular.
    pub fn generate_pass_ordering(passes: Vec<Pass>) -> Result<Vec<Pass>> {
        let keys: Vec<PassKey> = passes.iter().map(|p| p.key_dyn()).collect();
        if !keys.iter().all_unique() {
            Err(Error::InvalidPassOrdering(
                "The same pass was provided more than once".to_string(),
            ))?;
        }

        if let Some(pass) = passes
            .iter()
            .find(|p| p.depends().iter().any(|d| !keys.contains(d)))
        {
            Err(Error::InvalidPassOrdering(format!(
                "{} depends on a pass that was not provided",
                pass.name()
            )))?;
        }

        let mut placed: HashSet<PassKey> = HashSet::new();
        let mut pending = passes;
        let mut ordering = Vec::with_capacity(pending.len());

        while !pending.is_empty() {
            let ready = pending
                .iter()
                .position(|p| p.depends().iter().all(|d| placed.contains(d)));

            let Some(ready) = ready else {
                let names = pending.iter().map(|p| p.name()).join(", ");
                return Err(Error::InvalidPassOrdering(format!(
                    "Circular dependencies between {names}"
                )));
            };

            let pass = pending.remove(ready);
            placed.insert(pass.key_dyn());
            ordering.push(pass);
        }

        Ok(ordering)
    }
}

impl Default for PassManager {
    /// Runs [`analysis::unit_map::BuildUnitMap`], which translation needs.
    fn default() -> Self {
        let pass_ordering: Vec<Pass> = vec![analysis::unit_map::BuildUnitMap::new_dyn()];
        Self { pass_ordering }
    }
}

#[cfg(test)]
mod test {
    use gbr_errors::compile::{Error, Result};
    use gbr_gimple::GimpleCompilationUnit;

    use crate::{
        pass::{
            analysis::unit_map::BuildUnitMap,
            data::{ConcretePassData, DynPassDataMap, DynPassReturnData, PassDataOps},
            ConcretePass,
            Pass,
            PassKey,
            PassManager,
            PassOps,
        },
        source::SourceContext,
    };

    /// A pass that counts the functions, relying on the unit map.
    #[derive(Clone, Debug)]
    struct CountFunctions {
        depends: Vec<PassKey>,
    }

    impl CountFunctions {
        fn new_dyn() -> Pass {
            Box::new(Self {
                depends: vec![BuildUnitMap::key()],
            })
        }
    }

    #[derive(Clone, Debug)]
    struct FunctionCount(usize);

    impl PassDataOps for FunctionCount {}

    impl ConcretePassData for FunctionCount {
        type Pass = CountFunctions;
    }

    impl PassOps for CountFunctions {
        fn run(
            &mut self,
            context: SourceContext,
            pass_data: &DynPassDataMap,
        ) -> Result<DynPassReturnData> {
            let map = pass_data
                .get::<BuildUnitMap>()
                .ok_or_else(|| Error::MissingPassData("BuildUnitMap".to_string()))?;
            let count = FunctionCount(map.definitions.len());
            Ok(DynPassReturnData::new(context, Box::new(count)))
        }

        fn depends(&self) -> &[PassKey] {
            &self.depends
        }

        fn invalidates(&self) -> &[PassKey] {
            &[]
        }
    }

    impl ConcretePass for CountFunctions {
        type Data = FunctionCount;
    }

    #[test]
    fn dependencies_are_ordered_first() -> anyhow::Result<()> {
        let passes: Vec<Pass> = vec![CountFunctions::new_dyn(), BuildUnitMap::new_dyn()];
        let mut manager = PassManager::new(passes)?;
        assert!(manager.passes()[0].is::<BuildUnitMap>());
        assert!(manager.passes()[1].is::<CountFunctions>());

        let context = SourceContext::new(GimpleCompilationUnit::default());
        let result = manager.run(context)?;
        let count = result
            .data
            .get::<CountFunctions>()
            .ok_or_else(|| anyhow::anyhow!("no data"))?;
        assert_eq!(count.0, 0);

        Ok(())
    }

    #[test]
    fn missing_dependencies_are_rejected() {
        let result = PassManager::new(vec![CountFunctions::new_dyn()]);
        assert!(matches!(result, Err(Error::InvalidPassOrdering(_))));
    }

    #[test]
    fn duplicate_passes_are_rejected() {
        let passes: Vec<Pass> = vec![BuildUnitMap::new_dyn(), BuildUnitMap::new_dyn()];
        let result = PassManager::new(passes);
        assert!(matches!(result, Err(Error::InvalidPassOrdering(_))));
    }
}
