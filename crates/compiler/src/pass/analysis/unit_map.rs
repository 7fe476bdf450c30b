//! This pass is responsible for generating a map of the top-level structure of
//! a GIMPLE compilation unit. This map encompasses the callable functions,
//! the globals, and the record definitions of the unit.
//!
//! The [`UnitMap`] that results from this pass is what the translator uses to
//! resolve names that cross function boundaries.

use std::collections::HashMap;

use gbr_errors::compile::{Error, Result};
use gbr_gimple::{
    ir::{GimpleFunctionDecl, GimpleRecordDefinition},
    GimpleCompilationUnit,
    GimpleType,
};

use crate::{
    pass::{
        data::{ConcretePassData, DynPassDataMap, DynPassReturnData, PassDataOps},
        ConcretePass,
        Pass,
        PassKey,
        PassOps,
    },
    source::SourceContext,
};

/// Generates a map of the top-level structure of a compilation unit.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildUnitMap {
    depends:     Vec<PassKey>,
    invalidates: Vec<PassKey>,
}

impl Default for BuildUnitMap {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildUnitMap {
    /// Creates a new instance of the unit mapping pass.
    #[must_use]
    pub fn new() -> Self {
        Self {
            depends:     Vec::new(),
            invalidates: Vec::new(),
        }
    }

    /// Creates a new trait object of the unit mapping pass.
    #[must_use]
    pub fn new_dyn() -> Pass {
        Box::new(Self::new())
    }
}

impl BuildUnitMap {
    /// Generates a unit map for the provided compilation `unit`.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedIR`] if two globals share a name, or if a function
    ///   declaration disagrees with the definition or another declaration of
    ///   the same name.
    pub fn map_unit(&self, unit: &GimpleCompilationUnit) -> Result<UnitMap> {
        let mut unit_map = UnitMap::new();

        for function in &unit.functions {
            unit_map.definitions.push(function.name.clone());
            Self::map_function(function.declaration(), &mut unit_map)?;
        }

        for declaration in &unit.declarations {
            Self::map_function(declaration.clone(), &mut unit_map)?;
        }

        for global in &unit.globals {
            if unit_map
                .globals
                .insert(global.name.clone(), global.ty.clone())
                .is_some()
            {
                Err(Error::MalformedIR(format!(
                    "global `{}` is declared more than once",
                    global.name
                )))?;
            }
        }

        for record in &unit.records {
            unit_map.records.insert(record.name.clone(), record.clone());
        }

        Ok(unit_map)
    }

    /// Records the signature of a callable function into `unit_map`.
    ///
    /// A function may be declared any number of times, as long as every
    /// declaration agrees.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedIR`] if the signature conflicts with one already
    ///   recorded for the same name.
    pub fn map_function(declaration: GimpleFunctionDecl, unit_map: &mut UnitMap) -> Result<()> {
        match unit_map.functions.get(&declaration.name) {
            Some(existing) if existing != &declaration => Err(Error::MalformedIR(format!(
                "conflicting declarations of function `{}`",
                declaration.name
            )))?,
            Some(_) => (),
            None => {
                unit_map.functions.insert(declaration.name.clone(), declaration);
            }
        }

        Ok(())
    }
}

impl PassOps for BuildUnitMap {
    fn run(
        &mut self,
        context: SourceContext,
        _pass_data: &DynPassDataMap,
    ) -> Result<DynPassReturnData> {
        let analysis_result = context.analyze_unit(|unit| self.map_unit(unit))?;
        Ok(DynPassReturnData::new(context, Box::new(analysis_result)))
    }

    fn depends(&self) -> &[PassKey] {
        self.depends.as_slice()
    }

    fn invalidates(&self) -> &[PassKey] {
        self.invalidates.as_slice()
    }
}

impl ConcretePass for BuildUnitMap {
    type Data = UnitMap;
}

/// The unit map that results from executing this analysis pass on a
/// compilation unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UnitMap {
    /// The names of the functions defined in the unit, in the order of their
    /// definition.
    pub definitions: Vec<String>,

    /// The signature of every function that may be called from the unit,
    /// whether defined in it or only declared.
    pub functions: HashMap<String, GimpleFunctionDecl>,

    /// The types of the globals that are visible to the unit.
    pub globals: HashMap<String, GimpleType>,

    /// The record definitions that forward references are completed from.
    pub records: HashMap<String, GimpleRecordDefinition>,
}

impl UnitMap {
    /// Creates a new, empty, unit map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the signature of the function `name`, if it is known.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&GimpleFunctionDecl> {
        self.functions.get(name)
    }

    /// Gets the type of the global `name`, if it is known.
    #[must_use]
    pub fn global(&self, name: &str) -> Option<&GimpleType> {
        self.globals.get(name)
    }

    /// Gets the definition of the record `name`, if it is known.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<&GimpleRecordDefinition> {
        self.records.get(name)
    }
}

impl PassDataOps for UnitMap {}

impl ConcretePassData for UnitMap {
    type Pass = BuildUnitMap;
}

#[cfg(test)]
mod test {
    use gbr_errors::compile::Error;
    use gbr_gimple::{
        ir::{GimpleFunctionDecl, GimpleVarDecl},
        GimpleCompilationUnit,
        GimpleType,
    };

    use crate::pass::analysis::unit_map::BuildUnitMap;

    #[test]
    fn maps_declarations_and_globals() -> anyhow::Result<()> {
        let unit = GimpleCompilationUnit {
            globals: vec![GimpleVarDecl::new("counter", GimpleType::int(64))],
            declarations: vec![GimpleFunctionDecl {
                name:            "puts".to_string(),
                parameter_types: vec![GimpleType::make_pointer(GimpleType::int(32))],
                return_type:     Some(GimpleType::int(32)),
            }],
            ..GimpleCompilationUnit::default()
        };
        let map = BuildUnitMap::new().map_unit(&unit)?;

        assert_eq!(map.global("counter"), Some(&GimpleType::int(64)));
        assert_eq!(
            map.function("puts").map(|f| f.parameter_types.len()),
            Some(1)
        );
        assert!(map.definitions.is_empty());

        Ok(())
    }

    #[test]
    fn conflicting_declarations_are_malformed() {
        let decl = |ret| GimpleFunctionDecl {
            name:            "f".to_string(),
            parameter_types: Vec::new(),
            return_type:     Some(GimpleType::int(ret)),
        };
        let unit = GimpleCompilationUnit {
            declarations: vec![decl(32), decl(64)],
            ..GimpleCompilationUnit::default()
        };

        let result = BuildUnitMap::new().map_unit(&unit);
        assert!(matches!(result, Err(Error::MalformedIR(_))));
    }
}
