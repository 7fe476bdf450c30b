//! The translation of a single GIMPLE function into a FLO object.
//!
//! Translation is driven by a worklist of basic blocks, starting from the
//! entry block. A block is scheduled the first time anything branches to it,
//! at which point the ID of its runtime block is reserved. Blocks that nothing
//! reaches are never translated.
//!
//! Any failure is fatal to the function, and is reported along with the
//! statement that caused it.

mod expr;
mod statement;

use std::collections::{HashMap, VecDeque};

use gbr_errors::compile::{Error, Result, StatementLocation, TranslationFailure};
use gbr_flo::{
    types::{
        AssignConstStatement,
        AssignStatement,
        Block,
        BlockExit,
        BlockId,
        BlockRef,
        CallStatement,
        ConstantValue,
        LocationId,
        Signature,
        Statement,
        StatementId,
        Type,
        VariableId,
        VariableLinkage,
    },
    FlatLoweredObject,
};
use gbr_gimple::{
    ir::{BlockIndex, GimpleExpr, GimpleFunction, GimpleOp, GimpleStatement, EXIT_BLOCK},
    parse::validate_function,
    GimpleType,
};
use tracing::trace;

use crate::{
    constant::{MISSING_RETURN_MESSAGE, RETURN_SLOT_NAME},
    context::TranslationContext,
    translate::{
        check,
        data::CodegenData,
        types::{TypeTranslator, VarUsage},
        variable::Var,
    },
};

/// The translator for a single function.
#[derive(Debug)]
pub struct FunctionTranslator<'a> {
    /// The context shared with the other functions of the unit.
    ctx: &'a TranslationContext,

    /// The function being translated.
    function: &'a GimpleFunction,

    /// The object being built.
    data: CodegenData,

    /// The variables visible to the function by name.
    scope: HashMap<String, Var>,

    /// The runtime variables of the parameters, in order.
    params: Vec<VariableId>,

    /// The variable holding the return value, if the function is not `void`.
    return_slot: Option<VariableId>,

    /// The runtime block for each GIMPLE block that has been scheduled.
    blocks: HashMap<BlockIndex, BlockId>,

    /// The runtime block that stands in for GCC's exit block, once used.
    exit_block: Option<BlockId>,

    /// The blocks that have been scheduled but not yet translated.
    worklist: VecDeque<(BlockIndex, BlockId)>,

    /// The statements emitted so far for the block being translated.
    body: Vec<StatementId>,

    /// The source line of the statement being translated.
    line: Option<u32>,

    /// Whether any path through the function can panic.
    can_panic: bool,
}

impl<'a> FunctionTranslator<'a> {
    /// Creates a translator for `function` in the provided context, whose
    /// locations refer to the `source` file.
    #[must_use]
    pub fn new(ctx: &'a TranslationContext, function: &'a GimpleFunction, source: &str) -> Self {
        Self {
            ctx,
            function,
            data: CodegenData::new(&function.name, source),
            scope: HashMap::new(),
            params: Vec::new(),
            return_slot: None,
            blocks: HashMap::new(),
            exit_block: None,
            worklist: VecDeque::new(),
            body: Vec::new(),
            line: None,
            can_panic: false,
        }
    }

    /// Translates the function into a FLO object of its own.
    ///
    /// The types in the returned object are left empty, as they are shared
    /// with the other functions of the unit and only complete once every
    /// function has been translated.
    ///
    /// # Errors
    ///
    /// - [`TranslationFailure`] if the function cannot be translated, carrying
    ///   the statement at fault where there is one.
    pub fn translate(mut self) -> std::result::Result<FlatLoweredObject, TranslationFailure> {
        let entry = self
            .prepare()
            .map_err(|error| TranslationFailure::new(&self.function.name, error))?;

        while let Some((index, id)) = self.worklist.pop_front() {
            let block = self.translate_block(index)?;
            self.data.fill_block(id, &block);
        }

        self.finish(entry);
        trace!(
            function = %self.function.name,
            blocks = self.data.flo().blocks.len(),
            statements = self.data.flo().statements.len(),
            "translated function"
        );

        Ok(self.data.into())
    }

    /// Gets the variable visible to the function as `name`, if one has been
    /// declared.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Var> {
        self.scope.get(name)
    }

    /// Declares the variables of the function and schedules its entry block.
    pub(crate) fn prepare(&mut self) -> Result<BlockId> {
        validate_function(self.function)?;
        self.declare_variables()?;
        self.block_ref(self.function.entry_block)
    }

    /// Attaches the signature to the `entry` block, and exports the function
    /// by name.
    fn finish(&mut self, entry: BlockId) {
        let function = self.function;
        let first_line = function
            .block(function.entry_block)
            .and_then(|b| b.statements.first())
            .and_then(GimpleStatement::line);

        let mut block = self.data.flo().blocks.get(entry);
        block.signature = Some(Signature {
            params:    self.params.clone(),
            returns:   self.returns(),
            can_panic: self.can_panic,
            location:  self.data.location(first_line),
        });
        self.data.fill_block(entry, &block);
        self.data
            .flo_mut()
            .symbols
            .code
            .insert(function.name.clone(), entry);
    }

    /// Translates the basic block with the provided `index`.
    fn translate_block(&mut self, index: BlockIndex) -> std::result::Result<Block, TranslationFailure> {
        let function = self.function;
        let fail = |error: Error, statement: usize, line: Option<u32>| {
            TranslationFailure::new(&function.name, error).at(StatementLocation {
                block: index,
                statement,
                line,
            })
        };

        let Some(block) = function.block(index) else {
            let error =
                Error::CompilationFailure(format!("block {index} was scheduled but does not exist"));
            return Err(fail(error, 0, None));
        };

        self.body.clear();
        let count = block.statements.len();
        let mut exit = None;
        for (position, statement) in block.statements.iter().enumerate() {
            self.line = statement.line();
            let result = if statement.is_terminator() && position + 1 != count {
                Err(Error::MalformedIR(format!(
                    "the {} statement is not the last statement of block {index}",
                    statement.kind_name()
                )))
            } else {
                self.translate_statement(statement)
            };

            exit = result.map_err(|error| fail(error, position, statement.line()))?;
        }

        let exit = match exit {
            Some(exit) => exit,
            None => self
                .fall_through(index)
                .map_err(|error| fail(error, count, self.line))?,
        };

        Ok(Block {
            statements: std::mem::take(&mut self.body),
            exit,
            ..Block::default()
        })
    }

    /// Builds the exit of a block that ends without a terminator.
    ///
    /// Control falls through to the next block in declaration order. Falling
    /// off the end of the last block returns from a `void` function, and
    /// panics in any other.
    fn fall_through(&mut self, index: BlockIndex) -> Result<BlockExit> {
        let function = self.function;
        match function.block_after(index) {
            Some(next) => Ok(BlockExit::Goto(self.block_ref(next.index)?)),
            None if function.return_type.is_none() => Ok(BlockExit::Return(Vec::new())),
            None => {
                self.can_panic = true;
                Ok(BlockExit::Panic(
                    MISSING_RETURN_MESSAGE.to_string(),
                    Vec::new(),
                ))
            }
        }
    }

    /// Gets the runtime block for the GIMPLE block `label`, scheduling it for
    /// translation if this is the first reference to it.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedIR`] if the function has no block `label`.
    fn block_ref(&mut self, label: BlockIndex) -> Result<BlockId> {
        if label == EXIT_BLOCK {
            return Ok(self.exit_block());
        }
        if let Some(id) = self.blocks.get(&label) {
            return Ok(*id);
        }
        if self.function.block(label).is_none() {
            Err(Error::MalformedIR(format!(
                "branch to block {label}, which does not exist in `{}`",
                self.function.name
            )))?;
        }

        let id = self.data.reserve_block();
        self.blocks.insert(label, id);
        self.worklist.push_back((label, id));

        Ok(id)
    }

    /// Gets the block that stands in for GCC's exit block, which returns the
    /// current value of the return slot.
    fn exit_block(&mut self) -> BlockId {
        if let Some(id) = self.exit_block {
            return id;
        }

        let block = Block {
            exit: BlockExit::Return(self.returns()),
            ..Block::default()
        };
        let id = self.data.add_block(&block);
        self.exit_block = Some(id);

        id
    }

    /// Gets the variables returned from the function.
    fn returns(&self) -> Vec<VariableId> {
        self.return_slot.into_iter().collect()
    }

    /// Creates the parameters, the return slot, and the locals.
    fn declare_variables(&mut self) -> Result<()> {
        let function = self.function;
        for param in &function.parameters {
            let id = self.declare(&param.name, &param.ty, VarUsage::Parameter)?;
            self.params.push(id);
        }

        if let Some(ty) = &function.return_type {
            let slot = self.create(RETURN_SLOT_NAME, ty, VarUsage::ReturnSlot)?;
            self.return_slot = Some(slot.id);
        }

        for local in &function.variables {
            self.declare(&local.name, &local.ty, VarUsage::Local)?;
        }

        Ok(())
    }

    /// Creates a variable, without bringing it into scope.
    fn create(&mut self, name: &str, ty: &GimpleType, usage: VarUsage) -> Result<Var> {
        let translator = TypeTranslator::for_type(self.ctx, ty)?;
        let location = self.location();
        Ok(translator.create_variable(&mut self.data, name, ty, usage, location))
    }

    /// Creates a variable and brings it into scope as `name`.
    fn declare(&mut self, name: &str, ty: &GimpleType, usage: VarUsage) -> Result<VariableId> {
        if self.scope.contains_key(name) {
            Err(Error::MalformedIR(format!(
                "`{name}` is declared more than once in `{}`",
                self.function.name
            )))?;
        }

        let var = self.create(name, ty, usage)?;
        let id = var.id;
        self.scope.insert(name.to_string(), var);

        Ok(id)
    }

    /// Gets the variable `name` referred to by `expr` with type `ty`.
    ///
    /// Globals of the unit are brought into scope on their first use.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedIR`] if there is no variable `name`.
    /// - [`Error::TypeMismatch`] if the variable is declared with another type.
    fn lookup(&mut self, name: &str, ty: &GimpleType, expr: &GimpleExpr) -> Result<Var> {
        if !self.scope.contains_key(name) {
            let Some(global) = self.ctx.unit_map().global(name).cloned() else {
                return Err(Error::MalformedIR(format!(
                    "`{name}` is used in `{}` but never declared",
                    self.function.name
                )));
            };
            self.declare(name, &global, VarUsage::Global)?;
        }

        let var = self.scope.get(name).cloned().ok_or_else(|| {
            Error::CompilationFailure(format!("`{name}` vanished from scope"))
        })?;
        check::same_type(expr, ty, &var.name, &var.ty)?;

        Ok(var)
    }

    /// Gets the runtime type of values of GIMPLE type `ty`.
    fn value_type(&self, ty: &GimpleType) -> Result<Type> {
        Ok(TypeTranslator::for_type(self.ctx, ty)?.value_type())
    }

    /// Gets the location of the statement being translated.
    fn location(&mut self) -> Option<LocationId> {
        self.data.location(self.line)
    }

    /// Appends `statement` to the block being translated.
    fn emit(&mut self, statement: &Statement) {
        let id = self.data.add_statement(statement);
        self.body.push(id);
    }

    /// Creates an anonymous variable of type `typ`.
    fn temporary(&mut self, typ: Type) -> VariableId {
        let location = self.location();
        self.data
            .add_variable(typ, VariableLinkage::Local, None, location)
    }

    /// Emits a temporary holding the constant `value`.
    fn constant(&mut self, value: ConstantValue) -> VariableId {
        let variable = self.temporary(value.typ.clone());
        let location = self.location();
        self.emit(&Statement::AssignConst(AssignConstStatement {
            variable,
            value,
            diagnostics: Vec::new(),
            location,
        }));

        variable
    }

    /// Emits `target = source`.
    fn assign(&mut self, target: VariableId, source: VariableId) {
        let location = self.location();
        self.emit(&Statement::Assign(AssignStatement {
            target,
            source,
            diagnostics: Vec::new(),
            location,
        }));
    }

    /// Emits a call to `block`.
    fn call(&mut self, block: BlockRef, input: Vec<VariableId>, outputs: Vec<VariableId>) {
        let location = self.location();
        self.emit(&Statement::Call(CallStatement {
            block,
            input,
            outputs,
            diagnostics: Vec::new(),
            location,
        }));
    }

    /// Emits a call to the runtime library's implementation of `op` on the
    /// provided `input`, whose runtime types are `operand_types`.
    ///
    /// The result is written to `output` if provided, and to a new temporary
    /// otherwise. Returns the variable holding the result.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsupportedConstruct`] if the runtime library does not
    ///   implement `op` for the provided types.
    fn call_builtin(
        &mut self,
        op: GimpleOp,
        input: Vec<VariableId>,
        operand_types: &[Type],
        result: &Type,
        output: Option<VariableId>,
    ) -> Result<VariableId> {
        let Some(polyfill) = self
            .ctx
            .polyfills()
            .for_operation(op, operand_types, result)
            .cloned()
        else {
            return Err(Error::UnsupportedConstruct(format!(
                "`{op}` on operands of type {operand_types:?}"
            )));
        };

        let output = output.unwrap_or_else(|| self.temporary(result.clone()));
        self.call(BlockRef::Builtin(polyfill), input, vec![output]);

        Ok(output)
    }
}

#[cfg(test)]
mod test {
    use gbr_errors::compile::Error;
    use gbr_flo::types::{Block, BlockExit, Type};
    use gbr_gimple::{
        ir::{
            GimpleAssign,
            GimpleBasicBlock,
            GimpleConditional,
            GimpleExpr,
            GimpleFunction,
            GimpleGoto,
            GimpleOp,
            GimpleReturn,
            GimpleStatement,
            GimpleVarDecl,
            EXIT_BLOCK,
        },
        GimpleType,
    };

    use crate::{
        context::TranslationContext,
        translate::{function::FunctionTranslator, variable::VarKind},
    };

    fn int() -> GimpleType {
        GimpleType::int(32)
    }

    fn block(index: u32, statements: Vec<GimpleStatement>) -> GimpleBasicBlock {
        GimpleBasicBlock { index, statements }
    }

    fn goto(target: u32) -> GimpleStatement {
        GimpleStatement::Goto(GimpleGoto { target, line: None })
    }

    fn ret(value: Option<GimpleExpr>) -> GimpleStatement {
        GimpleStatement::Return(GimpleReturn { value, line: None })
    }

    fn function(
        return_type: Option<GimpleType>,
        parameters: Vec<GimpleVarDecl>,
        blocks: Vec<GimpleBasicBlock>,
    ) -> GimpleFunction {
        GimpleFunction {
            name: "f".to_string(),
            parameters,
            return_type,
            entry_block: 2,
            variables: Vec::new(),
            blocks,
        }
    }

    fn blocks_of(flo: &gbr_flo::FlatLoweredObject) -> Vec<Block> {
        flo.blocks.iter().map(|(_, b)| b.clone()).collect()
    }

    #[test]
    fn diamond_translates_to_four_blocks() -> anyhow::Result<()> {
        let x = GimpleExpr::var("x", int());
        let f = function(
            Some(int()),
            vec![GimpleVarDecl::new("x", int())],
            vec![
                block(2, vec![GimpleStatement::Conditional(GimpleConditional {
                    operator:    GimpleOp::Gt,
                    operands:    vec![x.clone(), GimpleExpr::int(0, int())],
                    true_label:  3,
                    false_label: 4,
                    line:        Some(2),
                })]),
                block(3, vec![goto(5)]),
                block(4, vec![goto(5)]),
                block(5, vec![ret(Some(x))]),
            ],
        );
        let ctx = TranslationContext::default();
        let flo = FunctionTranslator::new(&ctx, &f, "f.c").translate()?;

        let blocks = blocks_of(&flo);
        assert_eq!(blocks.len(), 4);
        assert!(matches!(&blocks[0].exit, BlockExit::Match(arms) if arms.len() == 2));
        assert!(blocks[0].signature.is_some());
        assert!(matches!(&blocks[3].exit, BlockExit::Return(values) if values.len() == 1));

        Ok(())
    }

    #[test]
    fn unreachable_blocks_are_not_translated() -> anyhow::Result<()> {
        let f = function(None, Vec::new(), vec![
            block(2, vec![goto(EXIT_BLOCK)]),
            block(3, vec![GimpleStatement::Assign(GimpleAssign {
                operator: GimpleOp::Nop,
                lhs:      GimpleExpr::var("nowhere", int()),
                operands: vec![GimpleExpr::int(1, int())],
                line:     None,
            })]),
        ]);
        let ctx = TranslationContext::default();
        let flo = FunctionTranslator::new(&ctx, &f, "f.c").translate()?;

        // The entry block, and the block standing in for the exit.
        assert_eq!(flo.blocks.len(), 2);
        assert!(flo.symbols.code.contains_left("f"));

        Ok(())
    }

    #[test]
    fn falling_off_a_non_void_function_panics() -> anyhow::Result<()> {
        let f = function(Some(int()), Vec::new(), vec![block(2, Vec::new())]);
        let ctx = TranslationContext::default();
        let flo = FunctionTranslator::new(&ctx, &f, "f.c").translate()?;

        let entry = &blocks_of(&flo)[0];
        assert!(matches!(&entry.exit, BlockExit::Panic(..)));
        assert!(entry.signature.as_ref().is_some_and(|s| s.can_panic));

        Ok(())
    }

    #[test]
    fn falling_through_continues_to_the_next_block() -> anyhow::Result<()> {
        let f = function(None, Vec::new(), vec![
            block(2, Vec::new()),
            block(3, vec![ret(None)]),
        ]);
        let ctx = TranslationContext::default();
        let flo = FunctionTranslator::new(&ctx, &f, "f.c").translate()?;

        let blocks = blocks_of(&flo);
        assert!(matches!(blocks[0].exit, BlockExit::Goto(_)));
        assert!(matches!(&blocks[1].exit, BlockExit::Return(values) if values.is_empty()));

        Ok(())
    }

    #[test]
    fn branches_to_missing_blocks_are_malformed() {
        let f = function(None, Vec::new(), vec![block(2, vec![goto(9)])]);
        let ctx = TranslationContext::default();
        let failure = FunctionTranslator::new(&ctx, &f, "f.c").translate();

        assert!(matches!(
            failure,
            Err(ref failure) if matches!(failure.error, Error::MalformedIR(_))
                && failure.location.is_some_and(|l| l.block == 2 && l.statement == 0)
        ));
    }

    #[test]
    fn terminators_must_end_their_block() {
        let f = function(None, Vec::new(), vec![
            block(2, vec![goto(3), ret(None)]),
            block(3, vec![ret(None)]),
        ]);
        let ctx = TranslationContext::default();
        let result = FunctionTranslator::new(&ctx, &f, "f.c").translate();

        assert!(matches!(result, Err(failure) if matches!(failure.error, Error::MalformedIR(_))));
    }

    #[test]
    fn pointer_parameters_are_handles() -> anyhow::Result<()> {
        let record = GimpleType::make_record("point", &[
            gbr_gimple::types::GimpleField::new("x", int()),
        ]);
        let f = function(
            None,
            vec![GimpleVarDecl::new("p", GimpleType::make_pointer(record))],
            vec![block(2, vec![ret(None)])],
        );
        let ctx = TranslationContext::default();
        let mut translator = FunctionTranslator::new(&ctx, &f, "f.c");
        translator.prepare()?;

        let p = translator.variable("p").ok_or_else(|| anyhow::anyhow!("p is undeclared"))?;
        assert!(matches!(p.kind, VarKind::Handle { nullable: true, .. }));
        assert!(matches!(p.typ, Type::Handle(_)));

        Ok(())
    }
}
