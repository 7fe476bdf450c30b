//! The translation of each kind of GIMPLE statement.

use gbr_errors::compile::{Error, Result};
use gbr_flo::types::{BlockExit, BlockRef, ConstantValue, Type, VariableId};
use gbr_gimple::ir::{
    GimpleAssign,
    GimpleCall,
    GimpleCase,
    GimpleConditional,
    GimpleOp,
    GimpleReturn,
    GimpleStatement,
    GimpleSwitch,
    OpClass,
};

use super::{
    expr::{fits, int_constant, reject_null_reference},
    FunctionTranslator,
};
use crate::translate::check;

impl FunctionTranslator<'_> {
    /// Translates a single `statement`, returning the exit of its block if it
    /// is a terminator.
    pub(super) fn translate_statement(
        &mut self,
        statement: &GimpleStatement,
    ) -> Result<Option<BlockExit>> {
        match statement {
            GimpleStatement::Assign(assign) => self.translate_assign(assign).map(|()| None),
            GimpleStatement::Call(call) => self.translate_call(call).map(|()| None),
            GimpleStatement::Conditional(conditional) => {
                self.translate_conditional(conditional).map(Some)
            }
            GimpleStatement::Return(ret) => self.translate_return(ret).map(Some),
            GimpleStatement::Goto(goto) => Ok(Some(BlockExit::Goto(self.block_ref(goto.target)?))),
            GimpleStatement::Switch(switch) => self.translate_switch(switch).map(Some),
        }
    }

    /// Translates `lhs = operator(operands...)`.
    ///
    /// Copies become plain assignments, and every other operation becomes a
    /// call to the runtime library.
    fn translate_assign(&mut self, assign: &GimpleAssign) -> Result<()> {
        let GimpleAssign {
            operator,
            lhs,
            operands,
            ..
        } = assign;

        if operator.class() == OpClass::PointerArithmetic {
            Err(Error::UnsupportedConstruct(format!(
                "pointer arithmetic `{}` in the assignment to `{lhs}`",
                operator.name()
            )))?;
        }
        if operands.len() != operator.arity() {
            Err(Error::MalformedIR(format!(
                "`{operator}` expects {} operands but was given {}",
                operator.arity(),
                operands.len()
            )))?;
        }
        for operand in operands {
            reject_null_reference(lhs.ty(), operand)?;
        }
        check::check_operation(*operator, lhs, operands)?;

        if operator.class() == OpClass::Copy {
            let value = self.read(&operands[0])?;
            return self.write(lhs, value);
        }

        let operand_types = operands
            .iter()
            .map(|o| self.value_type(o.ty()))
            .collect::<Result<Vec<_>>>()?;
        let result_type = self.value_type(lhs.ty())?;
        if self
            .ctx
            .polyfills()
            .for_operation(*operator, &operand_types, &result_type)
            .is_none()
        {
            Err(Error::UnsupportedConstruct(format!(
                "`{operator}` on operands of type {}",
                operands.iter().map(|o| o.ty().to_string()).collect::<Vec<_>>().join(", ")
            )))?;
        }

        let inputs = operands
            .iter()
            .map(|o| self.read(o))
            .collect::<Result<Vec<_>>>()?;
        let destination = self.destination(lhs)?;
        let output = self.call_builtin(
            *operator,
            inputs,
            &operand_types,
            &result_type,
            destination,
        )?;

        if destination.is_none() {
            self.write(lhs, output)?;
        }

        Ok(())
    }

    /// Translates a call to another function, which is always linked by name.
    fn translate_call(&mut self, call: &GimpleCall) -> Result<()> {
        let Some(callee) = self.ctx.unit_map().function(&call.function).cloned() else {
            return Err(Error::MalformedIR(format!(
                "call to `{}`, which is never declared",
                call.function
            )));
        };

        if call.arguments.len() != callee.parameter_types.len() {
            Err(Error::ArityMismatch {
                callee:   callee.name.clone(),
                expected: callee.parameter_types.len(),
                actual:   call.arguments.len(),
            })?;
        }
        for (position, (argument, parameter)) in
            call.arguments.iter().zip(&callee.parameter_types).enumerate()
        {
            reject_null_reference(parameter, argument)?;
            let name = format!("parameter {position} of `{}`", callee.name);
            check::same_type(argument, argument.ty(), &name, parameter)?;
        }
        match (&callee.return_type, &call.lhs) {
            (None, Some(lhs)) => Err(Error::MalformedIR(format!(
                "the result of the void function `{}` is assigned to `{lhs}`",
                callee.name
            )))?,
            (Some(return_type), Some(lhs)) => {
                let name = format!("the result of `{}`", callee.name);
                check::same_type(lhs, lhs.ty(), &name, return_type)?;
            }
            _ => (),
        }

        let inputs = call
            .arguments
            .iter()
            .map(|a| self.read(a))
            .collect::<Result<Vec<_>>>()?;
        let block = BlockRef::External(callee.name.clone());

        match (&callee.return_type, &call.lhs) {
            (Some(_), Some(lhs)) => {
                if let Some(destination) = self.destination(lhs)? {
                    self.call(block, inputs, vec![destination]);
                } else {
                    let output = self.temporary(self.value_type(lhs.ty())?);
                    self.call(block, inputs, vec![output]);
                    self.write(lhs, output)?;
                }
            }
            (Some(return_type), None) => {
                let discarded = self.temporary(self.value_type(return_type)?);
                self.call(block, inputs, vec![discarded]);
            }
            _ => self.call(block, inputs, Vec::new()),
        }

        Ok(())
    }

    /// Translates a two-way branch on the comparison `operator(operands...)`.
    fn translate_conditional(&mut self, conditional: &GimpleConditional) -> Result<BlockExit> {
        let GimpleConditional {
            operator,
            operands,
            true_label,
            false_label,
            ..
        } = conditional;

        if operator.class() != OpClass::Comparison {
            Err(Error::MalformedIR(format!(
                "`{operator}` cannot be used as the condition of a branch"
            )))?;
        }
        let [left, right] = operands.as_slice() else {
            return Err(Error::MalformedIR(format!(
                "the condition `{operator}` expects 2 operands but was given {}",
                operands.len()
            )));
        };
        check::same_type(left, left.ty(), right, right.ty())?;
        let operand_type = self.value_type(left.ty())?;

        let true_target = self.block_ref(*true_label)?;
        let false_target = self.block_ref(*false_label)?;

        let inputs = vec![self.read(left)?, self.read(right)?];
        let condition = self.call_builtin(
            *operator,
            inputs,
            &[operand_type.clone(), operand_type],
            &Type::Bool,
            None,
        )?;
        let otherwise = self.constant(ConstantValue::bool(true));

        let location = self.location();
        let arms = vec![
            self.data.add_match_arm(condition, true_target, location),
            self.data.add_match_arm(otherwise, false_target, location),
        ];

        Ok(BlockExit::Match(arms))
    }

    /// Translates a multi-way branch on an integer.
    ///
    /// Each case becomes an arm testing the selector, in order, followed by an
    /// arm for the default that always matches.
    fn translate_switch(&mut self, switch: &GimpleSwitch) -> Result<BlockExit> {
        let selector_type = switch.value.ty();
        if !selector_type.is_integral() {
            Err(Error::MalformedSwitch(format!(
                "the selector `{}` has the non-integer type {selector_type}",
                switch.value
            )))?;
        }
        let typ = self.value_type(selector_type)?;
        validate_switch(switch, &typ)?;

        let targets = switch
            .cases
            .iter()
            .map(|case| self.block_ref(case.block))
            .collect::<Result<Vec<_>>>()?;
        let default = self.block_ref(switch.default_label)?;

        let selector = self.read(&switch.value)?;
        let mut arms = Vec::with_capacity(switch.cases.len() + 1);
        for (case, target) in switch.cases.iter().zip(targets) {
            let condition = self.case_condition(selector, &typ, case)?;
            let location = self.location();
            arms.push(self.data.add_match_arm(condition, target, location));
        }

        let otherwise = self.constant(ConstantValue::bool(true));
        let location = self.location();
        arms.push(self.data.add_match_arm(otherwise, default, location));

        Ok(BlockExit::Match(arms))
    }

    /// Emits the test of whether `selector`, of runtime type `typ`, matches the
    /// provided `case`.
    fn case_condition(
        &mut self,
        selector: VariableId,
        typ: &Type,
        case: &GimpleCase,
    ) -> Result<VariableId> {
        let operands = [typ.clone(), typ.clone()];
        let low = self.constant(int_constant(typ, case.low)?);

        if case.high() == case.low {
            return self.call_builtin(GimpleOp::Eq, vec![selector, low], &operands, &Type::Bool, None);
        }

        let high = self.constant(int_constant(typ, case.high())?);
        let above = self.call_builtin(GimpleOp::Ge, vec![selector, low], &operands, &Type::Bool, None)?;
        let below = self.call_builtin(GimpleOp::Le, vec![selector, high], &operands, &Type::Bool, None)?;

        self.call_builtin(
            GimpleOp::TruthAnd,
            vec![above, below],
            &[Type::Bool, Type::Bool],
            &Type::Bool,
            None,
        )
    }

    /// Translates a return, storing the value into the return slot.
    fn translate_return(&mut self, ret: &GimpleReturn) -> Result<BlockExit> {
        let function = self.function;
        match (&function.return_type, &ret.value) {
            (None, None) => Ok(BlockExit::Return(Vec::new())),
            (None, Some(value)) => Err(Error::MalformedIR(format!(
                "`{value}` is returned from the void function `{}`",
                function.name
            ))),
            (Some(_), None) => Err(Error::MalformedIR(format!(
                "the non-void function `{}` returns without a value",
                function.name
            ))),
            (Some(return_type), Some(value)) => {
                reject_null_reference(return_type, value)?;
                let name = format!("the result of `{}`", function.name);
                check::same_type(value, value.ty(), &name, return_type)?;

                let source = self.read(value)?;
                let slot = self.return_slot.ok_or_else(|| {
                    Error::CompilationFailure(format!("`{}` has no return slot", function.name))
                })?;
                self.assign(slot, source);

                Ok(BlockExit::Return(vec![slot]))
            }
        }
    }
}

/// Renders `case` as it would be written in C.
fn describe(case: &GimpleCase) -> String {
    match case.high {
        Some(high) if high != case.low => format!("{} ... {high}", case.low),
        _ => case.low.to_string(),
    }
}

/// Checks that every case of `switch` is a non-empty range of values of the
/// selector's runtime type `typ`, and that no two cases overlap.
///
/// # Errors
///
/// - [`Error::MalformedSwitch`] if the cases are invalid.
fn validate_switch(switch: &GimpleSwitch, typ: &Type) -> Result<()> {
    for (position, case) in switch.cases.iter().enumerate() {
        if !fits(typ, case.low) || !fits(typ, case.high()) {
            Err(Error::MalformedSwitch(format!(
                "the case {} is out of the range of the selector `{}`",
                describe(case),
                switch.value
            )))?;
        }

        if case.high() < case.low {
            Err(Error::MalformedSwitch(format!(
                "the case range {} ... {} is empty",
                case.low,
                case.high()
            )))?;
        }

        if let Some(earlier) = switch.cases[..position].iter().find(|c| c.overlaps(case)) {
            let message = if earlier.high.is_none() && case.high.is_none() {
                format!("duplicate case value {}", case.low)
            } else {
                format!(
                    "case {} overlaps case {}",
                    describe(case),
                    describe(earlier)
                )
            };
            Err(Error::MalformedSwitch(message))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use gbr_errors::compile::Error;
    use gbr_flo::types::{BlockExit, BlockRef, Statement};
    use gbr_gimple::{
        ir::{
            GimpleAssign,
            GimpleBasicBlock,
            GimpleCall,
            GimpleCase,
            GimpleExpr,
            GimpleFunction,
            GimpleFunctionDecl,
            GimpleOp,
            GimpleReturn,
            GimpleStatement,
            GimpleSwitch,
            GimpleVarDecl,
        },
        GimpleType,
    };

    use crate::{
        context::TranslationContext,
        pass::analysis::unit_map::UnitMap,
        polyfill::PolyfillMap,
        translate::function::FunctionTranslator,
    };

    fn int() -> GimpleType {
        GimpleType::int(32)
    }

    fn ret(value: Option<GimpleExpr>) -> GimpleStatement {
        GimpleStatement::Return(GimpleReturn { value, line: None })
    }

    fn function(
        return_type: Option<GimpleType>,
        parameters: Vec<GimpleVarDecl>,
        variables: Vec<GimpleVarDecl>,
        blocks: Vec<(u32, Vec<GimpleStatement>)>,
    ) -> GimpleFunction {
        GimpleFunction {
            name: "f".to_string(),
            parameters,
            return_type,
            entry_block: 2,
            variables,
            blocks: blocks
                .into_iter()
                .map(|(index, statements)| GimpleBasicBlock { index, statements })
                .collect(),
        }
    }

    fn switch(cases: Vec<GimpleCase>) -> GimpleFunction {
        function(
            None,
            vec![GimpleVarDecl::new("x", int())],
            Vec::new(),
            vec![
                (2, vec![GimpleStatement::Switch(GimpleSwitch {
                    value: GimpleExpr::var("x", int()),
                    cases,
                    default_label: 5,
                    line: Some(4),
                })]),
                (3, vec![ret(None)]),
                (4, vec![ret(None)]),
                (5, vec![ret(None)]),
            ],
        )
    }

    #[test]
    fn duplicate_cases_emit_nothing() -> anyhow::Result<()> {
        let f = switch(vec![
            GimpleCase::single(1, 3),
            GimpleCase::single(2, 4),
            GimpleCase::single(2, 3),
        ]);
        let ctx = TranslationContext::default();
        let mut translator = FunctionTranslator::new(&ctx, &f, "f.c");
        translator.prepare()?;

        let GimpleStatement::Switch(statement) = &f.blocks[0].statements[0] else {
            anyhow::bail!("the entry block does not start with a switch");
        };
        let result = translator.translate_switch(statement);

        assert!(matches!(result, Err(Error::MalformedSwitch(_))));
        assert!(translator.body.is_empty());
        assert!(translator.data.flo().statements.is_empty());
        assert!(translator.data.flo().match_arms.is_empty());

        Ok(())
    }

    #[test]
    fn empty_ranges_are_malformed() {
        let f = switch(vec![GimpleCase {
            low:   5,
            high:  Some(1),
            block: 3,
        }]);
        let ctx = TranslationContext::default();
        let result = FunctionTranslator::new(&ctx, &f, "f.c").translate();

        assert!(matches!(result, Err(failure) if matches!(failure.error, Error::MalformedSwitch(_))));
    }

    #[test]
    fn switches_test_each_case_then_default() -> anyhow::Result<()> {
        let f = switch(vec![GimpleCase::single(1, 3), GimpleCase {
            low:   2,
            high:  Some(9),
            block: 4,
        }]);
        let ctx = TranslationContext::default();
        let flo = FunctionTranslator::new(&ctx, &f, "f.c").translate()?;

        let entry = flo.blocks.iter().next().map(|(_, b)| b.clone());
        let Some(BlockExit::Match(arms)) = entry.map(|b| b.exit) else {
            anyhow::bail!("the entry block does not end in a match");
        };
        assert_eq!(arms.len(), 3);

        let builtins: Vec<String> = flo
            .statements
            .iter()
            .filter_map(|(_, s)| match s {
                Statement::Call(call) => match &call.block {
                    BlockRef::Builtin(name) => Some(name.clone()),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(builtins, vec![
            "__gimple_eq_expr_i32_i32",
            "__gimple_ge_expr_i32_i32",
            "__gimple_le_expr_i32_i32",
            "__gimple_truth_and_expr_bool_bool",
        ]);

        Ok(())
    }

    #[test]
    fn cases_out_of_the_selector_range_are_malformed() {
        let f = switch(vec![
            GimpleCase::single(1, 3),
            GimpleCase::single(4_294_967_297, 4),
        ]);
        let ctx = TranslationContext::default();
        let result = FunctionTranslator::new(&ctx, &f, "f.c").translate();

        assert!(matches!(result, Err(failure) if matches!(failure.error, Error::MalformedSwitch(_))));
    }

    #[test]
    fn constants_out_of_range_are_malformed() {
        let x = GimpleExpr::var("x", int());
        let f = function(Some(int()), Vec::new(), vec![GimpleVarDecl::new("x", int())], vec![(
            2,
            vec![
                GimpleStatement::Assign(GimpleAssign {
                    operator: GimpleOp::Nop,
                    lhs:      x.clone(),
                    operands: vec![GimpleExpr::int(4_294_967_297, int())],
                    line:     Some(3),
                }),
                ret(Some(x)),
            ],
        )]);
        let ctx = TranslationContext::default();
        let result = FunctionTranslator::new(&ctx, &f, "f.c").translate();

        assert!(matches!(result, Err(failure) if matches!(failure.error, Error::MalformedIR(_))));
    }

    #[test]
    fn non_integer_selectors_are_malformed() {
        let mut f = switch(vec![GimpleCase::single(1, 3)]);
        f.parameters = vec![GimpleVarDecl::new("x", GimpleType::real(64))];
        if let GimpleStatement::Switch(statement) = &mut f.blocks[0].statements[0] {
            statement.value = GimpleExpr::var("x", GimpleType::real(64));
        }
        let ctx = TranslationContext::default();
        let result = FunctionTranslator::new(&ctx, &f, "f.c").translate();

        assert!(matches!(result, Err(failure) if matches!(failure.error, Error::MalformedSwitch(_))));
    }

    #[test]
    fn addition_becomes_a_builtin_call() -> anyhow::Result<()> {
        let (a, b, c) = (
            GimpleExpr::var("a", int()),
            GimpleExpr::var("b", int()),
            GimpleExpr::var("c", int()),
        );
        let f = function(
            Some(int()),
            vec![GimpleVarDecl::new("a", int()), GimpleVarDecl::new("b", int())],
            vec![GimpleVarDecl::new("c", int())],
            vec![(2, vec![
                GimpleStatement::Assign(GimpleAssign {
                    operator: GimpleOp::Plus,
                    lhs:      c.clone(),
                    operands: vec![a, b],
                    line:     Some(2),
                }),
                ret(Some(c)),
            ])],
        );
        let ctx = TranslationContext::default();
        let flo = FunctionTranslator::new(&ctx, &f, "f.c").translate()?;

        let calls: Vec<_> = flo
            .statements
            .iter()
            .filter_map(|(_, s)| match s {
                Statement::Call(call) => Some(call.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].block,
            BlockRef::Builtin("__gimple_plus_expr_i32_i32".to_string())
        );
        assert_eq!(calls[0].input.len(), 2);
        assert!(calls[0].location.is_some());

        Ok(())
    }

    #[test]
    fn mixed_width_operands_fail_the_function() {
        let f = function(
            None,
            vec![
                GimpleVarDecl::new("a", int()),
                GimpleVarDecl::new("b", GimpleType::int(64)),
            ],
            vec![GimpleVarDecl::new("c", int())],
            vec![(2, vec![GimpleStatement::Assign(GimpleAssign {
                operator: GimpleOp::Plus,
                lhs:      GimpleExpr::var("c", int()),
                operands: vec![
                    GimpleExpr::var("a", int()),
                    GimpleExpr::var("b", GimpleType::int(64)),
                ],
                line:     Some(7),
            })])],
        );
        let ctx = TranslationContext::default();
        let result = FunctionTranslator::new(&ctx, &f, "f.c").translate();

        assert!(matches!(
            result,
            Err(failure) if matches!(failure.error, Error::TypeMismatch { .. })
                && failure.location.is_some_and(|l| l.line == Some(7))
        ));
    }

    #[test]
    fn calls_are_checked_against_the_callee() {
        let mut unit_map = UnitMap::new();
        unit_map.functions.insert("g".to_string(), GimpleFunctionDecl {
            name:            "g".to_string(),
            parameter_types: vec![int(), int()],
            return_type:     None,
        });
        let ctx = TranslationContext::new(unit_map, PolyfillMap::default());
        let call = |arguments, lhs| {
            function(None, Vec::new(), vec![GimpleVarDecl::new("r", int())], vec![(2, vec![
                GimpleStatement::Call(GimpleCall {
                    function: "g".to_string(),
                    arguments,
                    lhs,
                    line: None,
                }),
            ])])
        };

        let too_few = call(vec![GimpleExpr::int(1, int())], None);
        let void_result = call(
            vec![GimpleExpr::int(1, int()), GimpleExpr::int(2, int())],
            Some(GimpleExpr::var("r", int())),
        );
        let fine = call(
            vec![GimpleExpr::int(1, int()), GimpleExpr::int(2, int())],
            None,
        );

        assert!(matches!(
            FunctionTranslator::new(&ctx, &too_few, "f.c").translate(),
            Err(failure) if matches!(failure.error, Error::ArityMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(matches!(
            FunctionTranslator::new(&ctx, &void_result, "f.c").translate(),
            Err(failure) if matches!(failure.error, Error::MalformedIR(_))
        ));
        assert!(FunctionTranslator::new(&ctx, &fine, "f.c").translate().is_ok());
    }

    #[test]
    fn returning_a_value_from_void_is_malformed() {
        let f = function(None, Vec::new(), Vec::new(), vec![(2, vec![ret(Some(
            GimpleExpr::int(0, int()),
        ))])]);
        let ctx = TranslationContext::default();
        let result = FunctionTranslator::new(&ctx, &f, "f.c").translate();

        assert!(matches!(result, Err(failure) if matches!(failure.error, Error::MalformedIR(_))));
    }
}
