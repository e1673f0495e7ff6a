//! Post-scope type computation for JS operations.
//!
//! Output types are computed from input types and opcode semantics. Guarded
//! operations get `⊤` through `set_output_type` no matter what the rule here
//! says.

use crate::typer::{SubroutineKind, Typer};
use jsil_ir::{BinaryOperator, Instruction, Operation, UnaryOperator};
use jsil_types::{Signature, Type};

impl Typer<'_> {
    pub(crate) fn process_type_changes_after_scope(&mut self, instr: &Instruction) {
        use Operation::*;
        match instr.op() {
            // --- constant loads ---
            LoadInteger { .. } => self.set_output_type(instr, 0, Type::INTEGER),
            LoadFloat { .. } => self.set_output_type(instr, 0, Type::FLOAT),
            LoadBigInt { .. } => self.set_output_type(instr, 0, Type::BIGINT),
            LoadString { name, .. } => {
                let t = match name {
                    Some(n) => self
                        .env
                        .enumeration(n)
                        .unwrap_or_else(|| Type::named_string(n.clone())),
                    None => Type::STRING,
                };
                self.set_output_type(instr, 0, t);
            }
            LoadBoolean { .. } => self.set_output_type(instr, 0, Type::BOOLEAN),
            // `null` deliberately types as `undefined`; downstream consumers
            // conflate the two.
            LoadUndefined | LoadNull => self.set_output_type(instr, 0, Type::UNDEFINED),
            LoadThis => self.set_output_type(instr, 0, Type::object()),
            LoadArguments => self.set_output_type(instr, 0, self.env.arguments_type()),
            LoadRegExp { .. } => self.set_output_type(instr, 0, Type::REGEXP),
            LoadNewTarget => {
                self.set_output_type(instr, 0, Type::function(None).union_with(&Type::UNDEFINED));
            }
            LoadBuiltin { name } => {
                let t = self.env.builtin_type(name);
                self.set_output_type(instr, 0, t);
            }

            // --- arrays and templates ---
            CreateArray { .. } | CreateIntArray { .. } | CreateFloatArray { .. } => {
                self.set_output_type(instr, 0, self.env.array_type());
            }
            CreateTemplateString { .. } => self.set_output_type(instr, 0, Type::STRING),

            // --- object literal members ---
            ObjectLiteralAddProperty { name } => {
                let t = self.type_of(instr.input(0));
                self.groups.current_group_mut().add_property(name, Some(t));
            }
            ObjectLiteralAddComputedProperty => {
                // The key is a runtime value; nothing reaches the group.
            }
            ObjectLiteralCopyProperties => {
                let source = self.type_of(instr.input(0));
                let copied: Vec<(String, Type)> = source
                    .properties()
                    .map(|p| (p.to_string(), self.infer_property_type(p, &source)))
                    .collect();
                for (name, t) in copied {
                    self.groups.current_group_mut().add_property(&name, Some(t));
                }
            }
            EndObjectLiteral => {
                let t = self.take_finalized_output_type();
                self.set_output_type(instr, 0, t);
            }

            // --- class members ---
            BeginClassDefinition { .. } => {
                // The class variable is opaque while its body is analyzed.
                self.set_output_type(instr, 0, Type::ANYTHING);
            }
            ClassAddInstanceProperty { name, has_value } => {
                let t = has_value.then(|| self.type_of(instr.input(0)));
                self.groups
                    .current_class_mut()
                    .instance_group
                    .add_property(name, t);
            }
            ClassAddStaticProperty { name, has_value } => {
                let t = has_value.then(|| self.type_of(instr.input(0)));
                self.groups
                    .current_class_mut()
                    .constructor_group
                    .add_property(name, t);
            }
            EndClassDefinition => {
                let (v, t) = self.take_retyped_variable();
                self.update_variable_type(v, t);
            }

            // --- property and element access ---
            GetProperty { name, .. } => {
                let t = self.infer_property_type_of_variable(name, instr.input(0));
                self.set_output_type(instr, 0, t);
            }
            SetProperty { name } | UpdateProperty { name, .. } => {
                let t = self.type_of(instr.input(0)).adding_property(name);
                self.update_variable_type(instr.input(0), t);
            }
            DeleteProperty { name, .. } => {
                let t = self.type_of(instr.input(0)).removing_property(name);
                self.update_variable_type(instr.input(0), t);
                self.set_output_type(instr, 0, Type::BOOLEAN);
            }
            GetElement { .. } | GetComputedProperty { .. } => {
                self.set_output_type(instr, 0, Type::ANYTHING);
            }
            SetElement { .. } | SetComputedProperty => {}
            DeleteComputedProperty { .. } => self.set_output_type(instr, 0, Type::BOOLEAN),
            GetSuperProperty { name } => {
                let t = self.infer_property_type(name, &self.current_super_type());
                self.set_output_type(instr, 0, t);
            }
            SetSuperProperty { .. } => {}

            // --- destructuring ---
            DestructArray { .. } => {
                for i in 0..instr.num_outputs() {
                    self.set_output_type(instr, i, Type::ANYTHING);
                }
            }
            DestructObject {
                properties,
                has_rest_element,
            } => {
                let source = self.type_of(instr.input(0));
                for (i, name) in properties.iter().enumerate() {
                    let t = self.infer_property_type(name, &source);
                    self.set_output_type(instr, i, t);
                }
                if *has_rest_element {
                    self.set_output_type(instr, properties.len(), Type::object());
                }
            }
            DestructArrayAndReassign { .. } => {
                for &target in &instr.inputs()[1..] {
                    self.update_variable_type(target, Type::ANYTHING);
                }
            }
            DestructObjectAndReassign {
                properties,
                has_rest_element,
            } => {
                let source = self.type_of(instr.input(0));
                for (i, name) in properties.iter().enumerate() {
                    let t = self.infer_property_type(name, &source);
                    self.update_variable_type(instr.input(1 + i), t);
                }
                if *has_rest_element {
                    self.update_variable_type(
                        instr.input(1 + properties.len()),
                        Type::object(),
                    );
                }
            }

            // --- calls ---
            CallFunction { .. } => {
                let f = self.type_of(instr.input(0));
                let t = f
                    .call_signature()
                    .map_or(Type::ANYTHING, |sig| sig.output.clone());
                self.set_output_type(instr, 0, t);
            }
            Construct { .. } => {
                let t = self.infer_constructed_type(instr.input(0));
                self.set_output_type(instr, 0, t);
            }
            CallMethod {
                name,
                num_arguments,
                ..
            } => {
                let signatures = self.infer_method_signatures_of_variable(name, instr.input(0));
                let t = self
                    .select_overload(&signatures, *num_arguments)
                    .map_or(Type::ANYTHING, |sig| sig.output);
                self.set_output_type(instr, 0, t);
            }
            CallComputedMethod { .. } => self.set_output_type(instr, 0, Type::ANYTHING),
            CallSuperConstructor { .. } => {}
            CallSuperMethod {
                name,
                num_arguments,
            } => {
                let signatures = self.infer_method_signatures(name, &self.current_super_type());
                let t = self
                    .select_overload(&signatures, *num_arguments)
                    .map_or(Type::ANYTHING, |sig| sig.output);
                self.set_output_type(instr, 0, t);
            }

            // --- operators ---
            UnaryOperation { op } => {
                let t = self.unary_output_type(*op, &self.type_of(instr.input(0)));
                self.set_output_type(instr, 0, t);
            }
            BinaryOperation { op } => {
                let lhs = self.type_of(instr.input(0));
                let rhs = self.type_of(instr.input(1));
                let t = binary_output_type(*op, &lhs, &rhs);
                self.set_output_type(instr, 0, t);
            }
            Compare { .. } => self.set_output_type(instr, 0, Type::BOOLEAN),
            TernaryOperation => {
                let t = self
                    .type_of(instr.input(1))
                    .union_with(&self.type_of(instr.input(2)));
                self.set_output_type(instr, 0, t);
            }
            TypeOf => self.set_output_type(instr, 0, Type::STRING),
            InstanceOf | In => self.set_output_type(instr, 0, Type::BOOLEAN),
            VoidOperation => self.set_output_type(instr, 0, Type::UNDEFINED),
            Dup => {
                let t = self.type_of(instr.input(0));
                self.set_output_type(instr, 0, t);
            }
            Reassign => {
                let t = self.type_of(instr.input(1));
                self.update_variable_type(instr.input(0), t);
            }
            Await | Yield { .. } => self.set_output_type(instr, 0, Type::ANYTHING),
            YieldEach | ThrowException => {}
            Return { has_value } => {
                let t = if *has_value {
                    self.type_of(instr.input(0))
                } else {
                    Type::UNDEFINED
                };
                self.state.update_return_value_type(t);
            }

            // --- subroutine boundaries ---
            BeginPlainFunction { .. }
            | BeginArrowFunction { .. }
            | BeginGeneratorFunction { .. }
            | BeginAsyncFunction { .. }
            | BeginAsyncArrowFunction { .. }
            | BeginAsyncGeneratorFunction { .. } => {
                self.assign_parameter_bindings(instr, false);
            }
            BeginObjectLiteralMethod { .. }
            | BeginObjectLiteralComputedMethod { .. }
            | BeginObjectLiteralGetter { .. }
            | BeginObjectLiteralSetter { .. }
            | BeginClassConstructor { .. }
            | BeginClassInstanceMethod { .. }
            | BeginClassInstanceGetter { .. }
            | BeginClassInstanceSetter { .. }
            | BeginClassStaticMethod { .. }
            | BeginClassStaticGetter { .. }
            | BeginClassStaticSetter { .. } => {
                self.assign_parameter_bindings(instr, true);
            }
            EndPlainFunction | EndArrowFunction | EndGeneratorFunction | EndAsyncFunction
            | EndAsyncArrowFunction | EndAsyncGeneratorFunction => self.finish_function(),

            // --- loop bindings ---
            BeginForLoopCondition { .. }
            | BeginForLoopAfterthought { .. }
            | BeginForLoopBody { .. } => {
                // Loop variables keep their initial types; the analyzer does
                // not iterate to a fixed point.
                let types = self.current_for_loop_variable_types().to_vec();
                for i in 0..instr.num_inner_outputs() {
                    let t = types.get(i).cloned().unwrap_or(Type::ANYTHING);
                    self.set_inner_output_type(instr, i, t);
                }
            }
            BeginForInLoop => self.set_inner_output_type(instr, 0, Type::STRING),
            BeginForOfLoop => self.set_inner_output_type(instr, 0, Type::ANYTHING),
            BeginForOfLoopWithDestruct { .. } => {
                for i in 0..instr.num_inner_outputs() {
                    self.set_inner_output_type(instr, i, Type::ANYTHING);
                }
            }
            BeginRepeatLoop {
                exposes_loop_counter,
                ..
            } => {
                if *exposes_loop_counter {
                    self.set_inner_output_type(instr, 0, Type::INTEGER);
                }
            }
            BeginCatch => self.set_inner_output_type(instr, 0, Type::ANYTHING),

            // --- Wasm objects created from JS ---
            CreateWasmGlobal {
                value_type,
                mutable,
            } => {
                let t = Type::wasm_global(value_type.clone(), *mutable);
                self.set_output_type(instr, 0, t);
            }
            CreateWasmTable { element_type } => {
                let t = Type::wasm_table(element_type.clone());
                self.set_output_type(instr, 0, t);
            }
            CreateWasmMemory {
                is_memory64,
                is_shared,
            } => {
                let t = Type::wasm_memory(*is_memory64, *is_shared);
                self.set_output_type(instr, 0, t);
            }
            CreateWasmJsTag { parameters } => {
                let t = Type::wasm_tag(parameters.clone());
                self.set_output_type(instr, 0, t);
            }
            EndWasmModule => {
                let t = self.take_finalized_output_type();
                self.set_output_type(instr, 0, t);
            }

            op if op.is_wasm() => self.process_wasm_type_changes(instr),
            _ => {}
        }
    }

    fn assign_parameter_bindings(&mut self, instr: &Instruction, has_this: bool) {
        let record = self
            .active_subroutines
            .last()
            .expect("parameter bindings without an active subroutine")
            .clone();
        let mut slot = 0;
        if has_this {
            let this = record.this_type.clone().unwrap_or(Type::ANYTHING);
            self.set_inner_output_type(instr, 0, this);
            slot = 1;
        }
        for (i, parameter) in record.parameters.iter().enumerate() {
            let t = self.callee_parameter_type(parameter);
            self.set_inner_output_type(instr, slot + i, t);
        }
    }

    fn finish_function(&mut self) {
        let (record, return_value_type) = self.take_finished_subroutine();
        let output_type = match record.kind {
            // Generator bodies yield; the call produces the generator object.
            SubroutineKind::Generator | SubroutineKind::AsyncGenerator => {
                self.env.generator_type()
            }
            // Async bodies wrap their result.
            SubroutineKind::AsyncFunction | SubroutineKind::AsyncArrow => self.env.promise_type(),
            _ => return_value_type,
        };
        let sig = Signature::new(record.parameters.clone(), output_type);
        let t = if record.kind == SubroutineKind::Plain {
            Type::function_and_constructor(Some(sig))
        } else {
            Type::function(Some(sig))
        };
        let output = record.output.expect("function record without an output");
        self.update_variable_type(output, t);
    }

    fn unary_output_type(&self, op: UnaryOperator, input: &Type) -> Type {
        match op {
            UnaryOperator::LogicalNot => Type::BOOLEAN,
            // Unary plus never produces a bigint; it throws on one instead.
            UnaryOperator::Plus => Type::NUMBER,
            UnaryOperator::Minus
            | UnaryOperator::PreInc
            | UnaryOperator::PreDec
            | UnaryOperator::PostInc
            | UnaryOperator::PostDec => bigint_polymorphic(Type::NUMBER, &[input]),
            UnaryOperator::BitwiseNot => bigint_polymorphic(Type::INTEGER, &[input]),
        }
    }
}

/// The bigint closure rule: all-bigint inputs stay bigint, possibly-bigint
/// inputs widen the base by bigint, everything else is the base.
fn bigint_polymorphic(base: Type, inputs: &[&Type]) -> Type {
    if inputs.iter().all(|t| t.is_a(&Type::BIGINT)) {
        Type::BIGINT
    } else if inputs.iter().any(|t| t.may_be(&Type::BIGINT)) {
        base.union_with(&Type::BIGINT)
    } else {
        base
    }
}

fn binary_output_type(op: BinaryOperator, lhs: &Type, rhs: &Type) -> Type {
    match op {
        BinaryOperator::Add => {
            bigint_polymorphic(Type::NUMBER.union_with(&Type::STRING), &[lhs, rhs])
        }
        BinaryOperator::Sub
        | BinaryOperator::Mul
        | BinaryOperator::Div
        | BinaryOperator::Mod
        | BinaryOperator::Exp => bigint_polymorphic(Type::NUMBER, &[lhs, rhs]),
        BinaryOperator::BitAnd
        | BinaryOperator::BitOr
        | BinaryOperator::Xor
        | BinaryOperator::LShift
        | BinaryOperator::RShift
        | BinaryOperator::UnsignedRShift => bigint_polymorphic(Type::INTEGER, &[lhs, rhs]),
        BinaryOperator::LogicAnd | BinaryOperator::LogicOr | BinaryOperator::NullCoalesce => {
            lhs.union_with(rhs)
        }
    }
}
