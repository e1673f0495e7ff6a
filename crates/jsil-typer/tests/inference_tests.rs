//! End-to-end inference over JS programs.

use jsil_ir::{
    BinaryOperator, Comparator, Instruction, Operation, ProgramBuilder, SubroutineParameters,
};
use jsil_typer::{EmptyEnvironment, Environment, Typer};
use jsil_types::{Parameter, ParameterList, Signature, Type};

static ENV: EmptyEnvironment = EmptyEnvironment;

fn run(program: &[Instruction]) -> Typer<'static> {
    // RUST_LOG=trace shows per-instruction type changes when debugging.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let mut typer = Typer::new(&ENV);
    for instr in program {
        typer.analyze(instr);
    }
    typer
}

#[test]
fn test_conditional_reassignment_unions_branch_types() {
    // S1: an if without an else merges the branch with the untouched parent.
    let mut b = ProgramBuilder::new();
    let v0 = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    let cond = b.emit(Operation::LoadBoolean { value: true }, &[]).output();
    b.emit(Operation::BeginIf { inverted: false }, &[cond]);
    let s = b
        .emit(
            Operation::LoadString {
                value: "x".into(),
                name: None,
            },
            &[],
        )
        .output();
    b.emit(Operation::Reassign, &[v0, s]);
    b.emit(Operation::EndIf, &[]);
    let typer = run(&b.finish());
    assert_eq!(typer.type_of(v0), Type::INTEGER.union_with(&Type::STRING));
}

#[test]
fn test_if_else_replaces_parent_type_when_both_branches_assign() {
    let mut b = ProgramBuilder::new();
    let v0 = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    let cond = b.emit(Operation::LoadBoolean { value: true }, &[]).output();
    b.emit(Operation::BeginIf { inverted: false }, &[cond]);
    let s = b
        .emit(
            Operation::LoadString {
                value: "a".into(),
                name: None,
            },
            &[],
        )
        .output();
    b.emit(Operation::Reassign, &[v0, s]);
    b.emit(Operation::BeginElse, &[]);
    let f = b.emit(Operation::LoadFloat { value: 0.5 }, &[]).output();
    b.emit(Operation::Reassign, &[v0, f]);
    b.emit(Operation::EndIf, &[]);
    let typer = run(&b.finish());
    // Both branches assigned, so the original integer is gone.
    assert_eq!(typer.type_of(v0), Type::STRING.union_with(&Type::FLOAT));
}

#[test]
fn test_object_literal_accumulates_properties() {
    // S2: property accumulation with per-property types.
    let mut b = ProgramBuilder::new();
    let va = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    let vs = b
        .emit(
            Operation::LoadString {
                value: "s".into(),
                name: None,
            },
            &[],
        )
        .output();
    b.emit(Operation::BeginObjectLiteral, &[]);
    b.emit(Operation::ObjectLiteralAddProperty { name: "a".into() }, &[va]);
    b.emit(Operation::ObjectLiteralAddProperty { name: "b".into() }, &[vs]);
    let obj = b.emit(Operation::EndObjectLiteral, &[]).output();
    let typer = run(&b.finish());

    let t = typer.type_of(obj);
    assert!(t.group().is_some());
    let mut props: Vec<&str> = t.properties().collect();
    props.sort_unstable();
    assert_eq!(props, vec!["a", "b"]);
    assert_eq!(t.methods().count(), 0);
    assert_eq!(typer.infer_property_type("a", &t), Type::INTEGER);
    assert_eq!(typer.infer_property_type("b", &t), Type::STRING);
    // Known group, unknown property: the unknown value.
    assert!(typer.infer_property_type("c", &t).is_anything());
}

#[test]
fn test_class_definition_and_construction() {
    // S3: instance shape and method signature inference.
    let mut b = ProgramBuilder::new();
    let class = b
        .emit(Operation::BeginClassDefinition { has_superclass: false }, &[])
        .output();
    b.emit(
        Operation::ClassAddInstanceProperty {
            name: "x".into(),
            has_value: false,
        },
        &[],
    );
    b.emit(
        Operation::BeginClassConstructor {
            parameters: SubroutineParameters::simple(0),
        },
        &[],
    );
    b.emit(Operation::EndClassConstructor, &[]);
    b.emit(
        Operation::BeginClassInstanceMethod {
            name: "m".into(),
            parameters: SubroutineParameters::simple(0),
        },
        &[],
    );
    let f = b.emit(Operation::LoadFloat { value: 1.5 }, &[]).output();
    b.emit(Operation::Return { has_value: true }, &[f]);
    b.emit(Operation::EndClassInstanceMethod, &[]);
    b.emit(Operation::EndClassDefinition, &[]);
    let instance = b
        .emit(
            Operation::Construct {
                num_arguments: 0,
                is_guarded: false,
            },
            &[class],
        )
        .output();
    let typer = run(&b.finish());

    let t = typer.type_of(instance);
    assert!(t.has_property("x"));
    assert!(t.has_method("m"));
    let signatures = typer.infer_method_signatures("m", &t);
    assert_eq!(signatures.len(), 1);
    assert_eq!(signatures[0].output, Type::FLOAT);

    // The class variable itself constructs instances and carries statics.
    let class_type = typer.type_of(class);
    assert!(class_type.construct_signature().is_some());
    assert_eq!(typer.infer_constructed_type(class), t);
}

#[test]
fn test_subclass_inherits_shape() {
    let mut b = ProgramBuilder::new();
    let base = b
        .emit(Operation::BeginClassDefinition { has_superclass: false }, &[])
        .output();
    let one = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    b.emit(
        Operation::ClassAddInstanceProperty {
            name: "base_prop".into(),
            has_value: true,
        },
        &[one],
    );
    b.emit(Operation::EndClassDefinition, &[]);
    let derived = b
        .emit(Operation::BeginClassDefinition { has_superclass: true }, &[base])
        .output();
    b.emit(
        Operation::ClassAddInstanceProperty {
            name: "own_prop".into(),
            has_value: false,
        },
        &[],
    );
    b.emit(Operation::EndClassDefinition, &[]);
    let instance = b
        .emit(
            Operation::Construct {
                num_arguments: 0,
                is_guarded: false,
            },
            &[derived],
        )
        .output();
    let typer = run(&b.finish());
    let t = typer.type_of(instance);
    assert!(t.has_property("base_prop"));
    assert!(t.has_property("own_prop"));
    assert_eq!(typer.infer_property_type("base_prop", &t), Type::INTEGER);
}

#[test]
fn test_guarded_method_call_yields_anything() {
    // S5: guarded outputs are the top type no matter what.
    let mut b = ProgramBuilder::new();
    let v = b.emit(Operation::LoadUndefined, &[]).output();
    let r = b
        .emit(
            Operation::CallMethod {
                name: "foo".into(),
                num_arguments: 0,
                is_guarded: true,
            },
            &[v],
        )
        .output();
    let typer = run(&b.finish());
    assert!(typer.type_of(r).is_anything());
}

#[test]
fn test_async_function_returns_promise() {
    // S6: the computed integer return is wrapped.
    let mut b = ProgramBuilder::new();
    let f = b
        .emit(
            Operation::BeginAsyncFunction {
                parameters: SubroutineParameters::simple(0),
            },
            &[],
        )
        .output();
    let seven = b.emit(Operation::LoadInteger { value: 7 }, &[]).output();
    b.emit(Operation::Return { has_value: true }, &[seven]);
    b.emit(Operation::EndAsyncFunction, &[]);
    let typer = run(&b.finish());
    let sig = typer.type_of(f).call_signature().cloned().expect("signature");
    assert_eq!(sig.output, ENV.promise_type());
}

#[test]
fn test_generator_function_returns_generator() {
    let mut b = ProgramBuilder::new();
    let f = b
        .emit(
            Operation::BeginGeneratorFunction {
                parameters: SubroutineParameters::simple(0),
            },
            &[],
        )
        .output();
    b.emit(Operation::Yield { has_argument: false }, &[]);
    b.emit(Operation::EndGeneratorFunction, &[]);
    let typer = run(&b.finish());
    let sig = typer.type_of(f).call_signature().cloned().expect("signature");
    assert_eq!(sig.output, ENV.generator_type());
}

#[test]
fn test_plain_function_infers_return_type() {
    let mut b = ProgramBuilder::new();
    let f = b
        .emit(
            Operation::BeginPlainFunction {
                parameters: SubroutineParameters::simple(0),
            },
            &[],
        )
        .output();
    let one = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    b.emit(Operation::Return { has_value: true }, &[one]);
    b.emit(Operation::EndPlainFunction, &[]);
    let call = b
        .emit(
            Operation::CallFunction {
                num_arguments: 0,
                is_guarded: false,
            },
            &[f],
        )
        .output();
    let typer = run(&b.finish());
    // The body returned on its main path, so no implicit undefined joins in.
    assert_eq!(typer.type_of(call), Type::INTEGER);
}

#[test]
fn test_function_without_return_yields_undefined() {
    let mut b = ProgramBuilder::new();
    let f = b
        .emit(
            Operation::BeginPlainFunction {
                parameters: SubroutineParameters::simple(0),
            },
            &[],
        )
        .output();
    b.emit(Operation::EndPlainFunction, &[]);
    let call = b
        .emit(
            Operation::CallFunction {
                num_arguments: 0,
                is_guarded: false,
            },
            &[f],
        )
        .output();
    let typer = run(&b.finish());
    assert_eq!(typer.type_of(call), Type::UNDEFINED);
}

#[test]
fn test_conditional_return_unions_with_default() {
    let mut b = ProgramBuilder::new();
    let emitted = b.emit(
        Operation::BeginPlainFunction {
            parameters: SubroutineParameters::simple(1),
        },
        &[],
    );
    let f = emitted.output();
    let param = emitted.inner_output(0);
    b.emit(Operation::BeginIf { inverted: false }, &[param]);
    let one = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    b.emit(Operation::Return { has_value: true }, &[one]);
    b.emit(Operation::EndIf, &[]);
    b.emit(Operation::EndPlainFunction, &[]);
    let typer = run(&b.finish());
    let sig = typer.type_of(f).call_signature().cloned().expect("signature");
    // Only one path returns; falling off the end contributes undefined.
    assert_eq!(sig.output, Type::INTEGER.union_with(&Type::UNDEFINED));
}

#[test]
fn test_declared_parameters_reach_bindings_and_signature() {
    let mut b = ProgramBuilder::new();
    let mut typer = Typer::new(&ENV);
    typer.set_parameters(
        0,
        ParameterList::from_iter([
            Parameter::Plain(Type::INTEGER),
            Parameter::Opt(Type::STRING),
            Parameter::Rest(Type::ANYTHING),
        ]),
    );
    let emitted = b.emit(
        Operation::BeginPlainFunction {
            parameters: SubroutineParameters {
                count: 3,
                has_rest: true,
            },
        },
        &[],
    );
    b.emit(Operation::EndPlainFunction, &[]);
    for instr in b.finish() {
        typer.analyze(&instr);
    }
    assert_eq!(typer.type_of(emitted.inner_output(0)), Type::INTEGER);
    assert_eq!(
        typer.type_of(emitted.inner_output(1)),
        Type::STRING.union_with(&Type::UNDEFINED)
    );
    assert_eq!(typer.type_of(emitted.inner_output(2)), ENV.array_type());
    let sig = typer
        .type_of(emitted.output())
        .call_signature()
        .cloned()
        .expect("signature");
    assert_eq!(sig.parameters.len(), 3);
    assert!(sig.has_rest_parameter());
}

#[test]
fn test_switch_with_default_replaces_type() {
    let mut b = ProgramBuilder::new();
    let v0 = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    let c1 = b.emit(Operation::LoadInteger { value: 2 }, &[]).output();
    b.emit(Operation::BeginSwitch, &[v0]);
    b.emit(Operation::BeginSwitchCase, &[c1]);
    let s = b
        .emit(
            Operation::LoadString {
                value: "s".into(),
                name: None,
            },
            &[],
        )
        .output();
    b.emit(Operation::Reassign, &[v0, s]);
    b.emit(Operation::EndSwitchCase, &[]);
    b.emit(Operation::BeginSwitchDefaultCase, &[]);
    let t = b.emit(Operation::LoadBoolean { value: false }, &[]).output();
    b.emit(Operation::Reassign, &[v0, t]);
    b.emit(Operation::EndSwitchCase, &[]);
    b.emit(Operation::EndSwitch, &[]);
    let typer = run(&b.finish());
    // With a default, exactly one case runs; integer is unreachable after.
    assert_eq!(typer.type_of(v0), Type::STRING.union_with(&Type::BOOLEAN));
}

#[test]
fn test_switch_without_default_keeps_parent_type() {
    let mut b = ProgramBuilder::new();
    let v0 = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    let c1 = b.emit(Operation::LoadInteger { value: 2 }, &[]).output();
    b.emit(Operation::BeginSwitch, &[v0]);
    b.emit(Operation::BeginSwitchCase, &[c1]);
    let s = b
        .emit(
            Operation::LoadString {
                value: "s".into(),
                name: None,
            },
            &[],
        )
        .output();
    b.emit(Operation::Reassign, &[v0, s]);
    b.emit(Operation::EndSwitchCase, &[]);
    b.emit(Operation::EndSwitch, &[]);
    let typer = run(&b.finish());
    assert_eq!(typer.type_of(v0), Type::STRING.union_with(&Type::INTEGER));
}

#[test]
fn test_while_loop_body_is_conditional() {
    let mut b = ProgramBuilder::new();
    let v0 = b.emit(Operation::LoadInteger { value: 0 }, &[]).output();
    b.emit(Operation::BeginWhileLoopHeader, &[]);
    let cond = b.emit(Operation::LoadBoolean { value: true }, &[]).output();
    b.emit(Operation::BeginWhileLoopBody, &[cond]);
    let s = b
        .emit(
            Operation::LoadString {
                value: "x".into(),
                name: None,
            },
            &[],
        )
        .output();
    b.emit(Operation::Reassign, &[v0, s]);
    b.emit(Operation::EndWhileLoop, &[]);
    let typer = run(&b.finish());
    // Zero iterations are possible.
    assert_eq!(typer.type_of(v0), Type::STRING.union_with(&Type::INTEGER));
}

#[test]
fn test_repeat_loop_body_changes_stay_conditional() {
    let mut b = ProgramBuilder::new();
    let v0 = b.emit(Operation::LoadInteger { value: 0 }, &[]).output();
    let emitted = b.emit(
        Operation::BeginRepeatLoop {
            iterations: 10,
            exposes_loop_counter: true,
        },
        &[],
    );
    let counter = emitted.inner_output(0);
    let f = b.emit(Operation::LoadFloat { value: 0.5 }, &[]).output();
    b.emit(Operation::Reassign, &[v0, f]);
    b.emit(Operation::EndRepeatLoop, &[]);
    let typer = run(&b.finish());
    assert_eq!(typer.type_of(counter), Type::INTEGER);
    assert_eq!(typer.type_of(v0), Type::FLOAT.union_with(&Type::INTEGER));
}

#[test]
fn test_do_while_body_runs_at_least_once() {
    let mut b = ProgramBuilder::new();
    let v0 = b.emit(Operation::LoadInteger { value: 0 }, &[]).output();
    b.emit(Operation::BeginDoWhileLoopBody, &[]);
    let s = b
        .emit(
            Operation::LoadString {
                value: "x".into(),
                name: None,
            },
            &[],
        )
        .output();
    b.emit(Operation::Reassign, &[v0, s]);
    b.emit(Operation::BeginDoWhileLoopHeader, &[]);
    let cond = b.emit(Operation::LoadBoolean { value: false }, &[]).output();
    b.emit(Operation::EndDoWhileLoop, &[cond]);
    let typer = run(&b.finish());
    // The body is guaranteed to execute.
    assert_eq!(typer.type_of(v0), Type::STRING);
}

#[test]
fn test_for_loop_variables_keep_initializer_types() {
    let mut b = ProgramBuilder::new();
    let limit = b.emit(Operation::LoadInteger { value: 10 }, &[]).output();
    b.emit(Operation::BeginForLoopInitializer, &[]);
    let init = b.emit(Operation::LoadInteger { value: 0 }, &[]).output();
    let cond_block = b.emit(
        Operation::BeginForLoopCondition {
            num_loop_variables: 1,
        },
        &[init],
    );
    let i_cond = cond_block.inner_output(0);
    let cmp = b
        .emit(
            Operation::Compare {
                op: Comparator::LessThan,
            },
            &[i_cond, limit],
        )
        .output();
    let after_block = b.emit(
        Operation::BeginForLoopAfterthought {
            num_loop_variables: 1,
        },
        &[],
    );
    let i_after = after_block.inner_output(0);
    b.emit(
        Operation::UnaryOperation {
            op: jsil_ir::UnaryOperator::PostInc,
        },
        &[i_after],
    );
    let body_block = b.emit(
        Operation::BeginForLoopBody {
            num_loop_variables: 1,
        },
        &[cmp],
    );
    let i_body = body_block.inner_output(0);
    b.emit(Operation::EndForLoop, &[]);
    let typer = run(&b.finish());
    assert_eq!(typer.type_of(i_cond), Type::INTEGER);
    assert_eq!(typer.type_of(i_after), Type::INTEGER);
    assert_eq!(typer.type_of(i_body), Type::INTEGER);
}

#[test]
fn test_for_in_binds_strings() {
    let mut b = ProgramBuilder::new();
    b.emit(Operation::BeginObjectLiteral, &[]);
    let obj = b.emit(Operation::EndObjectLiteral, &[]).output();
    let emitted = b.emit(Operation::BeginForInLoop, &[obj]);
    b.emit(Operation::EndForInLoop, &[]);
    let typer = run(&b.finish());
    assert_eq!(typer.type_of(emitted.inner_output(0)), Type::STRING);
}

#[test]
fn test_try_catch_merges_both_paths() {
    let mut b = ProgramBuilder::new();
    let v0 = b.emit(Operation::LoadInteger { value: 0 }, &[]).output();
    b.emit(Operation::BeginTry, &[]);
    let s = b
        .emit(
            Operation::LoadString {
                value: "t".into(),
                name: None,
            },
            &[],
        )
        .output();
    b.emit(Operation::Reassign, &[v0, s]);
    let caught = b.emit(Operation::BeginCatch, &[]);
    let exn = caught.inner_output(0);
    let f = b.emit(Operation::LoadFloat { value: 1.0 }, &[]).output();
    b.emit(Operation::Reassign, &[v0, f]);
    b.emit(Operation::EndTryCatchFinally, &[]);
    let typer = run(&b.finish());
    assert!(typer.type_of(exn).is_anything());
    assert_eq!(typer.type_of(v0), Type::STRING.union_with(&Type::FLOAT));
}

#[test]
fn test_property_operations_update_structure() {
    let mut b = ProgramBuilder::new();
    let va = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    b.emit(Operation::BeginObjectLiteral, &[]);
    b.emit(Operation::ObjectLiteralAddProperty { name: "a".into() }, &[va]);
    let obj = b.emit(Operation::EndObjectLiteral, &[]).output();
    let one = b.emit(Operation::LoadInteger { value: 2 }, &[]).output();
    b.emit(Operation::SetProperty { name: "b".into() }, &[obj, one]);
    let deleted = b
        .emit(
            Operation::DeleteProperty {
                name: "a".into(),
                is_guarded: false,
            },
            &[obj],
        )
        .output();
    let typer = run(&b.finish());
    let t = typer.type_of(obj);
    // Adding b widened away from the literal's group; deleting a narrowed.
    assert_eq!(t.group(), None);
    assert!(t.has_property("b"));
    assert!(!t.has_property("a"));
    assert_eq!(typer.type_of(deleted), Type::BOOLEAN);
}

#[test]
fn test_bigint_arithmetic_rules() {
    let mut b = ProgramBuilder::new();
    let x = b.emit(Operation::LoadBigInt { value: 1 }, &[]).output();
    let y = b.emit(Operation::LoadBigInt { value: 2 }, &[]).output();
    let n = b.emit(Operation::LoadInteger { value: 3 }, &[]).output();
    let both = b
        .emit(
            Operation::BinaryOperation {
                op: BinaryOperator::Add,
            },
            &[x, y],
        )
        .output();
    let mixed = b
        .emit(
            Operation::BinaryOperation {
                op: BinaryOperator::Add,
            },
            &[x, n],
        )
        .output();
    let plain = b
        .emit(
            Operation::BinaryOperation {
                op: BinaryOperator::Add,
            },
            &[n, n],
        )
        .output();
    let typer = run(&b.finish());
    assert_eq!(typer.type_of(both), Type::BIGINT);
    assert!(typer.type_of(mixed).may_be(&Type::BIGINT));
    assert!(typer.type_of(mixed).may_be(&Type::STRING));
    assert!(!typer.type_of(plain).may_be(&Type::BIGINT));
    assert!(typer.type_of(plain).may_be(&Type::STRING));
}

#[test]
fn test_ternary_unions_value_branches() {
    let mut b = ProgramBuilder::new();
    let cond = b.emit(Operation::LoadBoolean { value: true }, &[]).output();
    let x = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    let y = b
        .emit(
            Operation::LoadString {
                value: "y".into(),
                name: None,
            },
            &[],
        )
        .output();
    let r = b.emit(Operation::TernaryOperation, &[cond, x, y]).output();
    let typer = run(&b.finish());
    assert_eq!(typer.type_of(r), Type::INTEGER.union_with(&Type::STRING));
}

#[test]
fn test_destructuring() {
    let mut b = ProgramBuilder::new();
    let va = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    b.emit(Operation::BeginObjectLiteral, &[]);
    b.emit(Operation::ObjectLiteralAddProperty { name: "a".into() }, &[va]);
    let obj = b.emit(Operation::EndObjectLiteral, &[]).output();
    let destructed = b.emit(
        Operation::DestructObject {
            properties: vec!["a".into(), "missing".into()],
            has_rest_element: true,
        },
        &[obj],
    );
    let arr = b.emit(Operation::CreateArray { num_initial_values: 0 }, &[]).output();
    let elements = b.emit(
        Operation::DestructArray {
            indices: vec![0, 1],
            last_is_rest: false,
        },
        &[arr],
    );
    let typer = run(&b.finish());
    assert_eq!(typer.type_of(destructed.outputs[0]), Type::INTEGER);
    assert!(typer.type_of(destructed.outputs[1]).is_anything());
    assert_eq!(typer.type_of(destructed.outputs[2]), Type::object());
    assert!(typer.type_of(elements.outputs[0]).is_anything());
    assert!(typer.type_of(elements.outputs[1]).is_anything());
}

#[test]
fn test_method_overload_selection_prefers_matching_arity() {
    struct MethodEnv;
    impl Environment for MethodEnv {
        fn method_signatures(&self, name: &str, _on: &Type) -> Vec<Signature> {
            if name == "overloaded" {
                vec![
                    Signature::new([], Type::INTEGER),
                    Signature::new([Parameter::Plain(Type::ANYTHING)], Type::FLOAT),
                ]
            } else {
                Vec::new()
            }
        }
    }
    let env = MethodEnv;
    let mut typer = Typer::new(&env);
    let mut b = ProgramBuilder::new();
    let recv = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    let arg = b.emit(Operation::LoadInteger { value: 2 }, &[]).output();
    let r = b
        .emit(
            Operation::CallMethod {
                name: "overloaded".into(),
                num_arguments: 1,
                is_guarded: false,
            },
            &[recv, arg],
        )
        .output();
    for instr in b.finish() {
        typer.analyze(&instr);
    }
    assert_eq!(typer.type_of(r), Type::FLOAT);
}

#[test]
fn test_overload_ties_go_through_the_chooser() {
    struct MethodEnv;
    impl Environment for MethodEnv {
        fn method_signatures(&self, _name: &str, _on: &Type) -> Vec<Signature> {
            vec![
                Signature::new([Parameter::Plain(Type::ANYTHING)], Type::INTEGER),
                Signature::new([Parameter::Plain(Type::ANYTHING)], Type::STRING),
            ]
        }
    }
    let env = MethodEnv;
    let mut typer = Typer::with_chooser(&env, |n| n - 1);
    let mut b = ProgramBuilder::new();
    let recv = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    let arg = b.emit(Operation::LoadInteger { value: 2 }, &[]).output();
    let r = b
        .emit(
            Operation::CallMethod {
                name: "m".into(),
                num_arguments: 1,
                is_guarded: false,
            },
            &[recv, arg],
        )
        .output();
    for instr in b.finish() {
        typer.analyze(&instr);
    }
    assert_eq!(typer.type_of(r), Type::STRING);
}

#[test]
fn test_null_types_as_undefined() {
    let mut b = ProgramBuilder::new();
    let n = b.emit(Operation::LoadNull, &[]).output();
    let u = b.emit(Operation::LoadUndefined, &[]).output();
    let typer = run(&b.finish());
    assert_eq!(typer.type_of(n), Type::UNDEFINED);
    assert_eq!(typer.type_of(n), typer.type_of(u));
}

#[test]
fn test_named_string_uses_enumeration_when_known() {
    struct EnumEnv;
    impl Environment for EnumEnv {
        fn enumeration(&self, name: &str) -> Option<Type> {
            (name == "Color").then(|| Type::named_string("Color"))
        }
    }
    let env = EnumEnv;
    let mut typer = Typer::new(&env);
    let mut b = ProgramBuilder::new();
    let known = b
        .emit(
            Operation::LoadString {
                value: "red".into(),
                name: Some("Color".into()),
            },
            &[],
        )
        .output();
    let unknown = b
        .emit(
            Operation::LoadString {
                value: "up".into(),
                name: Some("Direction".into()),
            },
            &[],
        )
        .output();
    for instr in b.finish() {
        typer.analyze(&instr);
    }
    assert_eq!(typer.type_of(known), Type::named_string("Color"));
    assert_eq!(typer.type_of(unknown), Type::named_string("Direction"));
}

#[test]
fn test_type_changes_are_observable_in_order() {
    let mut b = ProgramBuilder::new();
    let v0 = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    let s = b
        .emit(
            Operation::LoadString {
                value: "x".into(),
                name: None,
            },
            &[],
        )
        .output();
    b.emit(Operation::Reassign, &[v0, s]);
    let mut typer = Typer::new(&ENV);
    for instr in b.finish() {
        typer.analyze(&instr);
    }
    let changes = typer.take_type_changes();
    assert_eq!(changes[0], (v0, Type::INTEGER));
    assert_eq!(changes[1], (s, Type::STRING));
    assert_eq!(changes[2], (v0, Type::STRING));
    assert!(typer.take_type_changes().is_empty());
}

#[test]
fn test_reset_and_replay_reproduce_state() {
    let mut b = ProgramBuilder::new();
    let v0 = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    let cond = b.emit(Operation::LoadBoolean { value: true }, &[]).output();
    b.emit(Operation::BeginIf { inverted: false }, &[cond]);
    let s = b
        .emit(
            Operation::LoadString {
                value: "x".into(),
                name: None,
            },
            &[],
        )
        .output();
    b.emit(Operation::Reassign, &[v0, s]);
    b.emit(Operation::EndIf, &[]);
    b.emit(Operation::BeginObjectLiteral, &[]);
    b.emit(Operation::ObjectLiteralAddProperty { name: "p".into() }, &[v0]);
    let obj = b.emit(Operation::EndObjectLiteral, &[]).output();
    let program = b.finish();

    let mut first = Typer::new(&ENV);
    for instr in &program {
        first.analyze(instr);
    }
    let before: Vec<Type> = [v0, cond, s, obj].iter().map(|&v| first.type_of(v)).collect();

    first.reset();
    assert!(first.type_of(v0).is_anything());
    for instr in &program {
        first.analyze(instr);
    }
    let after: Vec<Type> = [v0, cond, s, obj].iter().map(|&v| first.type_of(v)).collect();
    assert_eq!(before, after);

    // Two independent instances agree at every prefix point.
    let mut left = Typer::new(&ENV);
    let mut right = Typer::new(&ENV);
    for instr in &program {
        left.analyze(instr);
        right.analyze(instr);
        for &v in &[v0, cond, s, obj] {
            assert_eq!(left.type_of(v), right.type_of(v));
        }
    }
}

#[test]
fn test_object_literal_method_signatures_accumulate() {
    let mut b = ProgramBuilder::new();
    b.emit(Operation::BeginObjectLiteral, &[]);
    let method = b.emit(
        Operation::BeginObjectLiteralMethod {
            name: "m".into(),
            parameters: SubroutineParameters::simple(1),
        },
        &[],
    );
    let this_binding = method.inner_output(0);
    let one = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
    b.emit(Operation::Return { has_value: true }, &[one]);
    b.emit(Operation::EndObjectLiteralMethod, &[]);
    b.emit(
        Operation::BeginObjectLiteralGetter { name: "g".into() },
        &[],
    );
    let f = b.emit(Operation::LoadFloat { value: 2.0 }, &[]).output();
    b.emit(Operation::Return { has_value: true }, &[f]);
    b.emit(Operation::EndObjectLiteralGetter, &[]);
    let obj = b.emit(Operation::EndObjectLiteral, &[]).output();
    let typer = run(&b.finish());

    let t = typer.type_of(obj);
    assert!(t.has_method("m"));
    assert!(t.has_property("g"));
    // `this` inside the method already carried the literal's group.
    assert_eq!(typer.type_of(this_binding).group(), t.group());
    let sigs = typer.infer_method_signatures("m", &t);
    assert_eq!(sigs.len(), 1);
    assert_eq!(sigs[0].output, Type::INTEGER);
    assert_eq!(typer.infer_property_type("g", &t), Type::FLOAT);
}

#[test]
fn test_super_queries_outside_class_are_anything() {
    let typer = Typer::new(&ENV);
    assert!(typer.current_super_type().is_anything());
    assert!(typer.current_super_constructor_type().is_anything());
}
