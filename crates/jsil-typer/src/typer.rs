//! The analyzer.
//!
//! `Typer` is a forward, streaming visitor over IR instructions. Each
//! instruction passes through three phases:
//!
//! 1. *pre-scope type updates* - e.g. naming a function variable before its
//!    body opens, so the body can refer to it;
//! 2. *scope transitions* - pushing/popping conditional block groups,
//!    starting/ending subroutines, opening/closing object groups and Wasm
//!    modules or type groups;
//! 3. *post-scope type updates* - assigning parameter bindings and computing
//!    output types from input types and opcode semantics.
//!
//! The analyzer never reports errors: recoverable unknowns are `⊤`,
//! structural precondition violations panic.

use crate::environment::Environment;
use crate::object_groups::ObjectGroupManager;
use crate::state::StateStack;
use crate::wasm_types::WasmTypeGroupRegistry;
use jsil_ir::{Instruction, Operation, Variable};
use jsil_types::{Parameter, ParameterList, Signature, Type, WasmSignature};
use rustc_hash::{FxHashMap, FxHashSet};

/// What kind of subroutine a begin instruction opened.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SubroutineKind {
    Plain,
    Arrow,
    Generator,
    AsyncFunction,
    AsyncArrow,
    AsyncGenerator,
    ObjectLiteralMethod { name: String },
    ObjectLiteralComputedMethod,
    ObjectLiteralGetter { name: String },
    ObjectLiteralSetter { name: String },
    ClassConstructor,
    ClassMethod { name: String, is_static: bool },
    ClassGetter { name: String, is_static: bool },
    ClassSetter { name: String, is_static: bool },
    WasmFunction { signature: WasmSignature },
}

/// Bookkeeping for one entry on the active-subroutines stack.
#[derive(Debug, Clone)]
pub(crate) struct SubroutineRecord {
    pub(crate) kind: SubroutineKind,
    /// The subroutine's own variable, when the begin instruction has one.
    pub(crate) output: Option<Variable>,
    /// Declared parameter list (defaulted when never declared).
    pub(crate) parameters: ParameterList,
    /// The `this` binding for constructors and methods.
    pub(crate) this_type: Option<Type>,
}

/// Which part of a try statement the analyzer is currently inside.
#[derive(Debug, Clone, Copy)]
enum TryPhase {
    Body { saw_catch: bool },
    Finally,
}

/// Per-instruction scratch carried from the scope phase into the post-scope
/// phase.
#[derive(Default)]
struct Scratch {
    finished_subroutine: Option<(SubroutineRecord, Type)>,
    finalized_output_type: Option<Type>,
    retyped_variable: Option<(Variable, Type)>,
    wasm_block_results: Option<Vec<Type>>,
}

pub struct Typer<'e> {
    pub(crate) env: &'e dyn Environment,
    chooser: Option<Box<dyn FnMut(usize) -> usize + 'e>>,
    pub(crate) state: StateStack,
    pub(crate) groups: ObjectGroupManager,
    pub(crate) wasm_types: WasmTypeGroupRegistry,
    pub(crate) active_subroutines: Vec<SubroutineRecord>,
    pending_parameters: FxHashMap<usize, ParameterList>,
    if_stack: Vec<bool>,
    try_stack: Vec<TryPhase>,
    wasm_if_stack: Vec<bool>,
    wasm_try_stack: Vec<bool>,
    pub(crate) wasm_block_signatures: Vec<WasmSignature>,
    for_loop_variable_types: Vec<Vec<Type>>,
    defined_in_wasm: FxHashSet<Variable>,
    last_instruction_index: Option<usize>,
    scratch: Scratch,
}

impl<'e> Typer<'e> {
    #[must_use]
    pub fn new(env: &'e dyn Environment) -> Self {
        Self {
            env,
            chooser: None,
            state: StateStack::new(),
            groups: ObjectGroupManager::new(),
            wasm_types: WasmTypeGroupRegistry::new(),
            active_subroutines: Vec::new(),
            pending_parameters: FxHashMap::default(),
            if_stack: Vec::new(),
            try_stack: Vec::new(),
            wasm_if_stack: Vec::new(),
            wasm_try_stack: Vec::new(),
            wasm_block_signatures: Vec::new(),
            for_loop_variable_types: Vec::new(),
            defined_in_wasm: FxHashSet::default(),
            last_instruction_index: None,
            scratch: Scratch::default(),
        }
    }

    /// Like `new`, but with a seedable uniform-choice callback used to break
    /// ties during method overload selection. The callback receives the pool
    /// size and must return an index below it.
    #[must_use]
    pub fn with_chooser(
        env: &'e dyn Environment,
        chooser: impl FnMut(usize) -> usize + 'e,
    ) -> Self {
        let mut typer = Self::new(env);
        typer.chooser = Some(Box::new(chooser));
        typer
    }

    // =========================================================================
    // Public queries
    // =========================================================================

    /// The current best-known type of `v`, `⊤` when unknown.
    #[must_use]
    pub fn type_of(&self, v: Variable) -> Type {
        self.state.type_of(v)
    }

    /// Nominal group lookup first, environment fallback second. When the
    /// type's group is known but lacks the property, the answer is `⊤`.
    #[must_use]
    pub fn infer_property_type(&self, name: &str, on: &Type) -> Type {
        if let Some(group_name) = on.group() {
            if let Some(group) = self.groups.get_group(group_name) {
                return group.property_type(name).cloned().unwrap_or(Type::ANYTHING);
            }
        }
        self.env.property_type(name, on)
    }

    /// `infer_property_type` for a variable's current type.
    #[must_use]
    pub fn infer_property_type_of_variable(&self, name: &str, v: Variable) -> Type {
        self.infer_property_type(name, &self.type_of(v))
    }

    /// All known overload signatures of `name` on values of type `on`.
    #[must_use]
    pub fn infer_method_signatures(&self, name: &str, on: &Type) -> Vec<Signature> {
        if let Some(group_name) = on.group() {
            if let Some(group) = self.groups.get_group(group_name) {
                return group
                    .method_signatures(name)
                    .map(<[Signature]>::to_vec)
                    .unwrap_or_default();
            }
        }
        self.env.method_signatures(name, on)
    }

    #[must_use]
    pub fn infer_method_signatures_of_variable(&self, name: &str, v: Variable) -> Vec<Signature> {
        self.infer_method_signatures(name, &self.type_of(v))
    }

    /// The type `new V(...)` produces: the construct signature's output when
    /// it says something, a plain object otherwise.
    #[must_use]
    pub fn infer_constructed_type(&self, v: Variable) -> Type {
        self.constructed_type(&self.type_of(v))
    }

    pub(crate) fn constructed_type(&self, t: &Type) -> Type {
        match t.construct_signature() {
            Some(sig) if !sig.output.is_anything() => sig.output.clone(),
            _ => Type::object(),
        }
    }

    /// The instance type of the innermost class's superclass, `⊤` outside
    /// any class body.
    #[must_use]
    pub fn current_super_type(&self) -> Type {
        self.groups
            .current_class()
            .map_or(Type::ANYTHING, |c| c.super_instance_type.clone())
    }

    #[must_use]
    pub fn current_super_constructor_type(&self) -> Type {
        self.groups
            .current_class()
            .map_or(Type::ANYTHING, |c| c.super_constructor_type.clone())
    }

    /// Declares the parameter types of the subroutine whose begin
    /// instruction sits at `index`. Must be called before that instruction
    /// is analyzed; repeated identical declarations are fine.
    pub fn set_parameters(&mut self, index: usize, parameters: ParameterList) {
        assert!(
            self.last_instruction_index.is_none_or(|last| index > last),
            "parameters for instruction {index} declared after it was analyzed"
        );
        if let Some(existing) = self.pending_parameters.get(&index) {
            assert_eq!(
                existing, &parameters,
                "conflicting parameter declaration for instruction {index}"
            );
            return;
        }
        self.pending_parameters.insert(index, parameters);
    }

    #[must_use]
    pub fn type_group_count(&self) -> usize {
        self.wasm_types.group_count()
    }

    /// The variables carrying the type definitions of group `index`.
    #[must_use]
    pub fn type_group(&self, index: usize) -> &[Variable] {
        self.wasm_types.group(index).variables()
    }

    /// Indices of the earlier groups that group `index` depends on,
    /// transitively.
    #[must_use]
    pub fn type_group_dependencies(&self, index: usize) -> Vec<usize> {
        self.wasm_types
            .group(index)
            .dependencies()
            .iter()
            .copied()
            .collect()
    }

    /// Drains the type-change events accumulated so far, in occurrence
    /// order.
    pub fn take_type_changes(&mut self) -> Vec<(Variable, Type)> {
        self.state.take_type_changes()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Returns the analyzer to its initial post-construction state. Every
    /// block, subroutine, object group, class, Wasm module, and Wasm type
    /// group must already be closed.
    pub fn reset(&mut self) {
        assert!(
            self.active_subroutines.is_empty(),
            "reset with an open subroutine"
        );
        assert!(
            self.groups.is_quiescent(),
            "reset with an open object literal, class, or wasm module"
        );
        assert!(
            !self.wasm_types.has_active_group(),
            "reset with an open wasm type group"
        );
        assert_eq!(self.state.depth(), 1, "reset with open conditional blocks");
        self.state.reset();
        self.groups.reset();
        self.wasm_types.reset();
        self.pending_parameters.clear();
        self.if_stack.clear();
        self.try_stack.clear();
        self.wasm_if_stack.clear();
        self.wasm_try_stack.clear();
        self.wasm_block_signatures.clear();
        self.for_loop_variable_types.clear();
        self.defined_in_wasm.clear();
        self.last_instruction_index = None;
        self.scratch = Scratch::default();
    }

    // =========================================================================
    // Analysis driver
    // =========================================================================

    /// Drives one instruction through the three dispatcher phases.
    /// Instructions must arrive in program order.
    pub fn analyze(&mut self, instr: &Instruction) {
        let expected = self.last_instruction_index.map_or(0, |i| i + 1);
        assert_eq!(
            instr.index(),
            expected,
            "instructions must be delivered in program order"
        );
        self.last_instruction_index = Some(instr.index());
        for &input in instr.inputs() {
            assert!(
                self.state.knows(input),
                "input {input} of {:?} has no type",
                instr.op()
            );
        }
        tracing::trace!(index = instr.index(), op = ?instr.op(), "analyzing");

        self.scratch = Scratch::default();
        self.process_type_changes_before_scope(instr);
        self.process_scope_changes(instr);
        if instr.op().is_wasm() {
            for &defined in instr.all_outputs() {
                self.defined_in_wasm.insert(defined);
            }
        }
        self.process_type_changes_after_scope(instr);

        for &out in instr.all_outputs() {
            assert!(
                self.state.knows(out),
                "output {out} of {:?} was not assigned a type",
                instr.op()
            );
        }
    }

    // =========================================================================
    // Phase 1: type updates before scope changes
    // =========================================================================

    fn process_type_changes_before_scope(&mut self, instr: &Instruction) {
        use Operation::*;
        match instr.op() {
            // Name the subroutine variable before its body opens so the body
            // can refer to it; the signature's output is refined at the end.
            BeginPlainFunction { .. } => {
                let sig = self.tentative_signature(instr);
                self.state
                    .update_type(instr.output(), Type::function_and_constructor(Some(sig)));
            }
            BeginArrowFunction { .. }
            | BeginGeneratorFunction { .. }
            | BeginAsyncFunction { .. }
            | BeginAsyncArrowFunction { .. }
            | BeginAsyncGeneratorFunction { .. } => {
                let sig = self.tentative_signature(instr);
                self.state
                    .update_type(instr.output(), Type::function(Some(sig)));
            }
            _ => {}
        }
    }

    fn tentative_signature(&mut self, instr: &Instruction) -> Signature {
        let shape = instr
            .op()
            .subroutine_parameters()
            .expect("tentative signature for a non-subroutine operation");
        let parameters = self.resolve_parameters(instr.index(), shape);
        Signature::new(parameters, Type::ANYTHING)
    }

    /// The declared parameters for the subroutine beginning at `index`, or
    /// defaults matching the operation's parameter shape.
    pub(crate) fn resolve_parameters(
        &self,
        index: usize,
        shape: jsil_ir::SubroutineParameters,
    ) -> ParameterList {
        if let Some(declared) = self.pending_parameters.get(&index) {
            assert_eq!(
                declared.len(),
                shape.count,
                "declared parameters for instruction {index} do not match the operation"
            );
            return declared.clone();
        }
        (0..shape.count)
            .map(|i| {
                if shape.has_rest && i + 1 == shape.count {
                    Parameter::Rest(Type::ANYTHING)
                } else {
                    Parameter::Plain(Type::ANYTHING)
                }
            })
            .collect()
    }

    /// The callee-side binding type of one declared parameter.
    pub(crate) fn callee_parameter_type(&self, parameter: &Parameter) -> Type {
        match parameter {
            Parameter::Plain(t) => t.clone(),
            Parameter::Opt(t) => t.union_with(&Type::UNDEFINED),
            Parameter::Rest(_) => self.env.array_type(),
        }
    }

    // =========================================================================
    // Phase 2: scope changes
    // =========================================================================

    fn process_scope_changes(&mut self, instr: &Instruction) {
        use Operation::*;
        match instr.op() {
            // --- if/else ---
            BeginIf { .. } => {
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false);
                self.if_stack.push(false);
            }
            BeginElse => {
                self.state.enter_conditional_block(false);
                *self.if_stack.last_mut().expect("else outside if") = true;
            }
            EndIf => {
                let saw_else = self.if_stack.pop().expect("endIf outside if");
                if !saw_else {
                    // The no-branch-taken path.
                    self.state.enter_conditional_block(false);
                }
                self.state.end_group_of_conditional_blocks();
            }

            // --- switch ---
            BeginSwitch => self.state.start_group_of_conditional_blocks(),
            BeginSwitchCase => self.state.enter_conditional_block(false),
            BeginSwitchDefaultCase => self.state.enter_conditional_block(true),
            EndSwitchCase => {}
            EndSwitch => {
                // With a default case exactly one sibling executes; without
                // one, the no-case-matched path is an empty sibling.
                if !self.state.top_level_has_default_case() {
                    self.state.enter_conditional_block(false);
                }
                self.state.end_group_of_conditional_blocks();
            }

            // --- loops ---
            BeginWhileLoopHeader => {}
            BeginWhileLoopBody => {
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false); // zero iterations
                self.state.enter_conditional_block(false);
            }
            EndWhileLoop => self.state.end_group_of_conditional_blocks(),
            BeginDoWhileLoopBody => {
                // The body runs at least once; header and body share a frame.
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false);
            }
            BeginDoWhileLoopHeader => {}
            EndDoWhileLoop => self.state.end_group_of_conditional_blocks(),
            BeginForLoopInitializer => {
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false);
            }
            BeginForLoopCondition { .. } => {
                self.state.end_group_of_conditional_blocks();
                let initial: Vec<Type> =
                    instr.inputs().iter().map(|&v| self.state.type_of(v)).collect();
                self.for_loop_variable_types.push(initial);
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false);
            }
            BeginForLoopAfterthought { .. } => {
                self.state.end_group_of_conditional_blocks();
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false); // loop may not iterate
                self.state.enter_conditional_block(false);
            }
            BeginForLoopBody { .. } => {
                self.state.end_group_of_conditional_blocks();
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false); // zero iterations
                self.state.enter_conditional_block(false);
            }
            EndForLoop => {
                self.state.end_group_of_conditional_blocks();
                self.for_loop_variable_types
                    .pop()
                    .expect("endForLoop without a for loop");
            }
            BeginForInLoop | BeginForOfLoop | BeginForOfLoopWithDestruct { .. } => {
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false); // zero iterations
                self.state.enter_conditional_block(false);
            }
            EndForInLoop | EndForOfLoop => self.state.end_group_of_conditional_blocks(),
            BeginRepeatLoop { .. } => {
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false); // zero iterations
                self.state.enter_conditional_block(false);
            }
            EndRepeatLoop => self.state.end_group_of_conditional_blocks(),

            // --- blocks and exception handling ---
            BeginBlockStatement => {
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false);
            }
            EndBlockStatement => self.state.end_group_of_conditional_blocks(),
            BeginTry => {
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false);
                self.try_stack.push(TryPhase::Body { saw_catch: false });
            }
            BeginCatch => {
                self.state.enter_conditional_block(false);
                match self.try_stack.last_mut() {
                    Some(TryPhase::Body { saw_catch }) => *saw_catch = true,
                    _ => panic!("catch outside try"),
                }
            }
            BeginFinally => {
                match self.try_stack.pop() {
                    Some(TryPhase::Body { saw_catch }) => {
                        if !saw_catch {
                            // The try body may have bailed out part-way.
                            self.state.enter_conditional_block(false);
                        }
                        self.state.end_group_of_conditional_blocks();
                    }
                    _ => panic!("finally outside try"),
                }
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false);
                self.try_stack.push(TryPhase::Finally);
            }
            EndTryCatchFinally => match self.try_stack.pop() {
                Some(TryPhase::Body { saw_catch }) => {
                    if !saw_catch {
                        self.state.enter_conditional_block(false);
                    }
                    self.state.end_group_of_conditional_blocks();
                }
                Some(TryPhase::Finally) => self.state.end_group_of_conditional_blocks(),
                None => panic!("endTryCatchFinally outside try"),
            },

            // --- subroutines ---
            BeginPlainFunction { .. } => self.begin_function(instr, SubroutineKind::Plain),
            BeginArrowFunction { .. } => self.begin_function(instr, SubroutineKind::Arrow),
            BeginGeneratorFunction { .. } => self.begin_function(instr, SubroutineKind::Generator),
            BeginAsyncFunction { .. } => {
                self.begin_function(instr, SubroutineKind::AsyncFunction);
            }
            BeginAsyncArrowFunction { .. } => {
                self.begin_function(instr, SubroutineKind::AsyncArrow);
            }
            BeginAsyncGeneratorFunction { .. } => {
                self.begin_function(instr, SubroutineKind::AsyncGenerator);
            }
            EndPlainFunction | EndArrowFunction | EndGeneratorFunction | EndAsyncFunction
            | EndAsyncArrowFunction | EndAsyncGeneratorFunction => {
                let record = self
                    .active_subroutines
                    .pop()
                    .expect("function end without begin");
                let rvt = self.state.end_subroutine(Type::UNDEFINED);
                self.scratch.finished_subroutine = Some((record, rvt));
            }

            // --- object literals ---
            BeginObjectLiteral => {
                self.groups.create_object_literal();
            }
            BeginObjectLiteralMethod { name, parameters } => {
                self.groups.current_group_mut().add_method(name);
                let this = self.groups.current_group().instance_type();
                let parameters = self.resolve_parameters(instr.index(), *parameters);
                self.active_subroutines.push(SubroutineRecord {
                    kind: SubroutineKind::ObjectLiteralMethod { name: name.clone() },
                    output: None,
                    parameters,
                    this_type: Some(this),
                });
                self.state.start_subroutine();
            }
            EndObjectLiteralMethod => {
                let record = self
                    .active_subroutines
                    .pop()
                    .expect("method end without begin");
                let rvt = self.state.end_subroutine(Type::UNDEFINED);
                let SubroutineKind::ObjectLiteralMethod { name } = &record.kind else {
                    panic!("mismatched subroutine stack at object literal method end");
                };
                let sig = Signature::new(record.parameters.clone(), rvt);
                self.groups
                    .current_group_mut()
                    .append_method_signature(name, sig);
            }
            BeginObjectLiteralComputedMethod { parameters } => {
                let this = self.groups.current_group().instance_type();
                let parameters = self.resolve_parameters(instr.index(), *parameters);
                self.active_subroutines.push(SubroutineRecord {
                    kind: SubroutineKind::ObjectLiteralComputedMethod,
                    output: None,
                    parameters,
                    this_type: Some(this),
                });
                self.state.start_subroutine();
            }
            EndObjectLiteralComputedMethod => {
                self.active_subroutines
                    .pop()
                    .expect("method end without begin");
                // The key is unknown, so nothing reaches the group.
                let _ = self.state.end_subroutine(Type::UNDEFINED);
            }
            BeginObjectLiteralGetter { name } => {
                self.groups.current_group_mut().add_property(name, None);
                let this = self.groups.current_group().instance_type();
                self.active_subroutines.push(SubroutineRecord {
                    kind: SubroutineKind::ObjectLiteralGetter { name: name.clone() },
                    output: None,
                    parameters: ParameterList::new(),
                    this_type: Some(this),
                });
                self.state.start_subroutine();
            }
            EndObjectLiteralGetter => {
                let record = self
                    .active_subroutines
                    .pop()
                    .expect("getter end without begin");
                let rvt = self.state.end_subroutine(Type::UNDEFINED);
                let SubroutineKind::ObjectLiteralGetter { name } = &record.kind else {
                    panic!("mismatched subroutine stack at getter end");
                };
                self.groups
                    .current_group_mut()
                    .update_property_type(name, rvt);
            }
            BeginObjectLiteralSetter { name } => {
                self.groups.current_group_mut().add_property(name, None);
                let this = self.groups.current_group().instance_type();
                let parameters = self
                    .pending_parameters
                    .get(&instr.index())
                    .cloned()
                    .unwrap_or_else(|| ParameterList::from_iter([Parameter::Plain(Type::ANYTHING)]));
                self.active_subroutines.push(SubroutineRecord {
                    kind: SubroutineKind::ObjectLiteralSetter { name: name.clone() },
                    output: None,
                    parameters,
                    this_type: Some(this),
                });
                self.state.start_subroutine();
            }
            EndObjectLiteralSetter => {
                let record = self
                    .active_subroutines
                    .pop()
                    .expect("setter end without begin");
                let _ = self.state.end_subroutine(Type::UNDEFINED);
                let SubroutineKind::ObjectLiteralSetter { name } = &record.kind else {
                    panic!("mismatched subroutine stack at setter end");
                };
                let value_type = record
                    .parameters
                    .first()
                    .map_or(Type::ANYTHING, |p| p.declared_type().clone());
                self.groups
                    .current_group_mut()
                    .update_property_type(name, value_type);
            }
            EndObjectLiteral => {
                let t = self.groups.finalize_current();
                self.scratch.finalized_output_type = Some(t);
            }

            // --- classes ---
            BeginClassDefinition { has_superclass } => {
                let (super_constructor, super_instance) = if *has_superclass {
                    let t = self.state.type_of(instr.input(0));
                    let instance = self.constructed_type(&t);
                    (t, instance)
                } else {
                    (Type::ANYTHING, Type::object())
                };
                let inherited_properties: Vec<(String, Type)> = super_instance
                    .properties()
                    .map(|p| (p.to_string(), self.infer_property_type(p, &super_instance)))
                    .collect();
                let inherited_methods: Vec<(String, Vec<Signature>)> = super_instance
                    .methods()
                    .map(|m| (m.to_string(), self.infer_method_signatures(m, &super_instance)))
                    .collect();
                self.groups.create_class(
                    instr.output(),
                    super_instance,
                    super_constructor,
                    inherited_properties,
                    inherited_methods,
                );
            }
            BeginClassConstructor { parameters } => {
                let parameters = self.resolve_parameters(instr.index(), *parameters);
                let class = self.groups.current_class_mut();
                class.constructor_parameters = parameters.clone();
                let this = class.instance_group.instance_type();
                self.active_subroutines.push(SubroutineRecord {
                    kind: SubroutineKind::ClassConstructor,
                    output: None,
                    parameters,
                    this_type: Some(this),
                });
                self.state.start_subroutine();
            }
            EndClassConstructor => {
                let record = self
                    .active_subroutines
                    .pop()
                    .expect("constructor end without begin");
                // A constructor's semantic return value is `this`.
                let default = record.this_type.clone().expect("constructor without this");
                let _ = self.state.end_subroutine(default);
            }
            BeginClassInstanceMethod { name, parameters } => {
                self.begin_class_method(instr, name, *parameters, false);
            }
            EndClassInstanceMethod | EndClassStaticMethod => self.end_class_method(),
            BeginClassStaticMethod { name, parameters } => {
                self.begin_class_method(instr, name, *parameters, true);
            }
            BeginClassInstanceGetter { name } => self.begin_class_getter(name, false),
            EndClassInstanceGetter | EndClassStaticGetter => self.end_class_getter(),
            BeginClassStaticGetter { name } => self.begin_class_getter(name, true),
            BeginClassInstanceSetter { name } => self.begin_class_setter(instr, name, false),
            EndClassInstanceSetter | EndClassStaticSetter => self.end_class_setter(),
            BeginClassStaticSetter { name } => self.begin_class_setter(instr, name, true),
            EndClassDefinition => {
                let class = self.groups.finalize_class();
                let construct = Signature::new(
                    class.constructor_parameters.clone(),
                    class.instance_type.clone(),
                );
                let class_type = class
                    .constructor_instance_type
                    .intersection_with(&Type::constructor(Some(construct)));
                self.scratch.retyped_variable = Some((class.output, class_type));
            }

            // --- Wasm modules, functions, and type groups ---
            BeginWasmModule => self.groups.create_wasm_module(),
            EndWasmModule => {
                let t = self.groups.finalize_wasm_module();
                self.scratch.finalized_output_type = Some(t);
            }
            BeginWasmFunction { signature } => {
                self.active_subroutines.push(SubroutineRecord {
                    kind: SubroutineKind::WasmFunction {
                        signature: signature.clone(),
                    },
                    output: None,
                    parameters: ParameterList::new(),
                    this_type: None,
                });
                self.state.start_subroutine();
            }
            EndWasmFunction => {
                let record = self
                    .active_subroutines
                    .pop()
                    .expect("wasm function end without begin");
                let rvt = self.state.end_subroutine(Type::NOTHING);
                self.scratch.finished_subroutine = Some((record, rvt));
            }
            WasmBeginTypeGroup => self.wasm_types.begin_group(),
            WasmEndTypeGroup => self.wasm_types.end_group(),

            // --- Wasm structured control flow ---
            WasmBeginBlock { signature } | WasmBeginLoop { signature } => {
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false);
                self.wasm_block_signatures.push(signature.clone());
            }
            WasmBeginIf { signature, .. } => {
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false);
                self.wasm_if_stack.push(false);
                self.wasm_block_signatures.push(signature.clone());
            }
            WasmBeginElse { .. } => {
                self.state.enter_conditional_block(false);
                *self
                    .wasm_if_stack
                    .last_mut()
                    .expect("wasm else outside if") = true;
            }
            WasmEndIf { .. } => {
                let saw_else = self.wasm_if_stack.pop().expect("wasm endIf outside if");
                if !saw_else {
                    self.state.enter_conditional_block(false);
                }
                self.state.end_group_of_conditional_blocks();
                let sig = self
                    .wasm_block_signatures
                    .pop()
                    .expect("wasm block stack out of sync");
                self.scratch.wasm_block_results = Some(sig.results);
            }
            WasmBeginTry { signature } => {
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false);
                self.wasm_try_stack.push(false);
                self.wasm_block_signatures.push(signature.clone());
            }
            WasmBeginCatch { .. } | WasmBeginCatchAll => {
                self.state.enter_conditional_block(false);
                *self
                    .wasm_try_stack
                    .last_mut()
                    .expect("wasm catch outside try") = true;
            }
            WasmEndTry { .. } => {
                let saw_catch = self.wasm_try_stack.pop().expect("wasm endTry outside try");
                if !saw_catch {
                    self.state.enter_conditional_block(false);
                }
                self.state.end_group_of_conditional_blocks();
                let sig = self
                    .wasm_block_signatures
                    .pop()
                    .expect("wasm block stack out of sync");
                self.scratch.wasm_block_results = Some(sig.results);
            }
            WasmBeginTryTable { signature, .. } | WasmBeginTryDelegate { signature } => {
                self.state.start_group_of_conditional_blocks();
                self.state.enter_conditional_block(false); // handlers may divert
                self.state.enter_conditional_block(false);
                self.wasm_block_signatures.push(signature.clone());
            }
            WasmEndBlock { .. } | WasmEndLoop { .. } | WasmEndTryTable { .. }
            | WasmEndTryDelegate { .. } => {
                self.state.end_group_of_conditional_blocks();
                let sig = self
                    .wasm_block_signatures
                    .pop()
                    .expect("wasm block stack out of sync");
                self.scratch.wasm_block_results = Some(sig.results);
            }

            _ => {}
        }
    }

    fn begin_function(&mut self, instr: &Instruction, kind: SubroutineKind) {
        let shape = instr
            .op()
            .subroutine_parameters()
            .expect("function begin without parameters");
        let parameters = self.resolve_parameters(instr.index(), shape);
        self.active_subroutines.push(SubroutineRecord {
            kind,
            output: Some(instr.output()),
            parameters,
            this_type: None,
        });
        self.state.start_subroutine();
    }

    fn begin_class_method(
        &mut self,
        instr: &Instruction,
        name: &str,
        shape: jsil_ir::SubroutineParameters,
        is_static: bool,
    ) {
        let parameters = self.resolve_parameters(instr.index(), shape);
        let class = self.groups.current_class_mut();
        let group = if is_static {
            &mut class.constructor_group
        } else {
            &mut class.instance_group
        };
        group.add_method(name);
        let this = group.instance_type();
        self.active_subroutines.push(SubroutineRecord {
            kind: SubroutineKind::ClassMethod {
                name: name.to_string(),
                is_static,
            },
            output: None,
            parameters,
            this_type: Some(this),
        });
        self.state.start_subroutine();
    }

    fn end_class_method(&mut self) {
        let record = self
            .active_subroutines
            .pop()
            .expect("class method end without begin");
        let rvt = self.state.end_subroutine(Type::UNDEFINED);
        let SubroutineKind::ClassMethod { name, is_static } = &record.kind else {
            panic!("mismatched subroutine stack at class method end");
        };
        let sig = Signature::new(record.parameters.clone(), rvt);
        let class = self.groups.current_class_mut();
        let group = if *is_static {
            &mut class.constructor_group
        } else {
            &mut class.instance_group
        };
        group.append_method_signature(name, sig);
    }

    fn begin_class_getter(&mut self, name: &str, is_static: bool) {
        let class = self.groups.current_class_mut();
        let group = if is_static {
            &mut class.constructor_group
        } else {
            &mut class.instance_group
        };
        group.add_property(name, None);
        let this = group.instance_type();
        self.active_subroutines.push(SubroutineRecord {
            kind: SubroutineKind::ClassGetter {
                name: name.to_string(),
                is_static,
            },
            output: None,
            parameters: ParameterList::new(),
            this_type: Some(this),
        });
        self.state.start_subroutine();
    }

    fn end_class_getter(&mut self) {
        let record = self
            .active_subroutines
            .pop()
            .expect("class getter end without begin");
        let rvt = self.state.end_subroutine(Type::UNDEFINED);
        let SubroutineKind::ClassGetter { name, is_static } = &record.kind else {
            panic!("mismatched subroutine stack at class getter end");
        };
        let class = self.groups.current_class_mut();
        let group = if *is_static {
            &mut class.constructor_group
        } else {
            &mut class.instance_group
        };
        group.update_property_type(name, rvt);
    }

    fn begin_class_setter(&mut self, instr: &Instruction, name: &str, is_static: bool) {
        let parameters = self
            .pending_parameters
            .get(&instr.index())
            .cloned()
            .unwrap_or_else(|| ParameterList::from_iter([Parameter::Plain(Type::ANYTHING)]));
        let class = self.groups.current_class_mut();
        let group = if is_static {
            &mut class.constructor_group
        } else {
            &mut class.instance_group
        };
        group.add_property(name, None);
        let this = group.instance_type();
        self.active_subroutines.push(SubroutineRecord {
            kind: SubroutineKind::ClassSetter {
                name: name.to_string(),
                is_static,
            },
            output: None,
            parameters,
            this_type: Some(this),
        });
        self.state.start_subroutine();
    }

    fn end_class_setter(&mut self) {
        let record = self
            .active_subroutines
            .pop()
            .expect("class setter end without begin");
        let _ = self.state.end_subroutine(Type::UNDEFINED);
        let SubroutineKind::ClassSetter { name, is_static } = &record.kind else {
            panic!("mismatched subroutine stack at class setter end");
        };
        let value_type = record
            .parameters
            .first()
            .map_or(Type::ANYTHING, |p| p.declared_type().clone());
        let class = self.groups.current_class_mut();
        let group = if *is_static {
            &mut class.constructor_group
        } else {
            &mut class.instance_group
        };
        group.update_property_type(name, value_type);
    }

    // =========================================================================
    // Phase 3 plumbing (the computations live in dispatch.rs/dispatch_wasm.rs)
    // =========================================================================

    pub(crate) fn set_output_type(&mut self, instr: &Instruction, index: usize, t: Type) {
        // Guarded operations swallow exceptions; their results are the
        // unknown value no matter what the unguarded semantics would say.
        let t = if instr.op().is_guarded() {
            Type::ANYTHING
        } else {
            t
        };
        self.state.update_type(instr.outputs()[index], t);
    }

    pub(crate) fn set_inner_output_type(&mut self, instr: &Instruction, index: usize, t: Type) {
        self.state.update_type(instr.inner_output(index), t);
    }

    pub(crate) fn update_variable_type(&mut self, v: Variable, t: Type) {
        self.state.update_type(v, t);
    }

    pub(crate) fn take_finished_subroutine(&mut self) -> (SubroutineRecord, Type) {
        self.scratch
            .finished_subroutine
            .take()
            .expect("no finished subroutine recorded for this instruction")
    }

    pub(crate) fn take_finalized_output_type(&mut self) -> Type {
        self.scratch
            .finalized_output_type
            .take()
            .expect("no finalized group type recorded for this instruction")
    }

    pub(crate) fn take_retyped_variable(&mut self) -> (Variable, Type) {
        self.scratch
            .retyped_variable
            .take()
            .expect("no retyped variable recorded for this instruction")
    }

    pub(crate) fn take_wasm_block_results(&mut self) -> Vec<Type> {
        self.scratch
            .wasm_block_results
            .take()
            .expect("no wasm block results recorded for this instruction")
    }

    pub(crate) fn current_for_loop_variable_types(&self) -> &[Type] {
        self.for_loop_variable_types
            .last()
            .expect("no active for loop")
    }

    pub(crate) fn wasm_variable_is_imported(&self, v: Variable) -> bool {
        !self.defined_in_wasm.contains(&v)
    }

    /// One uniform choice out of `n` alternatives. Falls back to the first
    /// alternative when no callback was supplied.
    pub(crate) fn choose(&mut self, n: usize) -> usize {
        assert!(n > 0, "choice from an empty set");
        match &mut self.chooser {
            Some(chooser) => {
                let picked = chooser(n);
                assert!(picked < n, "uniform-choice callback out of range");
                picked
            }
            None => 0,
        }
    }

    /// Picks one overload for a call site with `num_arguments` arguments:
    /// the overloads whose arity fits, or all of them when none fits, with
    /// ties broken by the uniform-choice callback.
    pub(crate) fn select_overload(
        &mut self,
        signatures: &[Signature],
        num_arguments: usize,
    ) -> Option<Signature> {
        if signatures.is_empty() {
            return None;
        }
        let matching: Vec<&Signature> = signatures
            .iter()
            .filter(|s| s.accepts_argument_count(num_arguments))
            .collect();
        let pool: Vec<&Signature> = if matching.is_empty() {
            signatures.iter().collect()
        } else {
            matching
        };
        let picked = self.choose(pool.len());
        Some(pool[picked].clone())
    }
}
