//! Post-scope type computation for Wasm operations.
//!
//! Covers the per-opcode value typing (numeric, reference, and block-
//! structured operations), recursive type-definition resolution, and the
//! first-touch registration of module-level entities with the object-group
//! manager's export tracking.

use crate::object_groups::WasmEntityKind;
use crate::typer::{SubroutineKind, Typer};
use crate::wasm_types::RefSlot;
use jsil_ir::{Instruction, Operation, Variable, WasmIntegerUnaryOperator, WasmTypeRefOperand};
use jsil_types::{
    Type, WasmExtension, WasmFieldType, WasmRefKind, WasmTypeDefinition, WasmTypeDescription,
};

/// A resolved storage-type operand plus, for self references, the sentinel
/// to patch through later.
struct ResolvedOperand {
    ty: Type,
    pending: Option<(Variable, bool)>,
}

impl Typer<'_> {
    pub(crate) fn process_wasm_type_changes(&mut self, instr: &Instruction) {
        use Operation::*;
        match instr.op() {
            // --- constants ---
            WasmConsti32 { .. } => self.set_output_type(instr, 0, Type::WASM_I32),
            WasmConsti64 { .. } => self.set_output_type(instr, 0, Type::WASM_I64),
            WasmConstf32 { .. } => self.set_output_type(instr, 0, Type::WASM_F32),
            WasmConstf64 { .. } => self.set_output_type(instr, 0, Type::WASM_F64),
            WasmConstSimd128 { .. } => self.set_output_type(instr, 0, Type::WASM_SIMD128),

            // --- numeric operators ---
            WasmI32BinOp { .. } => self.set_output_type(instr, 0, Type::WASM_I32),
            WasmI64BinOp { .. } => self.set_output_type(instr, 0, Type::WASM_I64),
            WasmF32BinOp { .. } => self.set_output_type(instr, 0, Type::WASM_F32),
            WasmF64BinOp { .. } => self.set_output_type(instr, 0, Type::WASM_F64),
            WasmI32UnOp { .. } => self.set_output_type(instr, 0, Type::WASM_I32),
            WasmI64UnOp { op } => {
                // eqz compares against zero and always produces i32.
                let t = if *op == WasmIntegerUnaryOperator::Eqz {
                    Type::WASM_I32
                } else {
                    Type::WASM_I64
                };
                self.set_output_type(instr, 0, t);
            }
            WasmF32UnOp { .. } => self.set_output_type(instr, 0, Type::WASM_F32),
            WasmF64UnOp { .. } => self.set_output_type(instr, 0, Type::WASM_F64),
            WasmI32CompareOp { .. } | WasmI64CompareOp { .. } | WasmF32CompareOp { .. }
            | WasmF64CompareOp { .. } => self.set_output_type(instr, 0, Type::WASM_I32),
            WasmWrapI64ToI32 => self.set_output_type(instr, 0, Type::WASM_I32),
            WasmExtendI32ToI64 { .. } => self.set_output_type(instr, 0, Type::WASM_I64),
            WasmSelect => {
                let t = self
                    .type_of(instr.input(0))
                    .union_with(&self.type_of(instr.input(1)));
                self.set_output_type(instr, 0, t);
            }
            WasmUnreachable => {}

            // --- reference operations ---
            WasmRefNull { heap } => {
                let t = match heap {
                    Some(h) => Type::wasm_abstract_ref(*h, true),
                    None => {
                        let def = self.wasm_type_definition_of(instr.input(0));
                        self.wasm_types.record_dependency(def.id());
                        Type::wasm_index_ref(def.id(), true)
                    }
                };
                self.set_output_type(instr, 0, t);
            }
            WasmRefIsNull => self.set_output_type(instr, 0, Type::WASM_I32),
            WasmRefFunc => {
                let t = Type::wasm_abstract_ref(jsil_types::WasmAbstractHeapType::Func, false);
                self.set_output_type(instr, 0, t);
            }
            WasmRefI31 => {
                let t = Type::wasm_abstract_ref(jsil_types::WasmAbstractHeapType::I31, false);
                self.set_output_type(instr, 0, t);
            }
            WasmI31Get { .. } => self.set_output_type(instr, 0, Type::WASM_I32),
            WasmStructNew { .. } | WasmStructNewDefault | WasmArrayNewFixed { .. }
            | WasmArrayNewDefault => {
                let def = self.wasm_type_definition_of(instr.input(0));
                self.wasm_types.record_dependency(def.id());
                self.set_output_type(instr, 0, Type::wasm_index_ref(def.id(), false));
            }
            WasmStructGet { field_index } => {
                let t = self
                    .referenced_description(instr.input(0))
                    .and_then(|desc| match desc {
                        WasmTypeDescription::Struct { fields } => {
                            fields.get(*field_index).map(|f| f.ty.clone())
                        }
                        _ => None,
                    })
                    .unwrap_or(Type::ANYTHING);
                self.set_output_type(instr, 0, t);
            }
            WasmStructSet { .. } => {}
            WasmArrayLen => self.set_output_type(instr, 0, Type::WASM_I32),
            WasmArrayGet { .. } => {
                let t = self
                    .referenced_description(instr.input(0))
                    .and_then(|desc| match desc {
                        WasmTypeDescription::Array { element } => Some(element.ty.clone()),
                        _ => None,
                    })
                    .unwrap_or(Type::ANYTHING);
                self.set_output_type(instr, 0, t);
            }
            WasmArraySet => {}

            // --- globals, tables, memories, tags ---
            WasmDefineGlobal {
                value_type,
                mutable,
            } => {
                let t = Type::wasm_global(value_type.clone(), *mutable);
                self.set_output_type(instr, 0, t);
                self.note_wasm_entity_use(instr.output(), WasmEntityKind::Global);
            }
            WasmGlobalGet => {
                let global = self.type_of(instr.input(0));
                let t = match global.wasm_extension() {
                    Some(WasmExtension::Global { value_type, .. }) => value_type.clone(),
                    _ => Type::ANYTHING,
                };
                self.set_output_type(instr, 0, t);
                self.note_wasm_entity_use(instr.input(0), WasmEntityKind::Global);
            }
            WasmGlobalSet => self.note_wasm_entity_use(instr.input(0), WasmEntityKind::Global),
            WasmDefineTable { element_type } => {
                self.set_output_type(instr, 0, Type::wasm_table(element_type.clone()));
                self.note_wasm_entity_use(instr.output(), WasmEntityKind::Table);
            }
            WasmTableGet => {
                let table = self.type_of(instr.input(0));
                let t = match table.wasm_extension() {
                    Some(WasmExtension::Table { element_type }) => element_type.clone(),
                    _ => Type::ANYTHING,
                };
                self.set_output_type(instr, 0, t);
                self.note_wasm_entity_use(instr.input(0), WasmEntityKind::Table);
            }
            WasmTableSet => self.note_wasm_entity_use(instr.input(0), WasmEntityKind::Table),
            WasmDefineMemory {
                is_memory64,
                is_shared,
            } => {
                self.set_output_type(instr, 0, Type::wasm_memory(*is_memory64, *is_shared));
                self.note_wasm_entity_use(instr.output(), WasmEntityKind::Memory);
            }
            WasmMemoryLoad { kind } => {
                self.set_output_type(instr, 0, kind.value_type());
                self.note_wasm_entity_use(instr.input(0), WasmEntityKind::Memory);
            }
            WasmMemoryStore { .. } => {
                self.note_wasm_entity_use(instr.input(0), WasmEntityKind::Memory);
            }
            WasmDefineTag { parameters } => {
                self.set_output_type(instr, 0, Type::wasm_tag(parameters.clone()));
                self.note_wasm_entity_use(instr.output(), WasmEntityKind::Tag);
            }
            WasmThrow { .. } => self.note_wasm_entity_use(instr.input(0), WasmEntityKind::Tag),
            WasmRethrow => {}

            // --- calls ---
            WasmJsCall { signature } => {
                self.groups
                    .note_wasm_function_import(instr.input(0), signature);
                for (i, t) in signature.results.iter().enumerate() {
                    self.set_output_type(instr, i, t.clone());
                }
            }
            WasmCallDirect { signature } => {
                for (i, t) in signature.results.iter().enumerate() {
                    self.set_output_type(instr, i, t.clone());
                }
            }
            WasmCallIndirect { signature } => {
                self.note_wasm_entity_use(instr.input(0), WasmEntityKind::Table);
                for (i, t) in signature.results.iter().enumerate() {
                    self.set_output_type(instr, i, t.clone());
                }
            }
            WasmReturn { .. } => {
                // Wasm return types are declared, not inferred; this only
                // marks the path as returned for dead-code bookkeeping.
                self.state.update_return_value_type(Type::NOTHING);
            }

            // --- functions ---
            BeginWasmFunction { signature } => {
                for (i, t) in signature.parameters.iter().enumerate() {
                    self.set_inner_output_type(instr, i, t.clone());
                }
            }
            EndWasmFunction => {
                let (record, _) = self.take_finished_subroutine();
                let SubroutineKind::WasmFunction { signature } = record.kind else {
                    panic!("mismatched subroutine stack at wasm function end");
                };
                self.set_output_type(instr, 0, Type::wasm_function_def(signature.clone()));
                self.groups
                    .note_wasm_function_definition(instr.output(), &signature);
            }

            // --- type definitions ---
            WasmDefineForwardOrSelfReference => {
                self.set_output_type(instr, 0, Type::wasm_self_reference());
            }
            WasmResolveForwardReference => {
                let sentinel = instr.input(0);
                assert!(
                    matches!(
                        self.type_of(sentinel).wasm_extension(),
                        Some(WasmExtension::SelfReference)
                    ),
                    "forward-reference resolution requires the sentinel as first input"
                );
                let target = self.wasm_type_definition_of(instr.input(1));
                self.wasm_types.resolve_forward_reference(sentinel, target.id());
            }
            WasmDefineSignatureType {
                parameters,
                results,
            } => {
                let params = self.resolve_type_operands(instr, parameters);
                let rets = self.resolve_type_operands(instr, results);
                let description = WasmTypeDescription::Signature {
                    parameters: params.iter().map(|r| r.ty.clone()).collect(),
                    results: rets.iter().map(|r| r.ty.clone()).collect(),
                };
                let def = self.wasm_types.new_definition(instr.output(), description);
                self.park_pending(&params, &def, RefSlot::SignatureParameter);
                self.park_pending(&rets, &def, RefSlot::SignatureResult);
                self.set_output_type(instr, 0, Type::wasm_type_def(def));
            }
            WasmDefineArrayType { element, mutable } => {
                let resolved = self.resolve_type_operand(instr, element);
                let description = WasmTypeDescription::Array {
                    element: WasmFieldType {
                        ty: resolved.ty.clone(),
                        mutable: *mutable,
                    },
                };
                let def = self.wasm_types.new_definition(instr.output(), description);
                if let Some((sentinel, nullable)) = resolved.pending {
                    self.wasm_types.add_pending_reference(
                        sentinel,
                        def.shared_description(),
                        RefSlot::ArrayElement,
                        nullable,
                        def.id(),
                    );
                }
                self.set_output_type(instr, 0, Type::wasm_type_def(def));
            }
            WasmDefineStructType { fields } => {
                let resolved: Vec<(ResolvedOperand, bool)> = fields
                    .iter()
                    .map(|f| (self.resolve_type_operand(instr, &f.ty), f.mutable))
                    .collect();
                let description = WasmTypeDescription::Struct {
                    fields: resolved
                        .iter()
                        .map(|(r, mutable)| WasmFieldType {
                            ty: r.ty.clone(),
                            mutable: *mutable,
                        })
                        .collect(),
                };
                let def = self.wasm_types.new_definition(instr.output(), description);
                for (i, (r, _)) in resolved.iter().enumerate() {
                    if let Some((sentinel, nullable)) = r.pending {
                        self.wasm_types.add_pending_reference(
                            sentinel,
                            def.shared_description(),
                            RefSlot::StructField(i),
                            nullable,
                            def.id(),
                        );
                    }
                }
                self.set_output_type(instr, 0, Type::wasm_type_def(def));
            }

            // --- structured control flow ---
            WasmBeginBlock { signature }
            | WasmBeginTry { signature }
            | WasmBeginTryTable { signature, .. } => {
                self.set_inner_output_type(instr, 0, Type::wasm_label(signature.results.clone()));
                for (i, t) in signature.parameters.iter().enumerate() {
                    self.set_inner_output_type(instr, 1 + i, t.clone());
                }
            }
            WasmBeginIf { signature, .. } | WasmBeginElse { signature } => {
                self.set_inner_output_type(instr, 0, Type::wasm_label(signature.results.clone()));
                for (i, t) in signature.parameters.iter().enumerate() {
                    self.set_inner_output_type(instr, 1 + i, t.clone());
                }
            }
            WasmBeginLoop { signature } => {
                // A branch to a loop label re-enters the loop start, so the
                // label carries the parameter types, not the results.
                self.set_inner_output_type(
                    instr,
                    0,
                    Type::wasm_label(signature.parameters.clone()),
                );
                for (i, t) in signature.parameters.iter().enumerate() {
                    self.set_inner_output_type(instr, 1 + i, t.clone());
                }
            }
            WasmBeginTryDelegate { signature } => {
                self.set_inner_output_type(instr, 0, Type::wasm_label(signature.results.clone()));
                for (i, t) in signature.parameters.iter().enumerate() {
                    self.set_inner_output_type(instr, 1 + i, t.clone());
                }
            }
            WasmBeginCatch { num_tag_parameters } => {
                let enclosing = self
                    .wasm_block_signatures
                    .last()
                    .expect("catch outside a wasm try")
                    .clone();
                self.set_inner_output_type(instr, 0, Type::wasm_label(enclosing.results));
                self.set_inner_output_type(instr, 1, Type::WASM_EXCEPTION_LABEL);
                let tag = self.type_of(instr.input(0));
                let tag_parameters: Vec<Type> = match tag.wasm_extension() {
                    Some(WasmExtension::Tag { parameters }) => parameters.clone(),
                    _ => vec![Type::ANYTHING; *num_tag_parameters],
                };
                assert_eq!(
                    tag_parameters.len(),
                    *num_tag_parameters,
                    "catch block and tag disagree on parameter count"
                );
                for (i, t) in tag_parameters.iter().enumerate() {
                    self.set_inner_output_type(instr, 2 + i, t.clone());
                }
                self.note_wasm_entity_use(instr.input(0), WasmEntityKind::Tag);
            }
            WasmBeginCatchAll => {
                let enclosing = self
                    .wasm_block_signatures
                    .last()
                    .expect("catch-all outside a wasm try")
                    .clone();
                self.set_inner_output_type(instr, 0, Type::wasm_label(enclosing.results));
            }
            WasmEndBlock { .. } | WasmEndIf { .. } | WasmEndLoop { .. } | WasmEndTry { .. }
            | WasmEndTryTable { .. } | WasmEndTryDelegate { .. } => {
                let results = self.take_wasm_block_results();
                assert_eq!(
                    results.len(),
                    instr.num_outputs(),
                    "wasm block end and signature disagree on result count"
                );
                for (i, t) in results.into_iter().enumerate() {
                    self.set_output_type(instr, i, t);
                }
            }
            WasmBranch { .. } | WasmBranchIf { .. } => {}

            _ => {}
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// The type definition carried by `v`, fatal otherwise.
    fn wasm_type_definition_of(&self, v: Variable) -> WasmTypeDefinition {
        let t = self.type_of(v);
        match t.wasm_extension() {
            Some(WasmExtension::TypeDef(def)) => def.clone(),
            other => panic!("variable {v} is not a wasm type definition (found {other:?})"),
        }
    }

    /// The description behind an indexed reference, if `v` carries one.
    fn referenced_description(&self, v: Variable) -> Option<WasmTypeDescription> {
        let t = self.type_of(v);
        match t.wasm_extension() {
            Some(WasmExtension::Ref {
                kind: WasmRefKind::Index(id),
                ..
            }) => self.wasm_types.lookup(*id).map(|def| def.description().clone()),
            _ => None,
        }
    }

    /// Registers the first use of a module-level entity variable, classified
    /// as imported when it was defined outside Wasm context.
    fn note_wasm_entity_use(&mut self, v: Variable, kind: WasmEntityKind) {
        let t = self.type_of(v);
        let imported = self.wasm_variable_is_imported(v);
        self.groups.note_wasm_entity(v, kind, imported, t);
    }

    fn resolve_type_operands(
        &mut self,
        instr: &Instruction,
        operands: &[WasmTypeRefOperand],
    ) -> Vec<ResolvedOperand> {
        operands
            .iter()
            .map(|operand| self.resolve_type_operand(instr, operand))
            .collect()
    }

    /// Resolves one storage-type operand of a type definition: value types
    /// pass through, references to concrete definitions become indexed refs
    /// (recording the dependency), references to the sentinel are left as
    /// placeholders to be patched later.
    fn resolve_type_operand(
        &mut self,
        instr: &Instruction,
        operand: &WasmTypeRefOperand,
    ) -> ResolvedOperand {
        match operand {
            WasmTypeRefOperand::Value(t) => ResolvedOperand {
                ty: t.clone(),
                pending: None,
            },
            WasmTypeRefOperand::TypeIndex { input, nullable } => {
                let v = instr.input(*input);
                let t = self.type_of(v);
                match t.wasm_extension() {
                    Some(WasmExtension::TypeDef(def)) => {
                        let id = def.id();
                        self.wasm_types.record_dependency(id);
                        ResolvedOperand {
                            ty: Type::wasm_index_ref(id, *nullable),
                            pending: None,
                        }
                    }
                    Some(WasmExtension::SelfReference) => ResolvedOperand {
                        ty: Type::wasm_self_reference(),
                        pending: Some((v, *nullable)),
                    },
                    other => panic!(
                        "wasm type reference must target a type definition or the \
                         self-reference sentinel (found {other:?})"
                    ),
                }
            }
        }
    }

    fn park_pending(
        &mut self,
        operands: &[ResolvedOperand],
        def: &WasmTypeDefinition,
        slot: fn(usize) -> RefSlot,
    ) {
        for (i, operand) in operands.iter().enumerate() {
            if let Some((sentinel, nullable)) = operand.pending {
                self.wasm_types.add_pending_reference(
                    sentinel,
                    def.shared_description(),
                    slot(i),
                    nullable,
                    def.id(),
                );
            }
        }
    }
}
