//! Recursive Wasm type groups.
//!
//! Type definitions (signatures, arrays, structs) are declared inside type
//! groups and may reference each other, forward targets, or themselves.
//! References to already-defined types resolve immediately and record an
//! inter-group dependency edge. References to the self/forward sentinel are
//! parked as *pending patches*: a slot record pointing into the shared
//! description of the definition under construction. Ending the group fires
//! every remaining patch against its enclosing definition (closing immediate
//! cycles); an explicit forward-reference resolution fires the matching
//! patches early against the named target.

use jsil_ir::Variable;
use jsil_types::{Type, WasmTypeDefId, WasmTypeDefinition, WasmTypeDescription};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

/// One recursive type group: the variables carrying its definitions plus the
/// indices of earlier groups it depends on (transitively).
#[derive(Debug, Default)]
pub(crate) struct WasmTypeGroup {
    variables: Vec<Variable>,
    dependencies: BTreeSet<usize>,
}

impl WasmTypeGroup {
    pub(crate) fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub(crate) fn dependencies(&self) -> &BTreeSet<usize> {
        &self.dependencies
    }
}

/// Where inside a type description a pending reference sits.
#[derive(Debug, Clone, Copy)]
pub(crate) enum RefSlot {
    SignatureParameter(usize),
    SignatureResult(usize),
    ArrayElement,
    StructField(usize),
}

/// A parked self/forward reference: patching it installs an indexed
/// reference to either the enclosing definition (cycle) or a later-named
/// target (forward reference).
pub(crate) struct PendingReference {
    description: Rc<RefCell<WasmTypeDescription>>,
    slot: RefSlot,
    nullable: bool,
    enclosing: WasmTypeDefId,
}

impl PendingReference {
    fn resolve(&self, replacement: Option<WasmTypeDefId>) {
        let target = replacement.unwrap_or(self.enclosing);
        let resolved = Type::wasm_index_ref(target, self.nullable);
        let mut desc = self.description.borrow_mut();
        match (&mut *desc, self.slot) {
            (WasmTypeDescription::Signature { parameters, .. }, RefSlot::SignatureParameter(i)) => {
                parameters[i] = resolved;
            }
            (WasmTypeDescription::Signature { results, .. }, RefSlot::SignatureResult(i)) => {
                results[i] = resolved;
            }
            (WasmTypeDescription::Array { element }, RefSlot::ArrayElement) => {
                element.ty = resolved;
            }
            (WasmTypeDescription::Struct { fields }, RefSlot::StructField(i)) => {
                fields[i].ty = resolved;
            }
            (desc, slot) => panic!("reference slot {slot:?} does not match description {desc:?}"),
        }
    }
}

#[derive(Default)]
pub(crate) struct WasmTypeGroupRegistry {
    groups: Vec<WasmTypeGroup>,
    active: Option<usize>,
    definitions: FxHashMap<WasmTypeDefId, WasmTypeDefinition>,
    definition_group: FxHashMap<WasmTypeDefId, usize>,
    pending: FxHashMap<Variable, Vec<PendingReference>>,
    next_definition_id: u32,
}

impl WasmTypeGroupRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&mut self) {
        assert!(
            self.active.is_none(),
            "cannot reset with an open wasm type group"
        );
        *self = Self::default();
    }

    pub(crate) fn has_active_group(&self) -> bool {
        self.active.is_some()
    }

    pub(crate) fn begin_group(&mut self) {
        assert!(self.active.is_none(), "wasm type groups cannot nest");
        self.groups.push(WasmTypeGroup::default());
        self.active = Some(self.groups.len() - 1);
    }

    /// Ends the active group: every still-pending reference closes its cycle
    /// against its enclosing definition, and the pending registry empties.
    pub(crate) fn end_group(&mut self) {
        assert!(self.active.is_some(), "no open wasm type group to end");
        for (_, patches) in self.pending.drain() {
            for patch in patches {
                patch.resolve(None);
            }
        }
        self.active = None;
    }

    /// Registers a new definition in the active group and returns its
    /// shareable handle.
    pub(crate) fn new_definition(
        &mut self,
        variable: Variable,
        description: WasmTypeDescription,
    ) -> WasmTypeDefinition {
        let group = self.active.expect("type definition outside a type group");
        let id = WasmTypeDefId(self.next_definition_id);
        self.next_definition_id += 1;
        let definition = WasmTypeDefinition::new(id, description);
        self.groups[group].variables.push(variable);
        self.definitions.insert(id, definition.clone());
        self.definition_group.insert(id, group);
        definition
    }

    /// Records that the active group references `id`. References into an
    /// earlier group add that group and its transitive dependencies;
    /// references within the active group add nothing.
    pub(crate) fn record_dependency(&mut self, id: WasmTypeDefId) {
        let Some(active) = self.active else {
            // References outside a group (e.g. ref.null inside a function
            // body) carry no group bookkeeping.
            return;
        };
        let referenced = *self
            .definition_group
            .get(&id)
            .unwrap_or_else(|| panic!("unknown wasm type definition {id}"));
        if referenced == active {
            return;
        }
        assert!(
            referenced < active,
            "dependencies must point at earlier groups"
        );
        let mut inherited = self.groups[referenced].dependencies.clone();
        inherited.insert(referenced);
        self.groups[active].dependencies.extend(inherited);
    }

    /// Parks a reference to the self/forward sentinel `sentinel`.
    pub(crate) fn add_pending_reference(
        &mut self,
        sentinel: Variable,
        description: Rc<RefCell<WasmTypeDescription>>,
        slot: RefSlot,
        nullable: bool,
        enclosing: WasmTypeDefId,
    ) {
        assert!(
            self.active.is_some(),
            "self references can only be recorded inside a type group"
        );
        self.pending.entry(sentinel).or_default().push(PendingReference {
            description,
            slot,
            nullable,
            enclosing,
        });
    }

    /// Resolves a forward reference: every patch parked for `sentinel` is
    /// fired against `target` and removed.
    pub(crate) fn resolve_forward_reference(&mut self, sentinel: Variable, target: WasmTypeDefId) {
        if let Some(patches) = self.pending.remove(&sentinel) {
            for patch in patches {
                patch.resolve(Some(target));
            }
        }
    }

    pub(crate) fn lookup(&self, id: WasmTypeDefId) -> Option<&WasmTypeDefinition> {
        self.definitions.get(&id)
    }

    pub(crate) fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub(crate) fn group(&self, index: usize) -> &WasmTypeGroup {
        &self.groups[index]
    }
}
