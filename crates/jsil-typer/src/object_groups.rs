//! Dynamic object groups.
//!
//! Object literals, class definitions, and Wasm modules grow their shapes
//! incrementally while the analyzer walks their bodies. An in-progress group
//! lives on a stack and is mutable; finalization freezes it into a registry
//! of nominal types looked up by group name. Group names are allocated from
//! a monotone counter, so active and finalized names never collide.
//!
//! For Wasm modules the manager additionally tracks which module-level
//! entities (globals, tables, memories, tags, functions) have been observed,
//! assigns each a stable export name, and mirrors it as a property or method
//! on the module's `exports` group.

use indexmap::IndexMap;
use jsil_ir::Variable;
use jsil_types::{Parameter, ParameterList, Signature, Type, WasmSignature};
use rustc_hash::FxHashSet;

// =============================================================================
// Groups
// =============================================================================

/// A nominal record of an object's properties and method overloads.
#[derive(Debug, Clone)]
pub(crate) struct ObjectGroup {
    name: String,
    properties: IndexMap<String, Type>,
    methods: IndexMap<String, Vec<Signature>>,
}

impl ObjectGroup {
    fn new(name: String) -> Self {
        Self {
            name,
            properties: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// The nominal object type for this group: an `object` atom carrying the
    /// group name and exactly the current property/method key sets.
    pub(crate) fn instance_type(&self) -> Type {
        Type::object_of_group(
            self.name.clone(),
            self.properties.keys().cloned(),
            self.methods.keys().cloned(),
        )
    }

    /// Adds a property. Membership is idempotent; the type map is
    /// last-writer-wins, and an absent type records `⊤`.
    pub(crate) fn add_property(&mut self, name: &str, t: Option<Type>) {
        match self.properties.get_mut(name) {
            Some(slot) => {
                if let Some(t) = t {
                    *slot = t;
                }
            }
            None => {
                self.properties
                    .insert(name.to_string(), t.unwrap_or(Type::ANYTHING));
            }
        }
    }

    pub(crate) fn update_property_type(&mut self, name: &str, t: Type) {
        let slot = self
            .properties
            .get_mut(name)
            .unwrap_or_else(|| panic!("group {} has no property {name}", self.name));
        *slot = t;
    }

    pub(crate) fn add_method(&mut self, name: &str) {
        self.methods.entry(name.to_string()).or_default();
    }

    /// Appends an overload; methods accumulate signatures, they are never
    /// replaced.
    pub(crate) fn append_method_signature(&mut self, name: &str, signature: Signature) {
        let overloads = self
            .methods
            .get_mut(name)
            .unwrap_or_else(|| panic!("group {} has no method {name}", self.name));
        overloads.push(signature);
    }

    pub(crate) fn property_type(&self, name: &str) -> Option<&Type> {
        self.properties.get(name)
    }

    pub(crate) fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub(crate) fn method_signatures(&self, name: &str) -> Option<&[Signature]> {
        self.methods.get(name).map(Vec::as_slice)
    }
}

// =============================================================================
// Classes
// =============================================================================

/// An in-progress class definition: the instance-side group plus the
/// constructor-side group capturing static members.
#[derive(Debug)]
pub(crate) struct ClassDefinition {
    pub(crate) output: Variable,
    pub(crate) constructor_parameters: ParameterList,
    pub(crate) super_instance_type: Type,
    pub(crate) super_constructor_type: Type,
    pub(crate) instance_group: ObjectGroup,
    pub(crate) constructor_group: ObjectGroup,
}

/// What remains of a class once both of its groups are finalized.
pub(crate) struct FinalizedClass {
    pub(crate) output: Variable,
    pub(crate) constructor_parameters: ParameterList,
    pub(crate) instance_type: Type,
    pub(crate) constructor_instance_type: Type,
}

// =============================================================================
// Wasm module tracking
// =============================================================================

/// Module-level entity kinds that surface on the `exports` object as
/// properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WasmEntityKind {
    Global,
    Table,
    Memory,
    Tag,
}

impl WasmEntityKind {
    fn prefixes(self) -> (&'static str, &'static str) {
        match self {
            WasmEntityKind::Global => ("wg", "iwg"),
            WasmEntityKind::Table => ("wt", "iwt"),
            WasmEntityKind::Memory => ("wm", "iwm"),
            WasmEntityKind::Tag => ("wex", "iwex"),
        }
    }
}

#[derive(Debug, Default)]
struct WasmEntityList {
    defined: Vec<Variable>,
    imported: Vec<Variable>,
}

#[derive(Debug)]
struct WasmModuleTracking {
    exports_group: String,
    globals: WasmEntityList,
    tables: WasmEntityList,
    memories: WasmEntityList,
    tags: WasmEntityList,
    function_definitions: Vec<Variable>,
    function_imports: Vec<(Variable, WasmSignature)>,
    seen: FxHashSet<Variable>,
}

impl WasmModuleTracking {
    fn new(exports_group: String) -> Self {
        Self {
            exports_group,
            globals: WasmEntityList::default(),
            tables: WasmEntityList::default(),
            memories: WasmEntityList::default(),
            tags: WasmEntityList::default(),
            function_definitions: Vec::new(),
            function_imports: Vec::new(),
            seen: FxHashSet::default(),
        }
    }

    fn list_mut(&mut self, kind: WasmEntityKind) -> &mut WasmEntityList {
        match kind {
            WasmEntityKind::Global => &mut self.globals,
            WasmEntityKind::Table => &mut self.tables,
            WasmEntityKind::Memory => &mut self.memories,
            WasmEntityKind::Tag => &mut self.tags,
        }
    }
}

/// A Wasm function signature rendered as a JS-side callable interface, as it
/// appears on the `exports` object.
fn exported_function_signature(signature: &WasmSignature) -> Signature {
    Signature::new(
        signature.parameters.iter().cloned().map(Parameter::Plain),
        signature
            .results
            .first()
            .cloned()
            .unwrap_or(Type::UNDEFINED),
    )
}

// =============================================================================
// The manager
// =============================================================================

#[derive(Debug)]
pub(crate) struct ObjectGroupManager {
    /// In-progress literals and Wasm module/exports groups, innermost last.
    active: Vec<ObjectGroup>,
    /// In-progress class definitions, innermost last.
    classes: Vec<ClassDefinition>,
    finalized: IndexMap<String, ObjectGroup>,
    wasm_modules: Vec<WasmModuleTracking>,
    next_group_id: usize,
}

impl ObjectGroupManager {
    pub(crate) fn new() -> Self {
        Self {
            active: Vec::new(),
            classes: Vec::new(),
            finalized: IndexMap::new(),
            wasm_modules: Vec::new(),
            next_group_id: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    /// Whether every literal, class, and Wasm module has been closed.
    pub(crate) fn is_quiescent(&self) -> bool {
        self.active.is_empty() && self.classes.is_empty() && self.wasm_modules.is_empty()
    }

    fn fresh_name(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.next_group_id);
        self.next_group_id += 1;
        name
    }

    // =========================================================================
    // Object literals
    // =========================================================================

    /// Opens a new object literal group and yields its initial instance type.
    pub(crate) fn create_object_literal(&mut self) -> Type {
        let name = self.fresh_name("o");
        let group = ObjectGroup::new(name);
        let t = group.instance_type();
        self.active.push(group);
        t
    }

    /// The innermost active (non-class) group.
    pub(crate) fn current_group_mut(&mut self) -> &mut ObjectGroup {
        self.active.last_mut().expect("no active object group")
    }

    pub(crate) fn current_group(&self) -> &ObjectGroup {
        self.active.last().expect("no active object group")
    }

    /// Pops and freezes the innermost active group, returning its nominal
    /// instance type.
    pub(crate) fn finalize_current(&mut self) -> Type {
        let group = self.active.pop().expect("no active object group to finalize");
        self.finalize_group(group)
    }

    fn finalize_group(&mut self, group: ObjectGroup) -> Type {
        let t = group.instance_type();
        tracing::debug!(group = %group.name(), instance_type = %t, "object group finalized");
        let previous = self.finalized.insert(group.name.clone(), group);
        assert!(
            previous.is_none(),
            "finalized object group names must be unique"
        );
        t
    }

    // =========================================================================
    // Classes
    // =========================================================================

    /// Opens a class definition. The instance group starts out seeded with
    /// the superclass's properties and methods.
    pub(crate) fn create_class(
        &mut self,
        output: Variable,
        super_instance_type: Type,
        super_constructor_type: Type,
        inherited_properties: Vec<(String, Type)>,
        inherited_methods: Vec<(String, Vec<Signature>)>,
    ) -> Type {
        let name = self.fresh_name("c");
        let mut instance_group = ObjectGroup::new(name.clone());
        for (prop, t) in inherited_properties {
            instance_group.add_property(&prop, Some(t));
        }
        for (method, overloads) in inherited_methods {
            instance_group.add_method(&method);
            for sig in overloads {
                instance_group.append_method_signature(&method, sig);
            }
        }
        let constructor_group = ObjectGroup::new(format!("{name}.constructor"));
        let t = instance_group.instance_type();
        self.classes.push(ClassDefinition {
            output,
            constructor_parameters: ParameterList::new(),
            super_instance_type,
            super_constructor_type,
            instance_group,
            constructor_group,
        });
        t
    }

    pub(crate) fn current_class(&self) -> Option<&ClassDefinition> {
        self.classes.last()
    }

    pub(crate) fn current_class_mut(&mut self) -> &mut ClassDefinition {
        self.classes.last_mut().expect("no active class definition")
    }

    /// Closes the innermost class definition, freezing both of its groups.
    pub(crate) fn finalize_class(&mut self) -> FinalizedClass {
        let class = self.classes.pop().expect("no active class definition");
        let instance_type = self.finalize_group(class.instance_group);
        let constructor_instance_type = self.finalize_group(class.constructor_group);
        FinalizedClass {
            output: class.output,
            constructor_parameters: class.constructor_parameters,
            instance_type,
            constructor_instance_type,
        }
    }

    // =========================================================================
    // Group lookup
    // =========================================================================

    /// Finds a group by name: active groups innermost-first, then active
    /// class instance and constructor groups, then finalized groups. The
    /// search order is what lets a method body refer to its own class
    /// mid-definition.
    pub(crate) fn get_group(&self, name: &str) -> Option<&ObjectGroup> {
        if let Some(group) = self.active.iter().rev().find(|g| g.name() == name) {
            return Some(group);
        }
        for class in self.classes.iter().rev() {
            if class.instance_group.name() == name {
                return Some(&class.instance_group);
            }
            if class.constructor_group.name() == name {
                return Some(&class.constructor_group);
            }
        }
        self.finalized.get(name)
    }

    // =========================================================================
    // Wasm modules
    // =========================================================================

    /// Opens a Wasm module: one group for the module object and one for its
    /// `exports` namespace.
    pub(crate) fn create_wasm_module(&mut self) {
        let name = self.fresh_name("wasm");
        let module_group = ObjectGroup::new(name.clone());
        let exports_group = ObjectGroup::new(format!("{name}.exports"));
        self.wasm_modules
            .push(WasmModuleTracking::new(exports_group.name.clone()));
        self.active.push(module_group);
        self.active.push(exports_group);
    }

    /// Closes the innermost Wasm module: finalizes the exports group,
    /// attaches it as the module's `exports` property, finalizes the module
    /// group, and returns the module's instance type.
    pub(crate) fn finalize_wasm_module(&mut self) -> Type {
        let tracking = self.wasm_modules.pop().expect("no active wasm module");
        let exports = self.active.pop().expect("missing exports group");
        assert_eq!(
            exports.name(),
            tracking.exports_group,
            "group stack out of sync with wasm module tracking"
        );
        let exports_type = self.finalize_group(exports);
        let module = self
            .active
            .last_mut()
            .expect("missing wasm module group");
        module.add_property("exports", Some(exports_type));
        let module = self.active.pop().expect("checked above");
        self.finalize_group(module)
    }

    /// Records the first observation of a module-level entity, assigning its
    /// export name and mirroring it as a property on the `exports` group.
    pub(crate) fn note_wasm_entity(
        &mut self,
        v: Variable,
        kind: WasmEntityKind,
        imported: bool,
        entity_type: Type,
    ) {
        let Self {
            active,
            wasm_modules,
            ..
        } = self;
        let tracking = wasm_modules.last_mut().expect("no active wasm module");
        if !tracking.seen.insert(v) {
            return;
        }
        let list = tracking.list_mut(kind);
        let (defined_prefix, imported_prefix) = kind.prefixes();
        let name = if imported {
            let name = format!("{imported_prefix}{}", list.imported.len());
            list.imported.push(v);
            name
        } else {
            let name = format!("{defined_prefix}{}", list.defined.len());
            list.defined.push(v);
            name
        };
        tracing::debug!(variable = %v, export = %name, "wasm entity registered");
        let exports = active
            .iter_mut()
            .rev()
            .find(|g| g.name == tracking.exports_group)
            .expect("exports group missing from active stack");
        exports.add_property(&name, Some(entity_type));
    }

    /// Records a function defined by the current module as an exported
    /// method `w<N>`.
    pub(crate) fn note_wasm_function_definition(&mut self, v: Variable, signature: &WasmSignature) {
        let Self {
            active,
            wasm_modules,
            ..
        } = self;
        let tracking = wasm_modules.last_mut().expect("no active wasm module");
        if !tracking.seen.insert(v) {
            return;
        }
        let name = format!("w{}", tracking.function_definitions.len());
        tracking.function_definitions.push(v);
        let exports = active
            .iter_mut()
            .rev()
            .find(|g| g.name == tracking.exports_group)
            .expect("exports group missing from active stack");
        exports.add_method(&name);
        exports.append_method_signature(&name, exported_function_signature(signature));
    }

    /// Records a JS function imported under the given signature. One
    /// function may be imported under several signatures, so deduplication
    /// is by `(variable, signature)` pair.
    pub(crate) fn note_wasm_function_import(&mut self, v: Variable, signature: &WasmSignature) {
        let Self {
            active,
            wasm_modules,
            ..
        } = self;
        let tracking = wasm_modules.last_mut().expect("no active wasm module");
        if tracking
            .function_imports
            .iter()
            .any(|(seen, sig)| *seen == v && sig == signature)
        {
            return;
        }
        let name = format!("iw{}", tracking.function_imports.len());
        tracking.function_imports.push((v, signature.clone()));
        let exports = active
            .iter_mut()
            .rev()
            .find(|g| g.name == tracking.exports_group)
            .expect("exports group missing from active stack");
        exports.add_method(&name);
        exports.append_method_signature(&name, exported_function_signature(signature));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(n: u32) -> Variable {
        Variable::new(n)
    }

    #[test]
    fn test_literal_lifecycle() {
        let mut m = ObjectGroupManager::new();
        let initial = m.create_object_literal();
        let group_name = initial.group().unwrap().to_string();
        m.current_group_mut().add_property("a", Some(Type::INTEGER));
        m.current_group_mut().add_method("m");
        // Mid-definition lookup sees the active group.
        assert!(m.get_group(&group_name).is_some());
        let t = m.finalize_current();
        assert_eq!(t.group(), Some(group_name.as_str()));
        assert!(t.has_property("a"));
        assert!(t.has_method("m"));
        // Still resolvable after finalization.
        assert_eq!(
            m.get_group(&group_name).unwrap().property_type("a"),
            Some(&Type::INTEGER)
        );
    }

    #[test]
    fn test_property_type_is_last_writer_wins() {
        let mut m = ObjectGroupManager::new();
        m.create_object_literal();
        m.current_group_mut().add_property("a", Some(Type::INTEGER));
        m.current_group_mut().add_property("a", Some(Type::STRING));
        assert_eq!(
            m.current_group().property_type("a"),
            Some(&Type::STRING)
        );
        m.current_group_mut().add_property("a", None);
        // Membership is idempotent and an absent type does not overwrite.
        assert_eq!(
            m.current_group().property_type("a"),
            Some(&Type::STRING)
        );
        m.finalize_current();
    }

    #[test]
    fn test_group_names_are_unique() {
        let mut m = ObjectGroupManager::new();
        let a = m.create_object_literal();
        m.finalize_current();
        let b = m.create_object_literal();
        m.finalize_current();
        assert_ne!(a.group(), b.group());
    }

    #[test]
    fn test_class_groups() {
        let mut m = ObjectGroupManager::new();
        let instance = m.create_class(
            v(0),
            Type::object(),
            Type::ANYTHING,
            vec![("inherited".into(), Type::FLOAT)],
            vec![],
        );
        assert!(instance.has_property("inherited"));
        m.current_class_mut()
            .instance_group
            .add_property("x", None);
        m.current_class_mut()
            .constructor_group
            .add_property("version", Some(Type::INTEGER));
        let done = m.finalize_class();
        assert_eq!(done.output, v(0));
        assert!(done.instance_type.has_property("x"));
        assert!(done.constructor_instance_type.has_property("version"));
        assert!(m.is_quiescent());
    }

    #[test]
    fn test_wasm_module_exports() {
        let mut m = ObjectGroupManager::new();
        m.create_wasm_module();
        m.note_wasm_entity(
            v(1),
            WasmEntityKind::Global,
            false,
            Type::wasm_global(Type::WASM_I32, true),
        );
        m.note_wasm_entity(
            v(2),
            WasmEntityKind::Global,
            true,
            Type::wasm_global(Type::WASM_I64, false),
        );
        // Re-observing the same variable is a no-op.
        m.note_wasm_entity(
            v(1),
            WasmEntityKind::Global,
            false,
            Type::wasm_global(Type::WASM_I32, true),
        );
        let sig = WasmSignature::new(vec![Type::WASM_I32], vec![Type::WASM_I32]);
        m.note_wasm_function_definition(v(3), &sig);
        m.note_wasm_function_import(v(4), &sig);
        m.note_wasm_function_import(v(4), &sig); // deduplicated
        let module_type = m.finalize_wasm_module();
        assert!(module_type.has_property("exports"));
        let exports_name = format!("{}.exports", module_type.group().unwrap());
        let exports = m.get_group(&exports_name).unwrap();
        assert!(exports.has_property("wg0"));
        assert!(exports.has_property("iwg0"));
        assert_eq!(exports.method_signatures("w0").unwrap().len(), 1);
        assert_eq!(exports.method_signatures("iw0").unwrap().len(), 1);
        assert!(exports.method_signatures("iw1").is_none());
    }

    #[test]
    #[should_panic(expected = "has no method")]
    fn test_signature_update_requires_membership() {
        let mut m = ObjectGroupManager::new();
        m.create_object_literal();
        m.current_group_mut()
            .append_method_signature("missing", Signature::universal());
    }
}
