//! Wasm type descriptions.
//!
//! Wasm entities (globals, memories, tables, tags, function definitions,
//! reference values, and recursive type definitions) surface in the lattice
//! as object types carrying a `WasmExtension`. Type definitions are shared,
//! mutable descriptions compared by id: indexed reference types carry only a
//! `WasmTypeDefId`, so cyclic type graphs never form `Rc` cycles, while the
//! shared `RefCell` is what self-reference resolution patches after the fact.

use crate::types::Type;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// Identity of a Wasm type definition. Ids are assigned by the analyzer's
/// type-group registry and are unique within one analyzer lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WasmTypeDefId(pub u32);

impl fmt::Display for WasmTypeDefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// The abstract heap types of the reference type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WasmAbstractHeapType {
    Func,
    Extern,
    Any,
    Eq,
    I31,
    Struct,
    Array,
    None,
    NoFunc,
    NoExtern,
    Exn,
}

/// What a reference type points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WasmRefKind {
    Abstract(WasmAbstractHeapType),
    Index(WasmTypeDefId),
}

/// A struct field or array element: a storage type plus mutability.
#[derive(Debug, Clone, PartialEq)]
pub struct WasmFieldType {
    pub ty: Type,
    pub mutable: bool,
}

/// The payload of a concrete type definition.
#[derive(Debug, Clone, PartialEq)]
pub enum WasmTypeDescription {
    Signature {
        parameters: Vec<Type>,
        results: Vec<Type>,
    },
    Array {
        element: WasmFieldType,
    },
    Struct {
        fields: Vec<WasmFieldType>,
    },
}

/// A by-id handle onto a shared, patchable type description.
#[derive(Clone)]
pub struct WasmTypeDefinition {
    id: WasmTypeDefId,
    desc: Rc<RefCell<WasmTypeDescription>>,
}

impl WasmTypeDefinition {
    #[must_use]
    pub fn new(id: WasmTypeDefId, desc: WasmTypeDescription) -> Self {
        Self {
            id,
            desc: Rc::new(RefCell::new(desc)),
        }
    }

    #[must_use]
    pub fn id(&self) -> WasmTypeDefId {
        self.id
    }

    #[must_use]
    pub fn description(&self) -> Ref<'_, WasmTypeDescription> {
        self.desc.borrow()
    }

    /// Shared access for post-construction patching (self-reference closure).
    #[must_use]
    pub fn shared_description(&self) -> Rc<RefCell<WasmTypeDescription>> {
        Rc::clone(&self.desc)
    }
}

// Identity is the id; the description is shared mutable state and must not
// participate (it may be cyclic through indexed references).
impl PartialEq for WasmTypeDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for WasmTypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WasmTypeDefinition").field(&self.id).finish()
    }
}

/// Parameters and results of a Wasm function, block, or tag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WasmSignature {
    pub parameters: Vec<Type>,
    pub results: Vec<Type>,
}

impl WasmSignature {
    #[must_use]
    pub fn new(parameters: Vec<Type>, results: Vec<Type>) -> Self {
        Self { parameters, results }
    }
}

impl fmt::Display for WasmSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, "] -> [")?;
        for (i, r) in self.results.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{r}")?;
        }
        write!(f, "]")
    }
}

/// The Wasm-specific attributes a type can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum WasmExtension {
    /// A `WebAssembly.Global` or module-defined global.
    Global { value_type: Type, mutable: bool },
    /// A table of reference values.
    Table { element_type: Type },
    /// A linear memory.
    Memory { is_memory64: bool, is_shared: bool },
    /// An exception tag.
    Tag { parameters: Vec<Type> },
    /// A function defined inside a Wasm module.
    FunctionDef { signature: WasmSignature },
    /// A reference value.
    Ref { kind: WasmRefKind, nullable: bool },
    /// A concrete type definition (signature, array, or struct).
    TypeDef(WasmTypeDefinition),
    /// The sentinel standing in for "the type currently being defined" (or a
    /// forward reference to a later definition) until the cycle is closed.
    SelfReference,
    /// A branch target; `parameters` are the types a branch must supply.
    Label { parameters: Vec<Type> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_definitions_compare_by_id() {
        let a = WasmTypeDefinition::new(
            WasmTypeDefId(0),
            WasmTypeDescription::Array {
                element: WasmFieldType {
                    ty: Type::WASM_I32,
                    mutable: true,
                },
            },
        );
        let b = WasmTypeDefinition::new(
            WasmTypeDefId(0),
            WasmTypeDescription::Struct { fields: vec![] },
        );
        let c = WasmTypeDefinition::new(
            WasmTypeDefId(1),
            WasmTypeDescription::Struct { fields: vec![] },
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_patching_through_the_shared_description() {
        let def = WasmTypeDefinition::new(
            WasmTypeDefId(3),
            WasmTypeDescription::Struct {
                fields: vec![WasmFieldType {
                    ty: Type::wasm_self_reference(),
                    mutable: false,
                }],
            },
        );
        {
            let shared = def.shared_description();
            let mut desc = shared.borrow_mut();
            if let WasmTypeDescription::Struct { fields } = &mut *desc {
                fields[0].ty = Type::wasm_index_ref(WasmTypeDefId(3), true);
            }
        }
        match &*def.description() {
            WasmTypeDescription::Struct { fields } => {
                assert_eq!(
                    fields[0].ty,
                    Type::wasm_index_ref(WasmTypeDefId(3), true)
                );
            }
            other => panic!("unexpected description {other:?}"),
        }
    }
}
