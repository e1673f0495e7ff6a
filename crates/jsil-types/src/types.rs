//! The lattice element.
//!
//! A `Type` carries two atom sets plus optional structural payloads:
//!
//! - the *definite* set: atoms the value certainly has, all at once. A plain
//!   class object is definitely `object`; a class constructor produced by
//!   `EndClassDefinition` is definitely `object + constructor`.
//! - the *possible* set: the union of atoms the value may turn out to be.
//!   `integer ∨ string` has an empty definite set and `{integer, string}`
//!   possible.
//!
//! `⊤` ("anything") is the pair (∅, all); `⊥` ("nothing") is (∅, ∅). Union
//! intersects definite sets and unions possible sets; the capability sum
//! (`intersection_with`) unions both. Subsumption compares both sets plus
//! the structural extensions.
//!
//! Every operation is total. `⊥` exists purely as the analyzer's internal
//! "absent in this scope" marker and behaves as the union identity.

use crate::extension::TypeExtension;
use crate::flags::TypeFlags;
use crate::signature::Signature;
use crate::wasm::{
    WasmAbstractHeapType, WasmExtension, WasmRefKind, WasmSignature, WasmTypeDefId,
    WasmTypeDefinition,
};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    definite: TypeFlags,
    possible: TypeFlags,
    ext: Option<Rc<TypeExtension>>,
    wasm: Option<Rc<WasmExtension>>,
}

impl Type {
    // =========================================================================
    // Distinguished values and primitive atoms
    // =========================================================================

    /// `⊥`: no value has this type. Internal to the analyzer.
    pub const NOTHING: Type = Type::from_flags(TypeFlags::empty(), TypeFlags::empty());
    /// `⊤`: the unknown JS value.
    pub const ANYTHING: Type = Type::from_flags(TypeFlags::empty(), TypeFlags::all());

    pub const UNDEFINED: Type = Type::atom(TypeFlags::UNDEFINED);
    pub const NULL: Type = Type::atom(TypeFlags::NULL);
    pub const BOOLEAN: Type = Type::atom(TypeFlags::BOOLEAN);
    pub const STRING: Type = Type::atom(TypeFlags::STRING);
    pub const INTEGER: Type = Type::atom(TypeFlags::INTEGER);
    pub const FLOAT: Type = Type::atom(TypeFlags::FLOAT);
    pub const BIGINT: Type = Type::atom(TypeFlags::BIGINT);
    pub const REGEXP: Type = Type::atom(TypeFlags::REGEXP);
    pub const ITERABLE: Type = Type::atom(TypeFlags::ITERABLE);

    /// `integer ∨ float`.
    pub const NUMBER: Type = Type::from_flags(TypeFlags::empty(), TypeFlags::NUMBER);
    /// `number ∨ bigint ∨ string ∨ boolean ∨ undefined ∨ null`.
    pub const PRIMITIVE: Type = Type::from_flags(TypeFlags::empty(), TypeFlags::PRIMITIVE);

    pub const WASM_I32: Type = Type::atom(TypeFlags::WASM_I32);
    pub const WASM_I64: Type = Type::atom(TypeFlags::WASM_I64);
    pub const WASM_F32: Type = Type::atom(TypeFlags::WASM_F32);
    pub const WASM_F64: Type = Type::atom(TypeFlags::WASM_F64);
    pub const WASM_SIMD128: Type = Type::atom(TypeFlags::WASM_SIMD128);
    pub const WASM_EXNREF: Type = Type::atom(TypeFlags::WASM_EXNREF);
    /// The extra inner output of an exception-catching block.
    pub const WASM_EXCEPTION_LABEL: Type = Type::atom(TypeFlags::WASM_EXCEPTION_LABEL);

    const fn from_flags(definite: TypeFlags, possible: TypeFlags) -> Type {
        Type {
            definite,
            possible,
            ext: None,
            wasm: None,
        }
    }

    const fn atom(flags: TypeFlags) -> Type {
        Type::from_flags(flags, flags)
    }

    // =========================================================================
    // Structured constructors
    // =========================================================================

    /// A plain object with no known structure.
    #[must_use]
    pub fn object() -> Type {
        Type::atom(TypeFlags::OBJECT)
    }

    /// An object with known property and method names.
    #[must_use]
    pub fn object_with<P, M>(properties: P, methods: M) -> Type
    where
        P: IntoIterator,
        P::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Type::atom(TypeFlags::OBJECT).replacing_ext(TypeExtension {
            properties: properties.into_iter().map(Into::into).collect(),
            methods: methods.into_iter().map(Into::into).collect(),
            ..TypeExtension::default()
        })
    }

    /// An object belonging to the named nominal group.
    #[must_use]
    pub fn object_of_group<P, M>(group: impl Into<String>, properties: P, methods: M) -> Type
    where
        P: IntoIterator,
        P::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Type::atom(TypeFlags::OBJECT).replacing_ext(TypeExtension {
            properties: properties.into_iter().map(Into::into).collect(),
            methods: methods.into_iter().map(Into::into).collect(),
            group: Some(group.into()),
            ..TypeExtension::default()
        })
    }

    /// A callable value, optionally with a known signature.
    #[must_use]
    pub fn function(signature: Option<Signature>) -> Type {
        Type::atom(TypeFlags::FUNCTION).replacing_ext(TypeExtension {
            call_signature: signature,
            ..TypeExtension::default()
        })
    }

    /// A constructible value, optionally with a known construct signature.
    #[must_use]
    pub fn constructor(signature: Option<Signature>) -> Type {
        Type::atom(TypeFlags::CONSTRUCTOR).replacing_ext(TypeExtension {
            construct_signature: signature,
            ..TypeExtension::default()
        })
    }

    /// A plain JS function: callable and constructible with the same
    /// signature.
    #[must_use]
    pub fn function_and_constructor(signature: Option<Signature>) -> Type {
        Type::atom(TypeFlags::FUNCTION.union(TypeFlags::CONSTRUCTOR)).replacing_ext(
            TypeExtension {
                call_signature: signature.clone(),
                construct_signature: signature,
                ..TypeExtension::default()
            },
        )
    }

    /// A string constant with a nominal name (enum-like string values).
    #[must_use]
    pub fn named_string(name: impl Into<String>) -> Type {
        Type::atom(TypeFlags::STRING).replacing_ext(TypeExtension::of_group(name))
    }

    // =========================================================================
    // Wasm constructors
    // =========================================================================

    #[must_use]
    pub fn wasm_ref(kind: WasmRefKind, nullable: bool) -> Type {
        Type::atom(TypeFlags::WASM_REF).replacing_wasm(WasmExtension::Ref { kind, nullable })
    }

    #[must_use]
    pub fn wasm_abstract_ref(heap: WasmAbstractHeapType, nullable: bool) -> Type {
        Type::wasm_ref(WasmRefKind::Abstract(heap), nullable)
    }

    #[must_use]
    pub fn wasm_index_ref(id: WasmTypeDefId, nullable: bool) -> Type {
        Type::wasm_ref(WasmRefKind::Index(id), nullable)
    }

    #[must_use]
    pub fn wasm_funcref() -> Type {
        Type::wasm_abstract_ref(WasmAbstractHeapType::Func, true)
    }

    #[must_use]
    pub fn wasm_global(value_type: Type, mutable: bool) -> Type {
        Type::object().replacing_wasm(WasmExtension::Global {
            value_type,
            mutable,
        })
    }

    #[must_use]
    pub fn wasm_table(element_type: Type) -> Type {
        Type::object().replacing_wasm(WasmExtension::Table { element_type })
    }

    #[must_use]
    pub fn wasm_memory(is_memory64: bool, is_shared: bool) -> Type {
        Type::object().replacing_wasm(WasmExtension::Memory {
            is_memory64,
            is_shared,
        })
    }

    #[must_use]
    pub fn wasm_tag(parameters: Vec<Type>) -> Type {
        Type::object().replacing_wasm(WasmExtension::Tag { parameters })
    }

    #[must_use]
    pub fn wasm_function_def(signature: WasmSignature) -> Type {
        Type::object().replacing_wasm(WasmExtension::FunctionDef { signature })
    }

    #[must_use]
    pub fn wasm_type_def(definition: WasmTypeDefinition) -> Type {
        Type::object().replacing_wasm(WasmExtension::TypeDef(definition))
    }

    /// The sentinel produced by a forward-or-self-reference definition.
    #[must_use]
    pub fn wasm_self_reference() -> Type {
        Type::object().replacing_wasm(WasmExtension::SelfReference)
    }

    /// A branch target expecting the given value types.
    #[must_use]
    pub fn wasm_label(parameters: Vec<Type>) -> Type {
        Type::atom(TypeFlags::WASM_LABEL).replacing_wasm(WasmExtension::Label { parameters })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    #[must_use]
    pub fn is_nothing(&self) -> bool {
        self.possible.is_empty() && self.ext.is_none() && self.wasm.is_none()
    }

    #[must_use]
    pub fn is_anything(&self) -> bool {
        self.definite.is_empty()
            && self.possible == TypeFlags::all()
            && self.ext.is_none()
            && self.wasm.is_none()
    }

    /// Whether `self` generalizes `other`: every value of type `other` is
    /// also a value of type `self`. This is `other ⊑ self`.
    #[must_use]
    pub fn subsumes(&self, other: &Type) -> bool {
        if other.is_nothing() {
            return true;
        }
        if self.is_nothing() {
            return false;
        }
        let empty = TypeExtension::default();
        let ext_ok = self
            .ext
            .as_deref()
            .unwrap_or(&empty)
            .subsumes(other.ext.as_deref().unwrap_or(&empty));
        let wasm_ok = match (&self.wasm, &other.wasm) {
            (None, _) => true,
            (Some(a), Some(b)) => a == b,
            (Some(_), None) => false,
        };
        self.definite.intersection(other.definite) == self.definite
            && other.possible.intersection(self.possible) == other.possible
            && ext_ok
            && wasm_ok
    }

    /// `self ⊑ other`.
    #[must_use]
    pub fn is_a(&self, other: &Type) -> bool {
        other.subsumes(self)
    }

    /// Whether a value of this type could be a value of `other` (the
    /// possible atom sets overlap).
    #[must_use]
    pub fn may_be(&self, other: &Type) -> bool {
        self.possible.intersects(other.possible)
    }

    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.ext.as_deref().and_then(|e| e.group.as_deref())
    }

    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.ext
            .as_deref()
            .is_some_and(|e| e.properties.contains(name))
    }

    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.ext.as_deref().is_some_and(|e| e.methods.contains(name))
    }

    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.ext
            .as_deref()
            .into_iter()
            .flat_map(|e| e.properties.iter().map(String::as_str))
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.ext
            .as_deref()
            .into_iter()
            .flat_map(|e| e.methods.iter().map(String::as_str))
    }

    #[must_use]
    pub fn call_signature(&self) -> Option<&Signature> {
        self.ext.as_deref().and_then(|e| e.call_signature.as_ref())
    }

    #[must_use]
    pub fn construct_signature(&self) -> Option<&Signature> {
        self.ext
            .as_deref()
            .and_then(|e| e.construct_signature.as_ref())
    }

    #[must_use]
    pub fn wasm_extension(&self) -> Option<&WasmExtension> {
        self.wasm.as_deref()
    }

    // =========================================================================
    // Lattice operations
    // =========================================================================

    /// Union `∨`: the type of a value that is either `self` or `other`.
    #[must_use]
    pub fn union_with(&self, other: &Type) -> Type {
        // ⊥ is the union identity.
        if self.is_nothing() {
            return other.clone();
        }
        if other.is_nothing() || self == other {
            return self.clone();
        }
        let ext = if self.ext.is_none() && other.ext.is_none() {
            None
        } else {
            let a = self.ext.as_deref().cloned().unwrap_or_default();
            let b = other.ext.as_deref().cloned().unwrap_or_default();
            Some(TypeExtension::union(&a, &b))
        };
        let wasm = match (&self.wasm, &other.wasm) {
            (Some(a), Some(b)) if a == b => Some(Rc::clone(a)),
            _ => None,
        };
        Type {
            definite: self.definite.intersection(other.definite),
            possible: self.possible.union(other.possible),
            ext: ext.filter(|e| !e.is_empty()).map(Rc::new),
            wasm,
        }
    }

    /// Union of arbitrarily many types; `⊥` for an empty sequence.
    #[must_use]
    pub fn union_all<'a>(types: impl IntoIterator<Item = &'a Type>) -> Type {
        types
            .into_iter()
            .fold(Type::NOTHING, |acc, t| acc.union_with(t))
    }

    /// Intersection `∧`: the type of a value that is both `self` and
    /// `other` at once (e.g. `object ∧ constructor` for class variables).
    /// Structure is summed; where both sides carry a group or signature, the
    /// left side wins.
    #[must_use]
    pub fn intersection_with(&self, other: &Type) -> Type {
        if self.is_nothing() {
            return other.clone();
        }
        if other.is_nothing() || self == other {
            return self.clone();
        }
        let ext = if self.ext.is_none() && other.ext.is_none() {
            None
        } else {
            let a = self.ext.as_deref().cloned().unwrap_or_default();
            let b = other.ext.as_deref().cloned().unwrap_or_default();
            Some(TypeExtension::intersection(&a, &b))
        };
        Type {
            definite: self.definite.union(other.definite),
            possible: self.possible.union(other.possible),
            ext: ext.filter(|e| !e.is_empty()).map(Rc::new),
            wasm: self.wasm.clone().or_else(|| other.wasm.clone()),
        }
    }

    // =========================================================================
    // Structural operations
    // =========================================================================

    /// A copy of this type that additionally has the named property. Leaves
    /// the nominal group only when the name was already part of it.
    #[must_use]
    pub fn adding_property(&self, name: &str) -> Type {
        self.modify_ext(|e| {
            if !e.properties.contains(name) {
                e.group = None;
                e.properties.insert(name.to_string());
            }
        })
    }

    /// A copy of this type without the named property. Removal changes the
    /// shape, so it also widens away from the nominal group.
    #[must_use]
    pub fn removing_property(&self, name: &str) -> Type {
        self.modify_ext(|e| {
            if e.properties.shift_remove(name) {
                e.group = None;
            }
        })
    }

    #[must_use]
    pub fn adding_method(&self, name: &str) -> Type {
        self.modify_ext(|e| {
            if !e.methods.contains(name) {
                e.group = None;
                e.methods.insert(name.to_string());
            }
        })
    }

    #[must_use]
    pub fn removing_method(&self, name: &str) -> Type {
        self.modify_ext(|e| {
            if e.methods.shift_remove(name) {
                e.group = None;
            }
        })
    }

    /// Attaches or replaces the call signature; structural sets are kept.
    #[must_use]
    pub fn with_call_signature(&self, signature: Signature) -> Type {
        self.modify_ext(|e| e.call_signature = Some(signature))
    }

    /// Attaches or replaces the construct signature.
    #[must_use]
    pub fn with_construct_signature(&self, signature: Signature) -> Type {
        self.modify_ext(|e| e.construct_signature = Some(signature))
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn replacing_ext(mut self, ext: TypeExtension) -> Type {
        self.ext = if ext.is_empty() { None } else { Some(Rc::new(ext)) };
        self
    }

    fn replacing_wasm(mut self, wasm: WasmExtension) -> Type {
        self.wasm = Some(Rc::new(wasm));
        self
    }

    fn modify_ext(&self, f: impl FnOnce(&mut TypeExtension)) -> Type {
        let mut ext = self.ext.as_deref().cloned().unwrap_or_default();
        f(&mut ext);
        Type {
            definite: self.definite,
            possible: self.possible,
            ext: if ext.is_empty() { None } else { Some(Rc::new(ext)) },
            wasm: self.wasm.clone(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nothing() {
            return write!(f, ".nothing");
        }
        if self.is_anything() {
            return write!(f, ".anything");
        }
        if self.definite.is_empty() {
            let mut first = true;
            for atom in self.possible.iter() {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, ".{}", atom.atom_name())?;
                first = false;
            }
        } else {
            let mut first = true;
            for atom in self.definite.iter() {
                if !first {
                    write!(f, " + ")?;
                }
                write!(f, ".{}", atom.atom_name())?;
                first = false;
            }
        }
        if let Some(ext) = self.ext.as_deref() {
            let mut parts = Vec::new();
            if let Some(group) = &ext.group {
                parts.push(format!("group: {group}"));
            }
            if !ext.properties.is_empty() {
                let props: Vec<&str> = ext.properties.iter().map(String::as_str).collect();
                parts.push(format!("props: [{}]", props.join(", ")));
            }
            if !ext.methods.is_empty() {
                let methods: Vec<&str> = ext.methods.iter().map(String::as_str).collect();
                parts.push(format!("methods: [{}]", methods.join(", ")));
            }
            if let Some(sig) = &ext.call_signature {
                parts.push(format!("call: {sig}"));
            }
            if let Some(sig) = &ext.construct_signature {
                parts.push(format!("new: {sig}"));
            }
            write!(f, "({})", parts.join(", "))?;
        }
        if let Some(wasm) = self.wasm.as_deref() {
            match wasm {
                WasmExtension::Ref { kind, nullable } => {
                    let null = if *nullable { "null " } else { "" };
                    match kind {
                        WasmRefKind::Abstract(heap) => write!(f, "({null}{heap:?})")?,
                        WasmRefKind::Index(id) => write!(f, "({null}{id})")?,
                    }
                }
                WasmExtension::TypeDef(def) => write!(f, "(typedef {})", def.id())?,
                WasmExtension::SelfReference => write!(f, "(selfref)")?,
                other => write!(f, "({other:?})")?,
            }
        }
        Ok(())
    }
}
