//! Type lattice for the jsil IR analyzer.
//!
//! This crate provides the carrier of all type values used by the analyzer:
//! - `Type` - lattice element with union, intersection, and subsumption
//! - `TypeExtension` - structural attributes of object types (properties,
//!   methods, nominal group, call/construct signatures)
//! - `Signature` / `Parameter` - callable interfaces
//! - Wasm type descriptions (globals, memories, tables, tags, function
//!   definitions, reference types, recursive struct/array/signature types)
//!
//! All lattice operations are total; none panics.

pub mod extension;
pub mod flags;
pub mod signature;
pub mod types;
pub mod wasm;

pub use extension::TypeExtension;
pub use flags::TypeFlags;
pub use signature::{Parameter, ParameterList, Signature};
pub use types::Type;
pub use wasm::{
    WasmAbstractHeapType, WasmExtension, WasmFieldType, WasmRefKind, WasmSignature,
    WasmTypeDefId, WasmTypeDefinition, WasmTypeDescription,
};
