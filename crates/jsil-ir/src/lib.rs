//! Instruction model for the jsil intermediate representation.
//!
//! The IR is a linear stream of instructions over SSA-like integer-named
//! variables. This crate defines:
//! - `Variable` - opaque variable handles
//! - `Operation` - the opcode set with per-opcode operand shapes
//! - `Instruction` - one operation plus its inputs, outputs, and inner
//!   outputs (block-local bindings)
//! - `ProgramBuilder` - a small assembler that allocates variables and
//!   numbers instructions, used by tests and tools
//!
//! The textual/wire encoding of programs is out of scope; the analyzer
//! consumes `Instruction` values directly.

pub mod builder;
pub mod instruction;
pub mod operation;
pub mod variable;

pub use builder::{Emitted, ProgramBuilder};
pub use instruction::Instruction;
pub use operation::{
    BinaryOperator, Comparator, Operation, SubroutineParameters, UnaryOperator,
    WasmCatchKind, WasmFloatBinaryOperator, WasmFloatCompareOperator, WasmFloatUnaryOperator,
    WasmIntegerBinaryOperator, WasmIntegerCompareOperator, WasmIntegerUnaryOperator,
    WasmMemoryLoadKind, WasmMemoryStoreKind, WasmStructField, WasmTypeRefOperand,
};
pub use variable::Variable;
