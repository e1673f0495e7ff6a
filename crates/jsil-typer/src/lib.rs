//! Streaming type inference over the jsil IR.
//!
//! The analyzer maintains, for every IR variable, its best-known type while
//! visiting a program one instruction at a time. It merges type information
//! at the join points of conditional control flow and loops, infers
//! subroutine return types, synthesizes nominal object groups for literals,
//! classes, and Wasm modules, and resolves recursive Wasm type groups.
//!
//! It is a best-effort predictor for steering program generation, not a
//! soundness-preserving checker: unknowns are the top type, and guarded
//! operations produce the top type by definition.
//!
//! Module map:
//! - `state` - per-block variable→type environments with branch merging
//! - `object_groups` - in-progress and finalized nominal object groups
//! - `wasm_types` - recursive Wasm type groups and self-reference patching
//! - `dispatch` / `dispatch_wasm` - per-opcode output typing
//! - `environment` - the host-builtins collaborator interface

mod dispatch;
mod dispatch_wasm;
pub mod environment;
mod object_groups;
mod state;
mod typer;
mod wasm_types;

pub use environment::{EmptyEnvironment, Environment};
pub use typer::Typer;
