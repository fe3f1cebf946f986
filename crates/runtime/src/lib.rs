//! Wisp Runtime: the stack-based bytecode virtual machine.
//!
//! - `heap`: the VM's object heap and allocation entry points
//! - `intern`: VM-wide string interning
//! - `vm`: the dispatch loop, call frames, runtime coercions, and the
//!   embedding API
//! - `error`: `RuntimeError` and its multi-frame stack trace rendering
//! - `natives`: host-provided builtins (`clock`)
//!
//! [`Vm`] is the only type most embedders need: construct one with
//! [`Vm::new`], feed it source text with [`Vm::interpret_source`], and
//! inspect the [`InterpretResult`] it returns.

mod frame;
pub mod error;
pub mod heap;
pub mod intern;
mod natives;
pub mod vm;

pub use error::RuntimeError;
pub use vm::{InterpretResult, Vm};
