//! Wisp Core: the data model shared by the compiler and the virtual machine.
//!
//! This crate has no opinion about parsing or execution — it only defines
//! the shapes both sides agree on:
//!
//! - `value`: the tagged `Value` union and the `Object` heap representation
//! - `chunk`: the append-only instruction buffer, constant pool, and the
//!   parallel line/column table used for diagnostics
//! - `opcode`: the bytecode instruction set and its operand widths
//! - `table`: the open-addressed hash tables backing maps, globals, and
//!   string interning
//!
//! # Modules
//!
//! - `value`: `Value`, `Object`, equality, falsiness, display rendering
//! - `chunk`: `Chunk`, constant pool, line/column packing
//! - `opcode`: `OpCode` and the long-operand promotion rule
//! - `table`: `StringTable`, `RawTable`, and the shared probing engine

pub mod chunk;
pub mod opcode;
pub mod table;
pub mod value;

pub use chunk::{Chunk, Source};
pub use opcode::OpCode;
pub use table::{RawTable, StringTable};
pub use value::{NativeFunction, Object, Value, WispFunction, WispMap, WispString};
