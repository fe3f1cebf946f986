//! Wisp Compiler: lexer plus single-pass Pratt-parsing bytecode emitter.
//!
//! `compile(source, filename)` is the only entry point a driver needs —
//! it turns source text directly into a runnable [`wisp_core::WispFunction`]
//! (the top-level script), with no intermediate AST. Diagnostics accumulate
//! across the whole program; a failed compile returns every [`CompileError`]
//! found rather than stopping at the first one.

mod compiler;
pub mod error;
mod lexer;
mod local;
mod rules;
pub mod token;

pub use compiler::compile;
pub use error::{CompileError, ErrorLocation};
pub use token::{Token, TokenKind};
