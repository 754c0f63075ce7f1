//! Mica compiler front end
//!
//! The core of the compiler for Mica, a small, statically typed,
//! procedural systems language: the lexer, the type checker, and the
//! IR generator. The parser, the file-loading driver, and the backend
//! passes are separate collaborators built on the contracts these
//! modules expose.
//!
//! # Architecture
//!
//! ```text
//! Source Code (.mi)
//!       │
//!       ▼
//! ┌─────────────┐
//! │    Lexer    │  → token nodes
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │   Parser    │  → module trees        (external)
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │ Type Check  │  → typed trees, symbol tables
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │ IR Lowering │  → per-procedure CFGs
//! └─────────────┘
//!       │
//!       ▼
//! ┌─────────────┐
//! │  Backends   │  → machine code        (external)
//! └─────────────┘
//! ```
//!
//! The checker mutates trees in place (writing a type onto every
//! expression node) and fills the per-procedure symbol tables; the
//! generator assumes a checked tree and attaches a [`ir::Cfg`] to each
//! procedure symbol. All three stages report failures through a single
//! [`error::CompileError`] record, first error wins.

pub mod ast;
pub mod error;
pub mod ir;
pub mod lexer;
pub mod module;
pub mod span;
pub mod token;
pub mod typeck;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports for convenience
pub use ast::Node;
pub use error::{CompileError, ErrorKind};
pub use lexer::Lexer;
pub use module::{Module, ModuleMap, Symbol};
pub use span::{Position, Range, SourceLocation};
pub use token::LexKind;
pub use types::Type;

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File extension for Mica source files
pub const FILE_EXTENSION: &str = "mi";
