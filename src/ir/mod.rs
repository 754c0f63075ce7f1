//! Mica intermediate representation
//!
//! A control-flow graph of labeled basic blocks holding three-address
//! instructions over explicit temporaries. The generator consumes the
//! type-annotated tree and attaches one CFG per procedure symbol;
//! memory blocks pass through unchanged for the backend.

mod block;
mod instr;
mod lower;

pub use block::{BasicBlock, BlockId, Cfg};
pub use instr::{Instr, InstrKind, Operand, Terminator};
pub use lower::{lower_all, lower_module};
