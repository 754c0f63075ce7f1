//! IR instructions and operands
//!
//! Three-address instructions: a kind, the result type (or the type of
//! the moved data for stores and pushes), an ordered operand list, and
//! an optional destination. Control transfers are not instructions but
//! block terminators, so a block can never grow past its exit.

use crate::types::Type;
use std::fmt;

use super::block::BlockId;

/// An instruction operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A single-assignment virtual register.
    Temp { num: u32, ty: Type },
    /// A procedure-local argument or variable, by name.
    Local(String),
    /// A global procedure, by name.
    Proc(String),
    /// A global memory block, by name.
    Data(String),
    /// Literal text, as written in the source.
    Lit(String),
}

impl Operand {
    pub fn lit(text: impl Into<String>) -> Self {
        Operand::Lit(text.into())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Temp { num, .. } => write!(f, "t{}", num),
            Operand::Local(name) => write!(f, "{}", name),
            Operand::Proc(name) => write!(f, "{}", name),
            Operand::Data(name) => write!(f, "{}", name),
            Operand::Lit(text) => write!(f, "{}", text),
        }
    }
}

/// Kinds of instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrKind {
    // Arithmetic
    Add,
    Sub,
    Mult,
    Div,
    Rem,
    // Comparison
    Eq,
    Diff,
    Less,
    LessEq,
    More,
    MoreEq,
    // Logical
    And,
    Or,
    Not,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    BitNot,
    // Unary arithmetic
    UnaryMinus,
    UnaryPlus,
    // Conversions
    Convert,
    // Pointer load and store
    Load,
    Store,
    // Memory-block access
    LoadMem,
    StoreMem,
    BoundsCheck,
    // Locals
    StoreLocal,
    // Calling convention
    PushArg,
    PushRet,
    PopRet,
    Call,
}

impl fmt::Display for InstrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstrKind::Add => "add",
            InstrKind::Sub => "sub",
            InstrKind::Mult => "mult",
            InstrKind::Div => "div",
            InstrKind::Rem => "rem",
            InstrKind::Eq => "eq",
            InstrKind::Diff => "diff",
            InstrKind::Less => "less",
            InstrKind::LessEq => "lesseq",
            InstrKind::More => "more",
            InstrKind::MoreEq => "moreeq",
            InstrKind::And => "and",
            InstrKind::Or => "or",
            InstrKind::Not => "not",
            InstrKind::BitAnd => "bitand",
            InstrKind::BitOr => "bitor",
            InstrKind::BitXor => "bitxor",
            InstrKind::ShiftLeft => "shl",
            InstrKind::ShiftRight => "shr",
            InstrKind::BitNot => "bitnot",
            InstrKind::UnaryMinus => "neg",
            InstrKind::UnaryPlus => "pos",
            InstrKind::Convert => "convert",
            InstrKind::Load => "load",
            InstrKind::Store => "store",
            InstrKind::LoadMem => "loadmem",
            InstrKind::StoreMem => "storemem",
            InstrKind::BoundsCheck => "boundscheck",
            InstrKind::StoreLocal => "storelocal",
            InstrKind::PushArg => "pusharg",
            InstrKind::PushRet => "pushret",
            InstrKind::PopRet => "popret",
            InstrKind::Call => "call",
        };
        write!(f, "{}", s)
    }
}

/// A three-address instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub kind: InstrKind,
    /// Result type, or the type of the data being moved.
    pub ty: Type,
    pub operands: Vec<Operand>,
    pub dest: Option<Operand>,
}

impl Instr {
    /// An instruction that defines `dest`.
    pub fn assign(kind: InstrKind, ty: Type, operands: Vec<Operand>, dest: Operand) -> Self {
        Self {
            kind,
            ty,
            operands,
            dest: Some(dest),
        }
    }

    /// An instruction evaluated for effect only.
    pub fn effect(kind: InstrKind, ty: Type, operands: Vec<Operand>) -> Self {
        Self {
            kind,
            ty,
            operands,
            dest: None,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dest) = &self.dest {
            write!(f, "{} = ", dest)?;
        }
        write!(f, "{}", self.kind)?;
        for (i, op) in self.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {}", op)?;
        }
        Ok(())
    }
}

/// Block terminators.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    /// Two-way conditional transfer.
    Branch {
        cond: Operand,
        true_target: BlockId,
        false_target: BlockId,
    },
    /// Unconditional transfer.
    Jmp(BlockId),
    /// Return to the caller; returned values were pushed beforehand.
    Return,
    /// Halt the program with an i8 status.
    Exit(Operand),
}

impl Terminator {
    /// Blocks this terminator can transfer to.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Branch {
                true_target,
                false_target,
                ..
            } => vec![*true_target, *false_target],
            Terminator::Jmp(target) => vec![*target],
            Terminator::Return | Terminator::Exit(_) => vec![],
        }
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Branch {
                cond,
                true_target,
                false_target,
            } => write!(f, "branch {}, {}, {}", cond, true_target, false_target),
            Terminator::Jmp(target) => write!(f, "jmp {}", target),
            Terminator::Return => write!(f, "return"),
            Terminator::Exit(op) => write!(f, "exit {}", op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instr_display() {
        let t0 = Operand::Temp {
            num: 0,
            ty: Type::I64,
        };
        let instr = Instr::assign(
            InstrKind::Add,
            Type::I64,
            vec![Operand::lit("1"), t0.clone()],
            Operand::Temp {
                num: 1,
                ty: Type::I64,
            },
        );
        assert_eq!(instr.to_string(), "t1 = add 1, t0");

        let store = Instr::assign(
            InstrKind::StoreLocal,
            Type::I64,
            vec![t0],
            Operand::Local("x".into()),
        );
        assert_eq!(store.to_string(), "x = storelocal t0");
    }

    #[test]
    fn test_terminator_successors() {
        let b = Terminator::Branch {
            cond: Operand::lit("true"),
            true_target: BlockId(1),
            false_target: BlockId(2),
        };
        assert_eq!(b.successors(), vec![BlockId(1), BlockId(2)]);
        assert_eq!(Terminator::Jmp(BlockId(3)).successors(), vec![BlockId(3)]);
        assert!(Terminator::Return.successors().is_empty());
        assert!(Terminator::Exit(Operand::lit("0r")).successors().is_empty());
    }
}
