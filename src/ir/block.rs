//! Basic blocks and per-procedure control-flow graphs
//!
//! Blocks are append-only while under construction and become *flowed*
//! the moment a terminator is installed; later appends are discarded,
//! so code following a `return` in the same block can never resurrect
//! it. Labels are `.Ln` with `n` taken from a per-procedure monotone
//! counter.

use std::fmt;

use super::instr::{Instr, Terminator};

/// Index of a block inside its procedure's CFG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".L{}", self.0)
    }
}

/// A maximal straight-line sequence of instructions with one exit.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Textual label, unique within the procedure.
    pub label: String,
    pub instrs: Vec<Instr>,
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            label: format!(".L{}", id.0),
            instrs: Vec::new(),
            terminator: None,
        }
    }

    /// Whether control flow out of this block is already decided.
    pub fn is_flowed(&self) -> bool {
        self.terminator.is_some()
    }

    /// Append an instruction; discarded once the block is flowed.
    pub fn push(&mut self, instr: Instr) {
        if !self.is_flowed() {
            self.instrs.push(instr);
        }
    }

    /// Install the terminator; a flowed block keeps its first one.
    pub fn terminate(&mut self, terminator: Terminator) {
        if !self.is_flowed() {
            self.terminator = Some(terminator);
        }
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.label)?;
        for instr in &self.instrs {
            writeln!(f, "  {}", instr)?;
        }
        match &self.terminator {
            Some(t) => writeln!(f, "  {}", t),
            None => writeln!(f, "  <unterminated>"),
        }
    }
}

/// A procedure's control-flow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Cfg {
    pub entry: BlockId,
    pub blocks: Vec<BasicBlock>,
}

impl Cfg {
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0 as usize]
    }

    pub fn entry_block(&self) -> &BasicBlock {
        self.block(self.entry)
    }

    /// Blocks reachable from the entry, in depth-first order.
    pub fn reachable(&self) -> Vec<BlockId> {
        let mut seen = vec![false; self.blocks.len()];
        let mut stack = vec![self.entry];
        let mut order = Vec::new();
        while let Some(id) = stack.pop() {
            if seen[id.0 as usize] {
                continue;
            }
            seen[id.0 as usize] = true;
            order.push(id);
            if let Some(term) = &self.block(id).terminator {
                for succ in term.successors() {
                    stack.push(succ);
                }
            }
        }
        order
    }
}

impl fmt::Display for Cfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            write!(f, "{}", block)?;
        }
        Ok(())
    }
}
