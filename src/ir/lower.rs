//! Tree-to-IR lowering
//!
//! Translates type-annotated procedure bodies into control-flow graphs.
//! Every expression node is assumed to carry a valid type. Structured
//! control flow becomes labeled blocks with explicit branches; each
//! operator application lands in a fresh temporary; calls push their
//! arguments and pop their returns explicitly.

use crate::ast::Node;
use crate::error::{CheckResult, CompileError};
use crate::module::{Module, ModuleMap, ProcRecord, Symbol, SymbolKind};
use crate::span::SourceLocation;
use crate::token::LexKind;
use crate::types::Type;
use std::collections::HashMap;

use super::block::{BasicBlock, BlockId, Cfg};
use super::instr::{Instr, InstrKind, Operand, Terminator};

/// Lower every module in the map.
pub fn lower_all<'s>(modules: &mut ModuleMap<'s>) -> CheckResult<()> {
    let mut names: Vec<String> = modules.keys().cloned().collect();
    names.sort();
    for name in names {
        let mut m = match modules.remove(&name) {
            Some(m) => m,
            None => continue,
        };
        let result = lower_module(modules, &mut m);
        modules.insert(name, m);
        result?;
    }
    Ok(())
}

/// Build a CFG for each procedure global of one module. Memory blocks
/// pass through unchanged for the backend.
pub fn lower_module<'s>(world: &ModuleMap<'s>, m: &mut Module<'s>) -> CheckResult<()> {
    let mut built: Vec<(&'s str, Cfg)> = Vec::new();
    for slot in m.root.children.iter() {
        let node = match slot.as_ref() {
            Some(node) => node,
            None => continue,
        };
        if node.kind != LexKind::Proc {
            continue;
        }
        let proc_name = node.expect_child(0).text;
        let sy = match m.globals.get(proc_name) {
            Some(sy) => sy,
            None => continue,
        };
        if sy.external.is_some() {
            continue;
        }
        let proc = match sy.proc.as_ref() {
            Some(proc) => proc,
            None => continue,
        };

        let mut cx = Context::new(&m.name, world, &m.globals, &m.dependencies, proc);
        cx.lower_block(node.expect_child(4))?;
        if !cx.flowed() {
            cx.terminate(Terminator::Return);
        }
        built.push((proc_name, cx.finish()));
    }

    for (proc_name, cfg) in built {
        if let Some(rec) = m
            .globals
            .get_mut(proc_name)
            .and_then(|sy| sy.proc.as_mut())
        {
            rec.cfg = Some(cfg);
        }
    }
    Ok(())
}

/// Per-procedure lowering state: the blocks built so far, the block
/// under construction, and the monotone temporary counter. Labels come
/// from block ids, which are allocated monotonically too.
struct Context<'a, 's> {
    module: &'a str,
    world: &'a ModuleMap<'s>,
    globals: &'a HashMap<&'s str, Symbol<'s>>,
    dependencies: &'a HashMap<&'s str, String>,
    proc: &'a ProcRecord<'s>,
    blocks: Vec<BasicBlock>,
    current: BlockId,
    temp_counter: u32,
}

impl<'a, 's> Context<'a, 's> {
    fn new(
        module: &'a str,
        world: &'a ModuleMap<'s>,
        globals: &'a HashMap<&'s str, Symbol<'s>>,
        dependencies: &'a HashMap<&'s str, String>,
        proc: &'a ProcRecord<'s>,
    ) -> Self {
        let entry = BlockId(0);
        Self {
            module,
            world,
            globals,
            dependencies,
            proc,
            blocks: vec![BasicBlock::new(entry)],
            current: entry,
            temp_counter: 0,
        }
    }

    fn finish(self) -> Cfg {
        Cfg {
            entry: BlockId(0),
            blocks: self.blocks,
        }
    }

    fn loc(&self, n: &Node<'s>) -> SourceLocation {
        SourceLocation::new(self.module.to_string(), n.range)
    }

    fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BasicBlock::new(id));
        id
    }

    fn alloc_temp(&mut self, ty: Type) -> Operand {
        let num = self.temp_counter;
        self.temp_counter += 1;
        Operand::Temp { num, ty }
    }

    fn push(&mut self, instr: Instr) {
        self.blocks[self.current.0 as usize].push(instr);
    }

    fn terminate(&mut self, terminator: Terminator) {
        self.blocks[self.current.0 as usize].terminate(terminator);
    }

    fn flowed(&self) -> bool {
        self.blocks[self.current.0 as usize].is_flowed()
    }

    fn set_current(&mut self, id: BlockId) {
        self.current = id;
    }

    // ============ Statements ============

    fn lower_block(&mut self, body: &Node<'s>) -> CheckResult<()> {
        for stmt in body.children.iter().flatten() {
            match stmt.kind {
                LexKind::Eof => {}
                LexKind::If => self.lower_if(stmt)?,
                LexKind::While => self.lower_while(stmt)?,
                LexKind::Return => self.lower_return(stmt)?,
                LexKind::Set => self.lower_set(stmt)?,
                LexKind::Exit => self.lower_exit(stmt)?,
                _ => self.lower_expr_statement(stmt)?,
            }
        }
        Ok(())
    }

    fn lower_if(&mut self, n: &Node<'s>) -> CheckResult<()> {
        let cond = self.lower_expr(n.expect_child(0))?;
        let true_bl = self.new_block();
        let false_bl = self.new_block();
        let out_bl = self.new_block();
        self.terminate(Terminator::Branch {
            cond,
            true_target: true_bl,
            false_target: false_bl,
        });

        self.set_current(true_bl);
        self.lower_block(n.expect_child(1))?;
        self.terminate(Terminator::Jmp(out_bl));

        self.set_current(false_bl);
        if let Some(chain) = n.child(2) {
            for arm in chain.children.iter().flatten() {
                let cond = self.lower_expr(arm.expect_child(0))?;
                let arm_true = self.new_block();
                let arm_false = self.new_block();
                self.terminate(Terminator::Branch {
                    cond,
                    true_target: arm_true,
                    false_target: arm_false,
                });
                self.set_current(arm_true);
                self.lower_block(arm.expect_child(1))?;
                self.terminate(Terminator::Jmp(out_bl));
                self.set_current(arm_false);
            }
        }
        if let Some(els) = n.child(3) {
            self.lower_block(els.expect_child(0))?;
        }
        self.terminate(Terminator::Jmp(out_bl));
        self.set_current(out_bl);
        Ok(())
    }

    fn lower_while(&mut self, n: &Node<'s>) -> CheckResult<()> {
        let loop_start = self.new_block();
        let loop_body = self.new_block();
        let loop_end = self.new_block();

        self.terminate(Terminator::Jmp(loop_start));
        self.set_current(loop_start);
        let cond = self.lower_expr(n.expect_child(0))?;
        self.terminate(Terminator::Branch {
            cond,
            true_target: loop_body,
            false_target: loop_end,
        });

        self.set_current(loop_body);
        self.lower_block(n.expect_child(1))?;
        self.terminate(Terminator::Jmp(loop_start));

        self.set_current(loop_end);
        Ok(())
    }

    fn lower_return(&mut self, n: &Node<'s>) -> CheckResult<()> {
        for value in n.children.iter().flatten() {
            let op = self.lower_expr(value)?;
            self.push(Instr::effect(InstrKind::PushRet, value.ty.clone(), vec![op]));
        }
        self.terminate(Terminator::Return);
        Ok(())
    }

    fn lower_exit(&mut self, n: &Node<'s>) -> CheckResult<()> {
        let value = self.lower_expr(n.expect_child(0))?;
        self.terminate(Terminator::Exit(value));
        Ok(())
    }

    /// Children of a `set` node: assignee list, operator, right-hand
    /// side.
    fn lower_set(&mut self, n: &Node<'s>) -> CheckResult<()> {
        let assignees = n.expect_child(0);
        let op = n.expect_child(1).kind;
        let right = n.expect_child(2);

        if right.kind == LexKind::ExprList {
            // Element-wise: one single-assignment per pair.
            for (assignee, value) in assignees
                .children
                .iter()
                .flatten()
                .zip(right.children.iter().flatten())
            {
                self.lower_single_assign(assignee, value, op)?;
            }
            return Ok(());
        }

        if assignees.arity() > 1 {
            return self.lower_multi_call_assign(assignees, right);
        }

        self.lower_single_assign(assignees.expect_child(0), right, op)
    }

    fn lower_single_assign(
        &mut self,
        assignee: &Node<'s>,
        value: &Node<'s>,
        op: LexKind,
    ) -> CheckResult<()> {
        match assignee.kind {
            LexKind::Identifier => {
                let dest = self.operand_for_id(assignee)?;
                let result = self.lower_assigned_value(&dest, assignee, value, op)?;
                self.push(Instr::assign(
                    InstrKind::StoreLocal,
                    assignee.ty.clone(),
                    vec![result],
                    dest,
                ));
                Ok(())
            }
            LexKind::LeftBracket => {
                let index = self.lower_expr(assignee.expect_child(0))?;
                let mem = self.operand_for_id(assignee.expect_child(1))?;
                let result = if op == LexKind::Assignment {
                    self.lower_expr(value)?
                } else {
                    // Compound: read the element, combine, write back.
                    let old = self.alloc_temp(assignee.ty.clone());
                    self.push(Instr::effect(
                        InstrKind::BoundsCheck,
                        assignee.ty.clone(),
                        vec![mem.clone(), index.clone()],
                    ));
                    self.push(Instr::assign(
                        InstrKind::LoadMem,
                        assignee.ty.clone(),
                        vec![mem.clone(), index.clone()],
                        old.clone(),
                    ));
                    self.lower_compound(old, assignee, value, op)?
                };
                self.push(Instr::assign(
                    InstrKind::StoreMem,
                    assignee.ty.clone(),
                    vec![result, index],
                    mem,
                ));
                Ok(())
            }
            LexKind::At => {
                let addr = self.lower_expr(assignee.expect_child(1))?;
                let result = if op == LexKind::Assignment {
                    self.lower_expr(value)?
                } else {
                    let old = self.alloc_temp(assignee.ty.clone());
                    self.push(Instr::assign(
                        InstrKind::Load,
                        assignee.ty.clone(),
                        vec![addr.clone()],
                        old.clone(),
                    ));
                    self.lower_compound(old, assignee, value, op)?
                };
                self.push(Instr::assign(
                    InstrKind::Store,
                    assignee.ty.clone(),
                    vec![result],
                    addr,
                ));
                Ok(())
            }
            _ => Err(CompileError::internal(
                self.loc(assignee),
                "assignee survived checking with an impossible kind",
            )),
        }
    }

    /// The value stored by a single assignment to an identifier: the
    /// plain right-hand side, or the compound combination with the
    /// current value.
    fn lower_assigned_value(
        &mut self,
        dest: &Operand,
        assignee: &Node<'s>,
        value: &Node<'s>,
        op: LexKind,
    ) -> CheckResult<Operand> {
        if op == LexKind::Assignment {
            return self.lower_expr(value);
        }
        self.lower_compound(dest.clone(), assignee, value, op)
    }

    /// `old op= value` becomes a binary instruction into a fresh
    /// temporary.
    fn lower_compound(
        &mut self,
        old: Operand,
        assignee: &Node<'s>,
        value: &Node<'s>,
        op: LexKind,
    ) -> CheckResult<Operand> {
        let kind = match op {
            LexKind::PlusAssign => InstrKind::Add,
            LexKind::MinusAssign => InstrKind::Sub,
            LexKind::MultiplicationAssign => InstrKind::Mult,
            LexKind::DivisionAssign => InstrKind::Div,
            LexKind::RemainderAssign => InstrKind::Rem,
            _ => {
                return Err(CompileError::internal(
                    self.loc(assignee),
                    "unknown compound assignment operator",
                ))
            }
        };
        let rhs = self.lower_expr(value)?;
        let dest = self.alloc_temp(assignee.ty.clone());
        self.push(Instr::assign(
            kind,
            assignee.ty.clone(),
            vec![old, rhs],
            dest.clone(),
        ));
        Ok(dest)
    }

    /// `set a, b = f()` — push the arguments, call, pop one return per
    /// assignee in order.
    fn lower_multi_call_assign(
        &mut self,
        assignees: &Node<'s>,
        call: &Node<'s>,
    ) -> CheckResult<()> {
        if call.kind != LexKind::Call {
            return Err(CompileError::internal(
                self.loc(call),
                "multi-value right-hand side is not a call",
            ));
        }
        self.lower_call_prefix(call)?;

        for assignee in assignees.children.iter().flatten() {
            match assignee.kind {
                LexKind::Identifier => {
                    let dest = self.operand_for_id(assignee)?;
                    self.push(Instr::assign(
                        InstrKind::PopRet,
                        assignee.ty.clone(),
                        vec![],
                        dest,
                    ));
                }
                LexKind::LeftBracket => {
                    let mem = self.operand_for_id(assignee.expect_child(1))?;
                    let index = self.lower_expr(assignee.expect_child(0))?;
                    let temp = self.alloc_temp(assignee.ty.clone());
                    self.push(Instr::assign(
                        InstrKind::PopRet,
                        assignee.ty.clone(),
                        vec![],
                        temp.clone(),
                    ));
                    self.push(Instr::assign(
                        InstrKind::StoreMem,
                        assignee.ty.clone(),
                        vec![temp, index],
                        mem,
                    ));
                }
                LexKind::At => {
                    let addr = self.lower_expr(assignee.expect_child(1))?;
                    let temp = self.alloc_temp(assignee.ty.clone());
                    self.push(Instr::assign(
                        InstrKind::PopRet,
                        assignee.ty.clone(),
                        vec![],
                        temp.clone(),
                    ));
                    self.push(Instr::assign(
                        InstrKind::Store,
                        assignee.ty.clone(),
                        vec![temp],
                        addr,
                    ));
                }
                _ => {
                    return Err(CompileError::internal(
                        self.loc(assignee),
                        "assignee survived checking with an impossible kind",
                    ))
                }
            }
        }
        Ok(())
    }

    /// A call in statement position: returned values, if any, are
    /// popped into scratch temporaries so the return stack stays
    /// balanced.
    fn lower_expr_statement(&mut self, n: &Node<'s>) -> CheckResult<()> {
        if n.kind == LexKind::Call {
            self.lower_call_prefix(n)?;
            let rets = self.callee_rets(n)?;
            for ty in rets {
                let scratch = self.alloc_temp(ty.clone());
                self.push(Instr::assign(InstrKind::PopRet, ty, vec![], scratch));
            }
            return Ok(());
        }
        self.lower_expr(n).map(|_| ())
    }

    // ============ Expressions ============

    fn lower_expr(&mut self, n: &Node<'s>) -> CheckResult<Operand> {
        match n.kind {
            LexKind::Identifier => self.operand_for_id(n),
            LexKind::DoubleColon => self.operand_for_external(n),
            k if k.is_literal() => Ok(Operand::lit(n.text)),
            LexKind::Minus | LexKind::Plus => {
                if n.arity() == 1 {
                    self.lower_unary(n)
                } else {
                    self.lower_binary(n)
                }
            }
            LexKind::Multiplication
            | LexKind::Division
            | LexKind::Remainder
            | LexKind::BitAnd
            | LexKind::BitOr
            | LexKind::BitXor
            | LexKind::ShiftLeft
            | LexKind::ShiftRight
            | LexKind::Equals
            | LexKind::Different
            | LexKind::More
            | LexKind::MoreEq
            | LexKind::Less
            | LexKind::LessEq
            | LexKind::And
            | LexKind::Or => self.lower_binary(n),
            LexKind::Not | LexKind::Neg => self.lower_unary(n),
            LexKind::Colon => self.lower_conversion(n),
            LexKind::Call => self.lower_call_value(n),
            LexKind::At => self.lower_deref(n),
            LexKind::LeftBracket => self.lower_mem_access(n),
            LexKind::Dot => self.lower_property(n),
            LexKind::SizeOf => {
                let ty = &n.expect_child(0).ty;
                Ok(Operand::lit(ty.size_of().to_string()))
            }
            _ => Err(CompileError::internal(
                self.loc(n),
                format!("`{}` is not an expression", n.kind),
            )),
        }
    }

    fn lower_binary(&mut self, n: &Node<'s>) -> CheckResult<Operand> {
        let kind = binary_instr(n.kind).ok_or_else(|| {
            CompileError::internal(self.loc(n), "unknown binary operator")
        })?;
        let a = self.lower_expr(n.expect_child(0))?;
        let b = self.lower_expr(n.expect_child(1))?;
        let dest = self.alloc_temp(n.ty.clone());
        self.push(Instr::assign(kind, n.ty.clone(), vec![a, b], dest.clone()));
        Ok(dest)
    }

    fn lower_unary(&mut self, n: &Node<'s>) -> CheckResult<Operand> {
        let kind = match n.kind {
            LexKind::Minus => InstrKind::UnaryMinus,
            LexKind::Plus => InstrKind::UnaryPlus,
            LexKind::Not => InstrKind::Not,
            LexKind::Neg => InstrKind::BitNot,
            _ => {
                return Err(CompileError::internal(
                    self.loc(n),
                    "unknown unary operator",
                ))
            }
        };
        let a = self.lower_expr(n.expect_child(0))?;
        let dest = self.alloc_temp(n.ty.clone());
        self.push(Instr::assign(kind, n.ty.clone(), vec![a], dest.clone()));
        Ok(dest)
    }

    fn lower_conversion(&mut self, n: &Node<'s>) -> CheckResult<Operand> {
        let a = self.lower_expr(n.expect_child(1))?;
        let dest = self.alloc_temp(n.ty.clone());
        self.push(Instr::assign(
            InstrKind::Convert,
            n.ty.clone(),
            vec![a],
            dest.clone(),
        ));
        Ok(dest)
    }

    /// Arguments and the call itself, shared by every call context.
    fn lower_call_prefix(&mut self, n: &Node<'s>) -> CheckResult<()> {
        let callee = self.lower_expr(n.expect_child(1))?;
        for arg in n.expect_child(0).children.iter().flatten() {
            let op = self.lower_expr(arg)?;
            self.push(Instr::effect(InstrKind::PushArg, arg.ty.clone(), vec![op]));
        }
        self.push(Instr::effect(InstrKind::Call, n.ty.clone(), vec![callee]));
        Ok(())
    }

    /// A call in value position: a single return popped into a fresh
    /// temporary.
    fn lower_call_value(&mut self, n: &Node<'s>) -> CheckResult<Operand> {
        self.lower_call_prefix(n)?;
        let dest = self.alloc_temp(n.ty.clone());
        self.push(Instr::assign(
            InstrKind::PopRet,
            n.ty.clone(),
            vec![],
            dest.clone(),
        ));
        Ok(dest)
    }

    /// Return types of a call's callee, from its checked type.
    fn callee_rets(&self, call: &Node<'s>) -> CheckResult<Vec<Type>> {
        match &call.expect_child(1).ty {
            Type::Proc(p) => Ok(p.rets.clone()),
            _ => Err(CompileError::internal(
                self.loc(call),
                "callee survived checking without a procedure type",
            )),
        }
    }

    fn lower_deref(&mut self, n: &Node<'s>) -> CheckResult<Operand> {
        let addr = self.lower_expr(n.expect_child(1))?;
        let dest = self.alloc_temp(n.ty.clone());
        self.push(Instr::assign(
            InstrKind::Load,
            n.ty.clone(),
            vec![addr],
            dest.clone(),
        ));
        Ok(dest)
    }

    /// `mem[e]` — bounds check, then load into a fresh temporary.
    fn lower_mem_access(&mut self, n: &Node<'s>) -> CheckResult<Operand> {
        let mem = self.operand_for_id(n.expect_child(1))?;
        let index = self.lower_expr(n.expect_child(0))?;
        self.push(Instr::effect(
            InstrKind::BoundsCheck,
            n.ty.clone(),
            vec![mem.clone(), index.clone()],
        ));
        let dest = self.alloc_temp(n.ty.clone());
        self.push(Instr::assign(
            InstrKind::LoadMem,
            n.ty.clone(),
            vec![mem, index],
            dest.clone(),
        ));
        Ok(dest)
    }

    /// `m.size` folds to a literal operand.
    fn lower_property(&mut self, n: &Node<'s>) -> CheckResult<Operand> {
        let mem = n.expect_child(1);
        let size = self
            .globals
            .get(mem.text)
            .and_then(|sy| sy.data.as_ref())
            .map(|data| data.size);
        match size {
            Some(size) => Ok(Operand::lit(size.to_string())),
            None => Err(CompileError::internal(
                self.loc(mem),
                "property access survived checking without a data symbol",
            )),
        }
    }

    /// An identifier in operand position: a procedure-local name, or a
    /// global tagged by its symbol kind.
    fn operand_for_id(&mut self, id: &Node<'s>) -> CheckResult<Operand> {
        if self.proc.lookup(id.text).is_some() {
            return Ok(Operand::Local(id.text.to_string()));
        }
        match self.globals.get(id.text) {
            Some(sy) => self.operand_for_symbol(id, sy, None),
            None => Err(CompileError::internal(
                self.loc(id),
                format!("`{}` survived checking unresolved", id.text),
            )),
        }
    }

    /// `module::name` — the same tagging, with a qualified label.
    fn operand_for_external(&mut self, n: &Node<'s>) -> CheckResult<Operand> {
        let alias = n.expect_child(0).text;
        let name = n.expect_child(1);
        let dep = self
            .dependencies
            .get(alias)
            .and_then(|target| self.world.get(target));
        match dep.and_then(|dep| dep.get_symbol(name.text)) {
            Some(sy) => {
                let target = &self.dependencies[alias];
                self.operand_for_symbol(name, sy, Some(target))
            }
            None => Err(CompileError::internal(
                self.loc(n),
                format!("`{}::{}` survived checking unresolved", alias, name.text),
            )),
        }
    }

    fn operand_for_symbol(
        &self,
        id: &Node<'s>,
        sy: &Symbol<'s>,
        qualifier: Option<&str>,
    ) -> CheckResult<Operand> {
        let label = match qualifier {
            Some(module) => format!("{}::{}", module, id.text),
            None => match &sy.external {
                Some(origin) => format!("{}::{}", origin, id.text),
                None => id.text.to_string(),
            },
        };
        match sy.kind {
            SymbolKind::Procedure | SymbolKind::Builtin => Ok(Operand::Proc(label)),
            SymbolKind::Data => Ok(Operand::Data(label)),
            SymbolKind::Const => match &sy.cons {
                Some(cons) => Ok(Operand::lit(cons.text)),
                None => Err(CompileError::internal(
                    self.loc(id),
                    "constant symbol without a literal",
                )),
            },
            _ => Err(CompileError::internal(
                self.loc(id),
                format!("`{}` is not an operand", id.text),
            )),
        }
    }
}

fn binary_instr(kind: LexKind) -> Option<InstrKind> {
    Some(match kind {
        LexKind::Plus => InstrKind::Add,
        LexKind::Minus => InstrKind::Sub,
        LexKind::Multiplication => InstrKind::Mult,
        LexKind::Division => InstrKind::Div,
        LexKind::Remainder => InstrKind::Rem,
        LexKind::Equals => InstrKind::Eq,
        LexKind::Different => InstrKind::Diff,
        LexKind::Less => InstrKind::Less,
        LexKind::LessEq => InstrKind::LessEq,
        LexKind::More => InstrKind::More,
        LexKind::MoreEq => InstrKind::MoreEq,
        LexKind::And => InstrKind::And,
        LexKind::Or => InstrKind::Or,
        LexKind::BitAnd => InstrKind::BitAnd,
        LexKind::BitOr => InstrKind::BitOr,
        LexKind::BitXor => InstrKind::BitXor,
        LexKind::ShiftLeft => InstrKind::ShiftLeft,
        LexKind::ShiftRight => InstrKind::ShiftRight,
        _ => return None,
    })
}
