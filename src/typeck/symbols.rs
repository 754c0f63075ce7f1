//! Pass A: global symbol checking
//!
//! Runs before any procedure body so that forward references within a
//! module resolve. Procedures register their argument and variable
//! symbols and derive their procedure type; memory blocks compute their
//! size from the initializer; constants take the type of their literal.

use crate::ast::Node;
use crate::error::{CheckResult, CompileError, ErrorKind};
use crate::module::{Module, Symbol, SymbolKind};
use crate::token::LexKind;
use crate::types::Type;

use super::node_loc;

pub(super) fn check_symbols<'s>(m: &mut Module<'s>) -> CheckResult<()> {
    let Module {
        name: module_name,
        root,
        globals,
        ..
    } = m;
    let module_name = module_name.as_str();
    // Declaration order, so the first error is deterministic.
    for slot in root.children.iter_mut() {
        let node = match slot.as_mut() {
            Some(node) => node,
            None => continue,
        };
        let sy_name = match node.kind {
            LexKind::Proc | LexKind::Memory | LexKind::ConstDef => node.expect_child(0).text,
            _ => continue,
        };
        let sy = match globals.get_mut(sy_name) {
            Some(sy) => sy,
            None => {
                return Err(CompileError::internal(
                    node_loc(module_name, node),
                    format!("declaration `{}` has no symbol", sy_name),
                ))
            }
        };
        if sy.external.is_some() {
            continue;
        }
        check_symbol(module_name, sy, node)?;
    }
    Ok(())
}

fn check_symbol<'s>(module: &str, sy: &mut Symbol<'s>, node: &mut Node<'s>) -> CheckResult<()> {
    match sy.kind {
        SymbolKind::Procedure => check_proc(module, sy, node),
        SymbolKind::Data => check_data(module, sy, node),
        SymbolKind::Const => check_const(module, sy, node),
        _ => Ok(()),
    }
}

/// Children of a procedure node: name, argument list, return list,
/// variable list, body.
fn check_proc<'s>(module: &str, sy: &mut Symbol<'s>, node: &mut Node<'s>) -> CheckResult<()> {
    let rec = match sy.proc.as_mut() {
        Some(rec) => rec,
        None => {
            return Err(CompileError::internal(
                node_loc(module, node),
                "procedure symbol without a procedure record",
            ))
        }
    };
    rec.clear();

    let mut arg_types = Vec::new();
    if let Some(args) = node.child_mut(1) {
        for decl in args.children.iter_mut().flatten() {
            let (name, ty) = declared(module, decl)?;
            if rec.lookup(name).is_some() {
                return Err(CompileError::name_already_defined(
                    node_loc(module, decl),
                    name,
                ));
            }
            rec.arg_map.insert(name, rec.args.len());
            rec.args.push(Symbol::local(name, SymbolKind::Arg, ty.clone()));
            arg_types.push(ty);
        }
    }

    if let Some(rets) = node.child_mut(2) {
        for ret in rets.children.iter_mut().flatten() {
            let ty = resolve_annotation(module, ret)?;
            rec.rets.push(ty);
        }
    }

    if let Some(vars) = node.child_mut(3) {
        for decl in vars.children.iter_mut().flatten() {
            let (name, ty) = declared(module, decl)?;
            if rec.lookup(name).is_some() {
                return Err(CompileError::name_already_defined(
                    node_loc(module, decl),
                    name,
                ));
            }
            rec.var_map.insert(name, rec.vars.len());
            rec.vars.push(Symbol::local(name, SymbolKind::Var, ty.clone()));
        }
    }

    let ty = Type::proc(arg_types, rec.rets.clone());
    rec.ty = ty.clone();
    sy.ty = ty.clone();
    node.ty = ty;
    Ok(())
}

/// An argument or variable declaration: a bare identifier (defaulting
/// to i64) or `name:type`.
fn declared<'s>(module: &str, decl: &mut Node<'s>) -> CheckResult<(&'s str, Type)> {
    match decl.kind {
        LexKind::Identifier => {
            decl.ty = Type::I64;
            Ok((decl.text, Type::I64))
        }
        LexKind::Colon => {
            let name = decl.expect_child(0).text;
            let ty = resolve_annotation(module, decl.expect_child_mut(1))?;
            decl.ty = ty.clone();
            Ok((name, ty))
        }
        _ => Err(CompileError::internal(
            node_loc(module, decl),
            format!("`{}` is not a declaration", decl.kind),
        )),
    }
}

/// Resolve a type annotation node, writing the type back onto it.
/// Procedure types carry two type-list children: arguments and returns.
pub(super) fn resolve_annotation<'s>(module: &str, node: &mut Node<'s>) -> CheckResult<Type> {
    let ty = match node.kind {
        LexKind::I8 => Type::I8,
        LexKind::I16 => Type::I16,
        LexKind::I32 => Type::I32,
        LexKind::I64 => Type::I64,
        LexKind::U8 => Type::U8,
        LexKind::U16 => Type::U16,
        LexKind::U32 => Type::U32,
        LexKind::U64 => Type::U64,
        LexKind::Bool => Type::Bool,
        LexKind::Ptr => Type::Ptr,
        LexKind::Proc => {
            let mut args = Vec::new();
            let mut rets = Vec::new();
            if let Some(list) = node.child_mut(0) {
                for t in list.children.iter_mut().flatten() {
                    args.push(resolve_annotation(module, t)?);
                }
            }
            if let Some(list) = node.child_mut(1) {
                for t in list.children.iter_mut().flatten() {
                    rets.push(resolve_annotation(module, t)?);
                }
            }
            Type::proc(args, rets)
        }
        _ => {
            return Err(CompileError::new(
                ErrorKind::ExpectedBasicOrProcType,
                node_loc(module, node),
                format!("`{}` does not name a type", node.kind),
            ))
        }
    };
    node.ty = ty.clone();
    Ok(ty)
}

/// Children of a memory node: name, initializer literal, optional
/// element type.
fn check_data<'s>(module: &str, sy: &mut Symbol<'s>, node: &mut Node<'s>) -> CheckResult<()> {
    let elem = match node.child_mut(2) {
        Some(t) => {
            let ty = resolve_annotation(module, t)?;
            if !ty.is_basic() {
                return Err(CompileError::new(
                    ErrorKind::InvalidType,
                    node_loc(module, t),
                    format!("`{}` cannot be a memory element type", ty),
                ));
            }
            ty
        }
        None => Type::I8,
    };

    let init = node.expect_child(1);
    let (size, contents) = match init.kind {
        LexKind::PtrLit => {
            return Err(CompileError::new(
                ErrorKind::PtrCantBeUsedAsDataSize,
                node_loc(module, init),
                "a pointer literal cannot size a memory block",
            ))
        }
        LexKind::StringLit => {
            let inner = &init.text[1..init.text.len() - 1];
            (string_size(inner), Some(init.text))
        }
        k if k.is_int_literal() || k == LexKind::CharLit => {
            let value = match init.value {
                Some(value) => value,
                None => {
                    return Err(CompileError::internal(
                        node_loc(module, init),
                        "literal without a value",
                    ))
                }
            };
            (value as u64, None)
        }
        _ => {
            return Err(CompileError::new(
                ErrorKind::InvalidType,
                node_loc(module, init),
                format!("`{}` cannot size a memory block", init.kind),
            ))
        }
    };

    let rec = match sy.data.as_mut() {
        Some(rec) => rec,
        None => {
            return Err(CompileError::internal(
                node_loc(module, node),
                "data symbol without a data record",
            ))
        }
    };
    rec.size = size;
    rec.elem = elem;
    rec.contents = contents;
    sy.ty = Type::Ptr;
    node.ty = Type::Ptr;
    Ok(())
}

/// Escape-aware length of a string initializer body: a backslash and
/// the unit it escapes count as one.
fn string_size(inner: &str) -> u64 {
    let bytes = inner.as_bytes();
    let mut size = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 1;
        }
        size += 1;
        i += 1;
    }
    size
}

/// Children of a constant node: name, literal.
fn check_const<'s>(module: &str, sy: &mut Symbol<'s>, node: &mut Node<'s>) -> CheckResult<()> {
    let lit = node.expect_child(1);
    match lit.kind {
        LexKind::StringLit | LexKind::Identifier => Err(CompileError::new(
            ErrorKind::CannotUseStringInExpr,
            node_loc(module, lit),
            "a constant needs a numeric, character, or bool literal",
        )),
        k if k.is_int_literal() || matches!(k, LexKind::CharLit | LexKind::True | LexKind::False) =>
        {
            let ty = literal_type(module, lit)?;
            let value = match lit.kind {
                LexKind::True => 1,
                LexKind::False => 0,
                _ => lit.value.unwrap_or(0),
            };
            sy.cons = Some(crate::module::ConstRecord {
                text: lit.text,
                value,
            });
            sy.ty = ty.clone();
            node.expect_child_mut(1).ty = ty.clone();
            node.ty = ty;
            Ok(())
        }
        _ => Err(CompileError::new(
            ErrorKind::CannotUseStringInExpr,
            node_loc(module, lit),
            "a constant needs a numeric, character, or bool literal",
        )),
    }
}

/// Type of a literal node, from its lexical kind. Values must fit the
/// declared width.
pub(super) fn literal_type(module: &str, n: &Node<'_>) -> CheckResult<Type> {
    let ty = match n.kind {
        LexKind::I64Lit => Type::I64,
        LexKind::I16Lit => Type::I16,
        LexKind::I8Lit => Type::I8,
        LexKind::PtrLit => Type::Ptr,
        LexKind::CharLit => Type::I8,
        LexKind::StringLit => Type::Ptr,
        LexKind::True | LexKind::False => Type::Bool,
        _ => {
            return Err(CompileError::internal(
                node_loc(module, n),
                format!("`{}` is not a literal", n.kind),
            ))
        }
    };
    let limit = match ty {
        Type::I8 => 0xFF,
        Type::I16 => 0xFFFF,
        _ => return Ok(ty),
    };
    match n.value {
        Some(value) if value > limit => {
            Err(CompileError::value_out_of_bounds(node_loc(module, n), n.text))
        }
        _ => Ok(ty),
    }
}
