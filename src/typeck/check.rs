//! Pass B: procedure body checking
//!
//! Statements and expressions. Every operator is parameterised by an
//! input class (a predicate over operand types) and an output deriver;
//! both are plain function pointers kept in small table entries rather
//! than closures.

use crate::ast::Node;
use crate::error::{CheckResult, CompileError, ErrorKind};
use crate::module::{Module, ModuleMap, ProcRecord, Symbol};
use crate::span::SourceLocation;
use crate::token::LexKind;
use crate::types::Type;
use std::collections::HashMap;

use super::node_loc;
use super::symbols::{literal_type, resolve_annotation};

/// Everything visible from inside one procedure body.
pub(super) struct ProcScope<'a, 's> {
    pub module: &'a str,
    pub world: &'a ModuleMap<'s>,
    pub globals: &'a HashMap<&'s str, Symbol<'s>>,
    pub dependencies: &'a HashMap<&'s str, String>,
    pub proc: &'a ProcRecord<'s>,
}

impl<'s> ProcScope<'_, 's> {
    fn loc(&self, n: &Node<'s>) -> SourceLocation {
        node_loc(self.module, n)
    }
}

/// An operator's input class: which operand types it admits.
struct OpClass {
    describe: &'static str,
    admits: fn(&Type) -> bool,
}

/// An operator's output deriver: result type from an admissible
/// operand type.
type Deriver = fn(&Type) -> Type;

const NUMBER: OpClass = OpClass {
    describe: "integer or pointer types",
    admits: Type::is_number,
};
const BASIC: OpClass = OpClass {
    describe: "integer, pointer or bool types",
    admits: Type::is_basic,
};
const BOOLEAN: OpClass = OpClass {
    describe: "bool",
    admits: Type::is_bool,
};

fn out_same(t: &Type) -> Type {
    t.clone()
}

fn out_bool(_: &Type) -> Type {
    Type::Bool
}

pub(super) fn check_bodies<'s>(world: &ModuleMap<'s>, m: &mut Module<'s>) -> CheckResult<()> {
    let Module {
        name,
        root,
        globals,
        dependencies,
        ..
    } = m;
    let name = name.as_str();
    let globals = &*globals;
    let dependencies = &*dependencies;
    for slot in root.children.iter_mut() {
        let node = match slot.as_mut() {
            Some(node) => node,
            None => continue,
        };
        if node.kind != LexKind::Proc {
            continue;
        }
        let proc_name = node.expect_child(0).text;
        let sy = match globals.get(proc_name) {
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
        let scope = ProcScope {
            module: name,
            world,
            globals,
            dependencies,
            proc,
        };
        check_block(&scope, node.expect_child_mut(4))?;
    }
    Ok(())
}

fn check_block<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    for stmt in n.children.iter_mut().flatten() {
        check_statement(scope, stmt)?;
    }
    Ok(())
}

fn check_statement<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    match n.kind {
        LexKind::Eof => Ok(()),
        LexKind::If => check_if(scope, n),
        LexKind::While => check_while(scope, n),
        LexKind::Return => check_return(scope, n),
        LexKind::Set => check_set(scope, n),
        LexKind::Exit => check_exit(scope, n),
        _ => check_expr(scope, n),
    }
}

fn check_condition<'s>(scope: &ProcScope<'_, 's>, cond: &mut Node<'s>) -> CheckResult<()> {
    check_expr(scope, cond)?;
    check_expr_type(scope, cond)?;
    if !cond.ty.is_bool() {
        return Err(CompileError::expected_bool(scope.loc(cond), &cond.ty));
    }
    Ok(())
}

/// Children of an `if` node: condition, block, elseif chain, else.
fn check_if<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    check_condition(scope, n.expect_child_mut(0))?;
    check_block(scope, n.expect_child_mut(1))?;
    if let Some(chain) = n.child_mut(2) {
        for arm in chain.children.iter_mut().flatten() {
            check_condition(scope, arm.expect_child_mut(0))?;
            check_block(scope, arm.expect_child_mut(1))?;
        }
    }
    if let Some(els) = n.child_mut(3) {
        check_block(scope, els.expect_child_mut(0))?;
    }
    Ok(())
}

fn check_while<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    check_condition(scope, n.expect_child_mut(0))?;
    check_block(scope, n.expect_child_mut(1))
}

fn check_return<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    for (i, ret) in n.children.iter_mut().flatten().enumerate() {
        match scope.proc.rets.get(i) {
            None => {
                return Err(CompileError::new(
                    ErrorKind::InvalidNumberOfReturns,
                    scope.loc(ret),
                    format!("procedure returns {} values", scope.proc.rets.len()),
                ))
            }
            Some(expected) => {
                check_expr(scope, ret)?;
                if ret.ty != *expected {
                    return Err(CompileError::new(
                        ErrorKind::MismatchedReturnType,
                        scope.loc(ret),
                        format!("returned `{}`, declared `{}`", ret.ty, expected),
                    ));
                }
            }
        }
    }
    Ok(())
}

fn check_exit<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    {
        let value = n.expect_child_mut(0);
        check_expr(scope, value)?;
        check_expr_type(scope, value)?;
        if value.ty != Type::I8 {
            return Err(CompileError::new(
                ErrorKind::ExitMustBeI8,
                scope.loc(value),
                format!("exit value is `{}`, expected `i8`", value.ty),
            ));
        }
    }
    n.ty = Type::Void;
    Ok(())
}

/// Children of a `set` node: assignee list, operator, right-hand side.
fn check_set<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    check_assignees(scope, n.expect_child_mut(0))?;
    let op_kind = n.expect_child(1).kind;

    if n.expect_child(2).kind == LexKind::ExprList {
        return check_pairwise_set(scope, n, op_kind);
    }

    check_expr(scope, n.expect_child_mut(2))?;

    let left_len = n.expect_child(0).arity();
    let right = n.expect_child(2);
    let rty = right.ty.clone();
    if rty.is_invalid() {
        return Err(CompileError::internal(
            scope.loc(right),
            "right-hand side was not typed",
        ));
    }
    if (rty.is_multi_ret() || left_len > 1) && op_kind != LexKind::Assignment {
        return Err(CompileError::new(
            ErrorKind::CanOnlyUseNormalAssignment,
            scope.loc(n),
            "compound assignment takes a single assignee and a single value",
        ));
    }
    if (!rty.is_multi_ret() && left_len > 1) || (rty.is_multi_ret() && left_len == 1) {
        return Err(CompileError::new(
            ErrorKind::MismatchedAssignment,
            scope.loc(n),
            format!("{} assignees, and the right side is `{}`", left_len, rty),
        ));
    }
    if rty.is_void() {
        return Err(CompileError::new(
            ErrorKind::CannotUseVoid,
            scope.loc(right),
            "the right-hand side yields no value",
        ));
    }

    if rty.is_multi_ret() {
        return check_multi_assignment(scope, n);
    }

    let assignee = n.expect_child(0).expect_child(0);
    if assignee.ty != rty {
        return Err(CompileError::new(
            ErrorKind::MismatchedTypeInAssign,
            scope.loc(n),
            format!("assigning `{}` to `{}`", rty, assignee.ty),
        ));
    }
    if op_kind != LexKind::Assignment && !assignee.ty.is_number() {
        return Err(CompileError::new(
            ErrorKind::ExpectedNumber,
            scope.loc(assignee),
            format!("compound assignment needs a number, found `{}`", assignee.ty),
        ));
    }
    Ok(())
}

/// `set a, b = x, y` — one value per assignee, element-wise.
fn check_pairwise_set<'s>(
    scope: &ProcScope<'_, 's>,
    n: &mut Node<'s>,
    op_kind: LexKind,
) -> CheckResult<()> {
    {
        let right = n.expect_child_mut(2);
        for value in right.children.iter_mut().flatten() {
            check_expr(scope, value)?;
            check_expr_type(scope, value)?;
        }
    }
    let left_len = n.expect_child(0).arity();
    let right_len = n.expect_child(2).arity();
    if op_kind != LexKind::Assignment && (left_len > 1 || right_len > 1) {
        return Err(CompileError::new(
            ErrorKind::CanOnlyUseNormalAssignment,
            scope.loc(n),
            "compound assignment takes a single assignee and a single value",
        ));
    }
    if left_len != right_len {
        return Err(CompileError::new(
            ErrorKind::MismatchedAssignment,
            scope.loc(n),
            format!("{} assignees but {} values", left_len, right_len),
        ));
    }
    for i in 0..left_len {
        let assignee = n.expect_child(0).expect_child(i);
        let value = n.expect_child(2).expect_child(i);
        if assignee.ty != value.ty {
            return Err(CompileError::new(
                ErrorKind::MismatchedTypeInAssign,
                scope.loc(value),
                format!("assigning `{}` to `{}`", value.ty, assignee.ty),
            ));
        }
        if op_kind != LexKind::Assignment && !assignee.ty.is_number() {
            return Err(CompileError::new(
                ErrorKind::ExpectedNumber,
                scope.loc(assignee),
                format!("compound assignment needs a number, found `{}`", assignee.ty),
            ));
        }
    }
    Ok(())
}

/// The right-hand side is a multi-value call; arity and element types
/// must match the assignee list.
fn check_multi_assignment<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    let callee = n.expect_child(2).expect_child(1);
    let rets = match &callee.ty {
        Type::Proc(p) => p.rets.clone(),
        _ => {
            return Err(CompileError::internal(
                scope.loc(callee),
                "multi-value expression is not a call",
            ))
        }
    };
    let left = n.expect_child(0);
    if left.arity() != rets.len() {
        return Err(CompileError::new(
            ErrorKind::MismatchedMultiRetAssignment,
            scope.loc(left),
            format!("{} assignees for {} returned values", left.arity(), rets.len()),
        ));
    }
    for (i, assignee) in left.children.iter().flatten().enumerate() {
        if assignee.ty != rets[i] {
            return Err(CompileError::new(
                ErrorKind::MismatchedTypeInMultiRetAssign,
                scope.loc(assignee),
                format!("assignee is `{}`, value is `{}`", assignee.ty, rets[i]),
            ));
        }
    }
    Ok(())
}

/// Each assignee is an identifier, a dereference, or a memory index.
fn check_assignees<'s>(scope: &ProcScope<'_, 's>, list: &mut Node<'s>) -> CheckResult<()> {
    for assignee in list.children.iter_mut().flatten() {
        match assignee.kind {
            LexKind::Identifier => check_id_assignee(scope, assignee)?,
            LexKind::At => check_deref(scope, assignee)?,
            LexKind::LeftBracket => check_index(scope, assignee)?,
            _ => {
                return Err(CompileError::new(
                    ErrorKind::NotAssignable,
                    scope.loc(assignee),
                    format!("`{}` cannot be assigned to", assignee.kind),
                ))
            }
        }
    }
    Ok(())
}

fn check_id_assignee<'s>(scope: &ProcScope<'_, 's>, assignee: &mut Node<'s>) -> CheckResult<()> {
    if let Some(local) = scope.proc.lookup(assignee.text) {
        assignee.ty = local.ty.clone();
        return Ok(());
    }
    if scope.globals.contains_key(assignee.text) {
        return Err(CompileError::new(
            ErrorKind::CanOnlyAssignLocal,
            scope.loc(assignee),
            format!("`{}` is a global", assignee.text),
        ));
    }
    Err(CompileError::name_not_defined(
        scope.loc(assignee),
        assignee.text,
    ))
}

fn check_expr<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    match n.kind {
        LexKind::Identifier => check_id(scope, n),
        LexKind::DoubleColon => check_external_id(scope, n),
        LexKind::SizeOf => {
            resolve_annotation(scope.module, n.expect_child_mut(0))?;
            n.ty = Type::I64;
            Ok(())
        }
        k if k.is_literal() => {
            n.ty = literal_type(scope.module, n)?;
            Ok(())
        }
        LexKind::Minus | LexKind::Plus => {
            if n.arity() == 1 {
                unary_op(scope, n, &NUMBER, out_same)
            } else {
                binary_op(scope, n, &NUMBER, out_same)
            }
        }
        LexKind::Neg => unary_op(scope, n, &NUMBER, out_same),
        LexKind::Multiplication
        | LexKind::Division
        | LexKind::Remainder
        | LexKind::BitAnd
        | LexKind::BitOr
        | LexKind::BitXor
        | LexKind::ShiftLeft
        | LexKind::ShiftRight => binary_op(scope, n, &NUMBER, out_same),
        LexKind::Equals
        | LexKind::Different
        | LexKind::More
        | LexKind::MoreEq
        | LexKind::Less
        | LexKind::LessEq => binary_op(scope, n, &BASIC, out_bool),
        LexKind::And | LexKind::Or => binary_op(scope, n, &BOOLEAN, out_bool),
        LexKind::Not => unary_op(scope, n, &BOOLEAN, out_bool),
        LexKind::Colon => conversion(scope, n),
        LexKind::Call => check_call(scope, n),
        LexKind::At => check_deref(scope, n),
        LexKind::Dot => property_access(scope, n),
        LexKind::LeftBracket => check_index(scope, n),
        _ => Ok(()),
    }
}

/// Reject types that cannot flow into an enclosing expression.
fn check_expr_type<'s>(scope: &ProcScope<'_, 's>, n: &Node<'s>) -> CheckResult<()> {
    if n.ty.is_multi_ret() {
        return Err(CompileError::new(
            ErrorKind::InvalidTypeForExpr,
            scope.loc(n),
            "expression yields multiple values",
        ));
    }
    if n.ty.is_void() {
        return Err(CompileError::new(
            ErrorKind::CannotUseVoid,
            scope.loc(n),
            "expression yields no value",
        ));
    }
    if n.ty.is_invalid() {
        return Err(CompileError::new(
            ErrorKind::InvalidType,
            scope.loc(n),
            "expression has no type",
        ));
    }
    Ok(())
}

/// `a op b` where both operand types satisfy the class, the types are
/// equal, and the result is the deriver applied to them.
fn binary_op<'s>(
    scope: &ProcScope<'_, 's>,
    n: &mut Node<'s>,
    class: &OpClass,
    der: Deriver,
) -> CheckResult<()> {
    if n.arity() != 2 {
        return Err(CompileError::internal(
            scope.loc(n),
            "binary operator without two operands",
        ));
    }
    for i in 0..2 {
        let operand = n.expect_child_mut(i);
        check_expr(scope, operand)?;
        check_expr_type(scope, operand)?;
    }
    let lty = n.expect_child(0).ty.clone();
    let rty = n.expect_child(1).ty.clone();
    if !(class.admits)(&lty) {
        return Err(CompileError::invalid_class(
            scope.loc(n.expect_child(0)),
            &lty,
            class.describe,
        ));
    }
    if !(class.admits)(&rty) {
        return Err(CompileError::invalid_class(
            scope.loc(n.expect_child(1)),
            &rty,
            class.describe,
        ));
    }
    if lty != rty {
        return Err(CompileError::unequal_types(scope.loc(n), &lty, &rty));
    }
    n.ty = der(&lty);
    Ok(())
}

/// `op a` where the operand type satisfies the class.
fn unary_op<'s>(
    scope: &ProcScope<'_, 's>,
    n: &mut Node<'s>,
    class: &OpClass,
    der: Deriver,
) -> CheckResult<()> {
    if n.arity() != 1 {
        return Err(CompileError::internal(
            scope.loc(n),
            "unary operator without one operand",
        ));
    }
    {
        let operand = n.expect_child_mut(0);
        check_expr(scope, operand)?;
        check_expr_type(scope, operand)?;
    }
    let ty = n.expect_child(0).ty.clone();
    if !(class.admits)(&ty) {
        return Err(CompileError::invalid_class(
            scope.loc(n.expect_child(0)),
            &ty,
            class.describe,
        ));
    }
    n.ty = der(&ty);
    Ok(())
}

/// `T : e` — children: target type, expression.
fn conversion<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    let ty = resolve_annotation(scope.module, n.expect_child_mut(0))?;
    if !ty.is_basic() {
        return Err(CompileError::new(
            ErrorKind::ExpectedBasicOrProcType,
            scope.loc(n.expect_child(0)),
            format!("cannot convert to `{}`", ty),
        ));
    }
    {
        let operand = n.expect_child_mut(1);
        check_expr(scope, operand)?;
        check_expr_type(scope, operand)?;
    }
    n.ty = ty;
    Ok(())
}

/// Children of a call node: argument list, callee.
fn check_call<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    let call_loc = scope.loc(n);
    check_expr(scope, n.expect_child_mut(1))?;
    let callee = n.expect_child(1);
    let proc_ty = match &callee.ty {
        Type::Proc(p) => p.clone(),
        other => {
            return Err(CompileError::expected_procedure(scope.loc(callee), other));
        }
    };

    let args = n.expect_child_mut(0);
    if args.arity() != proc_ty.args.len() {
        return Err(CompileError::new(
            ErrorKind::InvalidNumberOfArgs,
            call_loc,
            format!(
                "expected {} arguments, found {}",
                proc_ty.args.len(),
                args.arity()
            ),
        ));
    }
    for (i, arg) in args.children.iter_mut().flatten().enumerate() {
        check_expr(scope, arg)?;
        if arg.ty != proc_ty.args[i] {
            return Err(CompileError::new(
                ErrorKind::MismatchedTypeForArgument,
                node_loc(scope.module, arg),
                format!("argument is `{}`, parameter is `{}`", arg.ty, proc_ty.args[i]),
            ));
        }
    }

    n.ty = match proc_ty.rets.len() {
        0 => Type::Void,
        1 => proc_ty.rets[0].clone(),
        _ => Type::MultiRet,
    };
    Ok(())
}

/// `module::name` — children: module alias, exported name.
fn check_external_id<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    let alias = n.expect_child(0).text;
    let target = match scope.dependencies.get(alias) {
        Some(target) => target,
        None => {
            return Err(CompileError::name_not_defined(
                scope.loc(n.expect_child(0)),
                alias,
            ))
        }
    };
    let dep = match scope.world.get(target) {
        Some(dep) => dep,
        None => {
            return Err(CompileError::internal(
                scope.loc(n),
                format!("dependency `{}` not loaded", target),
            ))
        }
    };
    let name = n.expect_child(1).text;
    let sy = match dep.exported_symbol(name) {
        Some(sy) => sy,
        None => {
            return Err(CompileError::name_not_exported(
                scope.loc(n.expect_child(1)),
                target,
                name,
            ))
        }
    };
    let ty = sy.ty.clone();
    n.expect_child_mut(1).ty = ty.clone();
    n.ty = ty;
    Ok(())
}

/// Arguments first, then variables, then module globals.
fn check_id<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    if let Some(local) = scope.proc.lookup(n.text) {
        n.ty = local.ty.clone();
        return Ok(());
    }
    if let Some(global) = scope.globals.get(n.text) {
        n.ty = global.ty.clone();
        return Ok(());
    }
    Err(CompileError::name_not_defined(scope.loc(n), n.text))
}

/// `@T e` — children: result type, address expression.
fn check_deref<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    let ty = resolve_annotation(scope.module, n.expect_child_mut(0))?;
    n.ty = ty;
    let operand = n.expect_child_mut(1);
    check_expr(scope, operand)?;
    check_expr_type(scope, operand)?;
    if !operand.ty.is_ptr() {
        return Err(CompileError::new(
            ErrorKind::CanOnlyDerefPointers,
            scope.loc(operand),
            format!("dereferenced a `{}`", operand.ty),
        ));
    }
    Ok(())
}

/// `m.p` — children: property, memory name. The only property is
/// `size`.
fn property_access<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    {
        let mem = n.expect_child(1);
        if mem.kind != LexKind::Identifier {
            return Err(CompileError::new(
                ErrorKind::ExpectedData,
                scope.loc(mem),
                "properties exist on memory declarations only",
            ));
        }
        match scope.globals.get(mem.text) {
            None => {
                return Err(CompileError::name_not_defined(scope.loc(mem), mem.text));
            }
            Some(sy) if sy.data.is_none() => {
                return Err(CompileError::new(
                    ErrorKind::ExpectedData,
                    scope.loc(mem),
                    format!("`{}` is a {}", mem.text, sy.kind),
                ));
            }
            Some(_) => {}
        }
        let prop = n.expect_child(0);
        if prop.kind != LexKind::Identifier || prop.text != "size" {
            return Err(CompileError::new(
                ErrorKind::InvalidProp,
                scope.loc(prop),
                format!("`{}` is not a property", prop.text),
            ));
        }
    }
    n.ty = Type::I64;
    Ok(())
}

/// `mem[e]` — children: index expression, memory name. The node's type
/// is the memory's element type.
fn check_index<'s>(scope: &ProcScope<'_, 's>, n: &mut Node<'s>) -> CheckResult<()> {
    let elem = {
        let mem = n.expect_child(1);
        if mem.kind != LexKind::Identifier {
            return Err(CompileError::new(
                ErrorKind::ExpectedData,
                scope.loc(mem),
                "only memory declarations can be indexed",
            ));
        }
        if scope.proc.lookup(mem.text).is_some() {
            return Err(CompileError::new(
                ErrorKind::ExpectedData,
                scope.loc(mem),
                format!("`{}` is a local", mem.text),
            ));
        }
        let sy = match scope.globals.get(mem.text) {
            None => {
                return Err(CompileError::name_not_defined(scope.loc(mem), mem.text));
            }
            Some(sy) => sy,
        };
        match &sy.data {
            None => {
                return Err(CompileError::new(
                    ErrorKind::ExpectedData,
                    scope.loc(mem),
                    format!("`{}` is a {}", mem.text, sy.kind),
                ));
            }
            Some(data) => data.elem.clone(),
        }
    };
    n.expect_child_mut(1).ty = Type::Ptr;
    {
        let index = n.expect_child_mut(0);
        check_expr(scope, index)?;
        check_expr_type(scope, index)?;
        if !index.ty.is_number() {
            return Err(CompileError::invalid_class(
                scope.loc(index),
                &index.ty,
                NUMBER.describe,
            ));
        }
    }
    n.ty = elem;
    Ok(())
}
