//! Test helpers
//!
//! The parser is an external collaborator, so tests build its
//! documented output directly: tree nodes in the fixed child positions
//! the checker consumes, and modules with their parser-populated symbol
//! tables.

use crate::ast::Node;
use crate::error::CompileError;
use crate::module::{Module, ModuleMap, Symbol};
use crate::span::Range;
use crate::token::LexKind;
use std::collections::HashMap;

pub(crate) fn tok(kind: LexKind, text: &'static str) -> Node<'static> {
    Node::token(kind, text, Range::default())
}

pub(crate) fn ident(name: &'static str) -> Node<'static> {
    tok(LexKind::Identifier, name)
}

/// A literal node with its value decoded the way the lexer would.
pub(crate) fn lit(kind: LexKind, text: &'static str) -> Node<'static> {
    let value = crate::lexer::parse_int(text).expect("literal fits in 64 bits");
    Node::literal(kind, text, value, Range::default())
}

pub(crate) fn int(text: &'static str) -> Node<'static> {
    lit(LexKind::I64Lit, text)
}

pub(crate) fn bool_lit(value: bool) -> Node<'static> {
    if value {
        tok(LexKind::True, "true")
    } else {
        tok(LexKind::False, "false")
    }
}

/// Text includes the quotes, as in the source.
pub(crate) fn string_lit(text: &'static str) -> Node<'static> {
    tok(LexKind::StringLit, text)
}

pub(crate) fn ty_tok(kind: LexKind) -> Node<'static> {
    tok(kind, "")
}

fn tree(kind: LexKind, children: Vec<Option<Node<'static>>>) -> Node<'static> {
    Node::tree(kind, children)
}

fn list(kind: LexKind, items: Vec<Node<'static>>) -> Node<'static> {
    tree(kind, items.into_iter().map(Some).collect())
}

pub(crate) fn expr_list(items: Vec<Node<'static>>) -> Node<'static> {
    list(LexKind::ExprList, items)
}

pub(crate) fn block(stmts: Vec<Node<'static>>) -> Node<'static> {
    list(LexKind::Block, stmts)
}

pub(crate) fn bin(kind: LexKind, left: Node<'static>, right: Node<'static>) -> Node<'static> {
    tree(kind, vec![Some(left), Some(right)])
}

pub(crate) fn un(kind: LexKind, operand: Node<'static>) -> Node<'static> {
    tree(kind, vec![Some(operand)])
}

/// Call node: argument list, callee.
pub(crate) fn call(callee: Node<'static>, args: Vec<Node<'static>>) -> Node<'static> {
    tree(LexKind::Call, vec![Some(expr_list(args)), Some(callee)])
}

/// Set node: assignee list, operator, right-hand side.
pub(crate) fn set(
    assignees: Vec<Node<'static>>,
    op: LexKind,
    right: Node<'static>,
) -> Node<'static> {
    tree(
        LexKind::Set,
        vec![Some(expr_list(assignees)), Some(tok(op, "")), Some(right)],
    )
}

pub(crate) fn ret(values: Vec<Node<'static>>) -> Node<'static> {
    list(LexKind::Return, values)
}

pub(crate) fn exit_stmt(value: Node<'static>) -> Node<'static> {
    tree(LexKind::Exit, vec![Some(value)])
}

/// If node: condition, block, elseif chain, else.
pub(crate) fn if_stmt(
    cond: Node<'static>,
    then: Vec<Node<'static>>,
    elseifs: Vec<(Node<'static>, Vec<Node<'static>>)>,
    els: Option<Vec<Node<'static>>>,
) -> Node<'static> {
    let chain = if elseifs.is_empty() {
        None
    } else {
        let arms = elseifs
            .into_iter()
            .map(|(cond, body)| tree(LexKind::ElseIf, vec![Some(cond), Some(block(body))]))
            .collect();
        Some(list(LexKind::ElseIfChain, arms))
    };
    let els = els.map(|body| tree(LexKind::Else, vec![Some(block(body))]));
    tree(
        LexKind::If,
        vec![Some(cond), Some(block(then)), chain, els],
    )
}

/// While node: condition, block.
pub(crate) fn while_stmt(cond: Node<'static>, body: Vec<Node<'static>>) -> Node<'static> {
    tree(LexKind::While, vec![Some(cond), Some(block(body))])
}

/// Conversion node: target type, expression.
pub(crate) fn conv(ty: LexKind, operand: Node<'static>) -> Node<'static> {
    tree(LexKind::Colon, vec![Some(ty_tok(ty)), Some(operand)])
}

/// Dereference node: result type, address expression.
pub(crate) fn deref(ty: LexKind, addr: Node<'static>) -> Node<'static> {
    tree(LexKind::At, vec![Some(ty_tok(ty)), Some(addr)])
}

/// Memory index node: index expression, memory name.
pub(crate) fn index(mem: &'static str, idx: Node<'static>) -> Node<'static> {
    tree(LexKind::LeftBracket, vec![Some(idx), Some(ident(mem))])
}

/// Property node: property name, memory name.
pub(crate) fn dot(mem: &'static str, prop: &'static str) -> Node<'static> {
    tree(LexKind::Dot, vec![Some(ident(prop)), Some(ident(mem))])
}

/// Qualified name node: module alias, exported name.
pub(crate) fn ext(module: &'static str, name: &'static str) -> Node<'static> {
    tree(
        LexKind::DoubleColon,
        vec![Some(ident(module)), Some(ident(name))],
    )
}

pub(crate) fn sizeof(ty: LexKind) -> Node<'static> {
    tree(LexKind::SizeOf, vec![Some(ty_tok(ty))])
}

/// An unannotated declaration (defaults to i64).
pub(crate) fn decl(name: &'static str) -> Node<'static> {
    ident(name)
}

/// A `name:type` declaration.
pub(crate) fn typed_decl(name: &'static str, ty: LexKind) -> Node<'static> {
    tree(LexKind::Colon, vec![Some(ident(name)), Some(ty_tok(ty))])
}

/// Builds a module the way the parser would deliver it: a root block
/// of declarations plus prepopulated symbol, export, and dependency
/// tables.
pub(crate) struct ModuleBuilder {
    name: &'static str,
    decls: Vec<Option<Node<'static>>>,
    globals: HashMap<&'static str, Symbol<'static>>,
    exported: Vec<&'static str>,
    dependencies: HashMap<&'static str, String>,
}

impl ModuleBuilder {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            decls: Vec::new(),
            globals: HashMap::new(),
            exported: Vec::new(),
            dependencies: HashMap::new(),
        }
    }

    pub(crate) fn proc(
        mut self,
        name: &'static str,
        args: Vec<Node<'static>>,
        rets: Vec<LexKind>,
        vars: Vec<Node<'static>>,
        body: Vec<Node<'static>>,
    ) -> Self {
        let index = self.decls.len();
        let args = if args.is_empty() {
            None
        } else {
            Some(list(LexKind::DeclList, args))
        };
        let rets = if rets.is_empty() {
            None
        } else {
            Some(list(
                LexKind::TypeList,
                rets.into_iter().map(ty_tok).collect(),
            ))
        };
        let vars = if vars.is_empty() {
            None
        } else {
            Some(list(LexKind::DeclList, vars))
        };
        self.decls.push(Some(tree(
            LexKind::Proc,
            vec![Some(ident(name)), args, rets, vars, Some(block(body))],
        )));
        self.globals.insert(name, Symbol::procedure(name, index));
        self
    }

    /// An empty, well-typed entry point.
    pub(crate) fn with_main(self) -> Self {
        self.proc("main", vec![], vec![], vec![], vec![])
    }

    pub(crate) fn memory(
        mut self,
        name: &'static str,
        init: Node<'static>,
        elem: Option<LexKind>,
    ) -> Self {
        let index = self.decls.len();
        self.decls.push(Some(tree(
            LexKind::Memory,
            vec![Some(ident(name)), Some(init), elem.map(ty_tok)],
        )));
        self.globals.insert(name, Symbol::data(name, index));
        self
    }

    pub(crate) fn constant(mut self, name: &'static str, value: Node<'static>) -> Self {
        let index = self.decls.len();
        self.decls.push(Some(tree(
            LexKind::ConstDef,
            vec![Some(ident(name)), Some(value)],
        )));
        self.globals.insert(name, Symbol::constant(name, index));
        self
    }

    /// `import name` — the whole module, reachable as `name::member`.
    pub(crate) fn import(mut self, name: &'static str) -> Self {
        self.dependencies.insert(name, name.to_string());
        self.globals.insert(name, Symbol::module(name));
        self
    }

    /// `from origin import name` — one symbol, reachable unqualified.
    pub(crate) fn import_from(mut self, origin: &'static str, name: &'static str) -> Self {
        self.dependencies.insert(origin, origin.to_string());
        self.globals.insert(name, Symbol::imported(name, origin));
        self
    }

    pub(crate) fn export(mut self, name: &'static str) -> Self {
        self.exported.push(name);
        self
    }

    pub(crate) fn build(self) -> Module<'static> {
        let mut m = Module::new(self.name, tree(LexKind::Block, self.decls));
        m.globals = self.globals;
        m.exported = self.exported;
        m.dependencies = self.dependencies;
        m
    }
}

/// Check a world of one module.
pub(crate) fn check_one(m: Module<'static>) -> Result<ModuleMap<'static>, CompileError> {
    let name = m.name.clone();
    check_world(vec![m], &name)
}

/// Check a world of many modules from the given root.
pub(crate) fn check_world(
    modules: Vec<Module<'static>>,
    root: &str,
) -> Result<ModuleMap<'static>, CompileError> {
    let mut world: ModuleMap<'static> = modules
        .into_iter()
        .map(|m| (m.name.clone(), m))
        .collect();
    crate::typeck::check(&mut world, root)?;
    Ok(world)
}
