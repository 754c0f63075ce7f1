//! Symbols and modules
//!
//! A module owns its syntax tree, a table of global symbols (including
//! builtins and imports), the list of exported names, and the names of
//! the modules it depends on. The checker mutates the tree (type slots)
//! and the symbol tables in place; the IR generator attaches a CFG to
//! every procedure symbol.

use crate::ast::Node;
use crate::ir::Cfg;
use crate::span::SourceLocation;
use crate::types::Type;
use std::collections::HashMap;
use std::fmt;

/// What a named entity is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Procedure,
    /// A static memory block.
    Data,
    Const,
    Var,
    Arg,
    /// A whole-module import.
    Module,
    Builtin,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolKind::Procedure => "proc",
            SymbolKind::Data => "data",
            SymbolKind::Const => "const",
            SymbolKind::Var => "var",
            SymbolKind::Arg => "arg",
            SymbolKind::Module => "module",
            SymbolKind::Builtin => "builtin",
        };
        write!(f, "{}", s)
    }
}

/// A named top-level or procedure-scope entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol<'s> {
    pub name: &'s str,
    pub kind: SymbolKind,
    pub ty: Type,
    /// Index of the defining node among the module root's children.
    /// Vacant for builtins, imports, and procedure-scope symbols.
    pub decl: Option<usize>,
    /// Name of the module this symbol was imported from.
    pub external: Option<String>,
    /// Cycle guard for symbol resolution.
    pub visited: bool,
    pub proc: Option<ProcRecord<'s>>,
    pub data: Option<DataRecord<'s>>,
    pub cons: Option<ConstRecord<'s>>,
}

impl<'s> Symbol<'s> {
    fn new(name: &'s str, kind: SymbolKind, decl: Option<usize>) -> Self {
        Self {
            name,
            kind,
            ty: Type::Invalid,
            decl,
            external: None,
            visited: false,
            proc: None,
            data: None,
            cons: None,
        }
    }

    /// A procedure global; the record is filled by the checker.
    pub fn procedure(name: &'s str, decl: usize) -> Self {
        Self {
            proc: Some(ProcRecord::default()),
            ..Self::new(name, SymbolKind::Procedure, Some(decl))
        }
    }

    /// A memory-block global; the record is filled by the checker.
    pub fn data(name: &'s str, decl: usize) -> Self {
        Self {
            data: Some(DataRecord::default()),
            ..Self::new(name, SymbolKind::Data, Some(decl))
        }
    }

    /// A constant global; the record is filled by the checker.
    pub fn constant(name: &'s str, decl: usize) -> Self {
        Self::new(name, SymbolKind::Const, Some(decl))
    }

    /// A whole-module import.
    pub fn module(name: &'s str) -> Self {
        Self::new(name, SymbolKind::Module, None)
    }

    /// A symbol imported from another module. Kind and type are copied
    /// from the origin when the checker resolves imports.
    pub fn imported(name: &'s str, origin: impl Into<String>) -> Self {
        Self {
            external: Some(origin.into()),
            ..Self::new(name, SymbolKind::Procedure, None)
        }
    }

    /// An argument or variable inside a procedure scope.
    pub fn local(name: &'s str, kind: SymbolKind, ty: Type) -> Self {
        Self {
            ty,
            ..Self::new(name, kind, None)
        }
    }

    /// A builtin procedure with a fixed type.
    pub fn builtin(name: &'s str, ty: Type) -> Self {
        Self {
            ty,
            ..Self::new(name, SymbolKind::Builtin, None)
        }
    }
}

/// Per-procedure scope and, after IR generation, its control-flow graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcRecord<'s> {
    /// Ordered argument symbols.
    pub args: Vec<Symbol<'s>>,
    /// Argument name to insertion index.
    pub arg_map: HashMap<&'s str, usize>,
    /// Ordered variable symbols.
    pub vars: Vec<Symbol<'s>>,
    /// Variable name to insertion index.
    pub var_map: HashMap<&'s str, usize>,
    /// Ordered return types.
    pub rets: Vec<Type>,
    /// The derived procedure type.
    pub ty: Type,
    /// Filled by the IR generator; the entry block is `cfg.entry`.
    pub cfg: Option<Cfg>,
}

impl<'s> ProcRecord<'s> {
    /// Resolve a name in procedure scope: arguments first, then
    /// variables.
    pub fn lookup(&self, name: &str) -> Option<&Symbol<'s>> {
        if let Some(&i) = self.arg_map.get(name) {
            return self.args.get(i);
        }
        if let Some(&i) = self.var_map.get(name) {
            return self.vars.get(i);
        }
        None
    }

    /// Forget everything a previous checker run registered.
    pub fn clear(&mut self) {
        self.args.clear();
        self.arg_map.clear();
        self.vars.clear();
        self.var_map.clear();
        self.rets.clear();
        self.ty = Type::Invalid;
        self.cfg = None;
    }
}

/// Size and initializer of a memory block.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord<'s> {
    /// Size in bytes, from the initializer literal.
    pub size: u64,
    /// Element type of indexed access.
    pub elem: Type,
    /// Raw text of a string initializer, escapes intact.
    pub contents: Option<&'s str>,
}

impl Default for DataRecord<'_> {
    fn default() -> Self {
        Self {
            size: 0,
            elem: Type::I8,
            contents: None,
        }
    }
}

/// The literal a constant stands for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstRecord<'s> {
    pub text: &'s str,
    pub value: i64,
}

/// A compilation unit.
#[derive(Debug, Clone)]
pub struct Module<'s> {
    pub name: String,
    /// Top-level declarations, a `Block` node.
    pub root: Node<'s>,
    /// Global symbols: declarations, imports, and builtins.
    pub globals: HashMap<&'s str, Symbol<'s>>,
    /// Exported names as written, validated by the checker.
    pub exported: Vec<&'s str>,
    /// Import alias to module name.
    pub dependencies: HashMap<&'s str, String>,
    /// DFS mark for the checker's dependency walk.
    pub visited: bool,
}

impl<'s> Module<'s> {
    pub fn new(name: impl Into<String>, root: Node<'s>) -> Self {
        Self {
            name: name.into(),
            root,
            globals: HashMap::new(),
            exported: Vec::new(),
            dependencies: HashMap::new(),
            visited: false,
        }
    }

    pub fn get_symbol(&self, name: &str) -> Option<&Symbol<'s>> {
        self.globals.get(name)
    }

    /// An exported symbol, if `name` is both exported and defined.
    pub fn exported_symbol(&self, name: &str) -> Option<&Symbol<'s>> {
        if self.exported.iter().any(|e| *e == name) {
            self.globals.get(name)
        } else {
            None
        }
    }

    /// A diagnostic location inside this module.
    pub fn location(&self, node: &Node<'s>) -> SourceLocation {
        SourceLocation::new(self.name.clone(), node.range)
    }
}

/// Every module of the program, keyed by module name.
pub type ModuleMap<'s> = HashMap<String, Module<'s>>;
