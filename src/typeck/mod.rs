//! Type checker for Mica
//!
//! Walks the parsed tree of a module and all of its transitive
//! dependencies, resolves every identifier, writes a type onto every
//! expression node in place, and rejects ill-formed programs with the
//! first error found.
//!
//! # Architecture
//!
//! Checking is two passes per module, after a depth-first walk of the
//! dependency graph (dependencies first, a `visited` flag guards
//! re-entry — dependency cycles are rejected upstream):
//!
//! 1. **Pass A** (`symbols`): register procedure arguments, variables
//!    and returns, derive procedure types, size memory blocks, type
//!    constants. After this pass every global has its final type, so
//!    forward references inside a module resolve.
//! 2. **Pass B** (`check`): check every procedure body statement by
//!    statement.
//!
//! The root invocation finishes by verifying the entry point: a global
//! `main` of type `proc()`.

mod check;
mod symbols;

use crate::ast::Node;
use crate::error::{CheckResult, CompileError, ErrorKind};
use crate::module::{Module, ModuleMap, Symbol};
use crate::span::{Range, SourceLocation};
use crate::types::Type;
use std::collections::HashSet;

/// Check the root module and everything it depends on.
pub fn check<'s>(modules: &mut ModuleMap<'s>, root: &str) -> CheckResult<()> {
    check_module(modules, root)?;
    reset_visited(modules);
    check_main(modules, root)
}

/// A diagnostic location for a node inside the named module.
pub(crate) fn node_loc(module: &str, node: &Node<'_>) -> SourceLocation {
    SourceLocation::new(module.to_string(), node.range)
}

fn module_loc(module: &str) -> SourceLocation {
    SourceLocation::new(module.to_string(), Range::default())
}

fn check_module<'s>(modules: &mut ModuleMap<'s>, name: &str) -> CheckResult<()> {
    let m = modules
        .get_mut(name)
        .ok_or_else(|| CompileError::module_not_found(module_loc(name), name))?;
    if m.visited {
        return Ok(());
    }
    m.visited = true;

    let mut deps: Vec<String> = m.dependencies.values().cloned().collect();
    deps.sort();
    deps.dedup();
    for dep in deps {
        check_module(modules, &dep)?;
    }

    // Take the module out of the map so its tree and tables can be
    // mutated while its dependencies stay readable.
    let mut m = modules
        .remove(name)
        .ok_or_else(|| CompileError::internal(module_loc(name), "module vanished mid-check"))?;
    let result = check_module_inner(modules, &mut m);
    modules.insert(name.to_string(), m);
    result
}

fn check_module_inner<'s>(world: &ModuleMap<'s>, m: &mut Module<'s>) -> CheckResult<()> {
    inject_builtins(m);
    check_exports(m)?;
    resolve_imports(world, m)?;
    symbols::check_symbols(m)?;
    check::check_bodies(world, m)
}

/// Install the built-in globals every module sees.
fn inject_builtins(m: &mut Module<'_>) {
    let sink = Type::proc(vec![Type::Ptr, Type::I64], vec![]);
    let source = Type::proc(vec![Type::Ptr, Type::I64], vec![Type::I64]);
    m.globals.insert("write", Symbol::builtin("write", sink.clone()));
    m.globals.insert("error", Symbol::builtin("error", sink));
    m.globals.insert("read", Symbol::builtin("read", source));
}

/// Every exported name must be defined, and defined once in the list.
fn check_exports(m: &Module<'_>) -> CheckResult<()> {
    let mut seen = HashSet::new();
    for name in &m.exported {
        if !seen.insert(*name) {
            return Err(CompileError::new(
                ErrorKind::DuplicatedExport,
                module_loc(&m.name),
                format!("`{}` is exported more than once", name),
            ));
        }
        if !m.globals.contains_key(name) {
            return Err(CompileError::new(
                ErrorKind::ExportingUndefName,
                module_loc(&m.name),
                format!("exported name `{}` is not defined", name),
            ));
        }
    }
    Ok(())
}

/// Copy kind, type, and records onto imported symbols from the modules
/// that export them. Dependencies are fully checked at this point.
fn resolve_imports<'s>(world: &ModuleMap<'s>, m: &mut Module<'s>) -> CheckResult<()> {
    let mut names: Vec<&'s str> = m
        .globals
        .iter()
        .filter(|(_, sy)| sy.external.is_some())
        .map(|(name, _)| *name)
        .collect();
    names.sort();

    for name in names {
        let origin = match m.globals.get(name).and_then(|sy| sy.external.clone()) {
            Some(origin) => origin,
            None => continue,
        };
        let dep = world
            .get(&origin)
            .ok_or_else(|| CompileError::module_not_found(module_loc(&m.name), &origin))?;
        let found = dep.exported_symbol(name).ok_or_else(|| {
            CompileError::name_not_exported(module_loc(&m.name), &origin, name)
        })?;
        let kind = found.kind;
        let ty = found.ty.clone();
        let data = found.data.clone();
        let cons = found.cons;
        if let Some(sy) = m.globals.get_mut(name) {
            sy.kind = kind;
            sy.ty = ty;
            sy.data = data;
            sy.cons = cons;
        }
    }
    Ok(())
}

/// Verify the root module's entry point.
fn check_main(modules: &ModuleMap<'_>, root: &str) -> CheckResult<()> {
    let m = modules
        .get(root)
        .ok_or_else(|| CompileError::internal(module_loc(root), "root module vanished"))?;
    let main = match m.globals.get("main") {
        Some(main) => main,
        None => {
            return Err(CompileError::new(
                ErrorKind::NoEntryPoint,
                module_loc(&m.name),
                "no `main` procedure",
            ))
        }
    };
    if main.ty != Type::main_proc() {
        let loc = match main.decl.and_then(|i| m.root.child(i)) {
            Some(node) => node_loc(&m.name, node),
            None => module_loc(&m.name),
        };
        return Err(CompileError::new(
            ErrorKind::InvalidMain,
            loc,
            format!("`main` has type `{}`, expected `proc[]`", main.ty),
        ));
    }
    Ok(())
}

fn reset_visited(modules: &mut ModuleMap<'_>) {
    for m in modules.values_mut() {
        m.visited = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use crate::token::LexKind;

    #[test]
    fn test_empty_main_checks() {
        let world = check_one(ModuleBuilder::new("m").with_main().build()).expect("checks");
        let main = world["m"].globals.get("main").expect("main symbol");
        assert_eq!(main.ty, Type::main_proc());
    }

    #[test]
    fn test_missing_main() {
        let err = check_one(
            ModuleBuilder::new("m")
                .proc("helper", vec![], vec![], vec![], vec![])
                .build(),
        )
        .expect_err("no entry point");
        assert_eq!(err.kind, ErrorKind::NoEntryPoint);
    }

    #[test]
    fn test_main_with_wrong_type() {
        let err = check_one(
            ModuleBuilder::new("m")
                .proc("main", vec![decl("x")], vec![], vec![], vec![])
                .build(),
        )
        .expect_err("bad main");
        assert_eq!(err.kind, ErrorKind::InvalidMain);
    }

    #[test]
    fn test_builtins_are_injected() {
        let world = check_one(ModuleBuilder::new("m").with_main().build()).expect("checks");
        let write = world["m"].globals.get("write").expect("write");
        assert_eq!(write.ty, Type::proc(vec![Type::Ptr, Type::I64], vec![]));
        let read = world["m"].globals.get("read").expect("read");
        assert_eq!(
            read.ty,
            Type::proc(vec![Type::Ptr, Type::I64], vec![Type::I64])
        );
        assert!(world["m"].globals.contains_key("error"));
    }

    #[test]
    fn test_calling_a_builtin() {
        // main calls write(buf, 1)
        let m = ModuleBuilder::new("m")
            .memory("buf", string_lit(r#""hi""#), None)
            .proc(
                "main",
                vec![],
                vec![],
                vec![],
                vec![call(ident("write"), vec![ident("buf"), int("1")])],
            )
            .build();
        check_one(m).expect("checks");
    }

    #[test]
    fn test_export_of_undefined_name() {
        let err = check_one(ModuleBuilder::new("m").with_main().export("ghost").build())
            .expect_err("bad export");
        assert_eq!(err.kind, ErrorKind::ExportingUndefName);
    }

    #[test]
    fn test_duplicated_export() {
        let err = check_one(
            ModuleBuilder::new("m")
                .with_main()
                .export("main")
                .export("main")
                .build(),
        )
        .expect_err("duplicate export");
        assert_eq!(err.kind, ErrorKind::DuplicatedExport);
    }

    #[test]
    fn test_import_resolves_exported_type() {
        let util = ModuleBuilder::new("util")
            .proc(
                "double",
                vec![decl("x")],
                vec![LexKind::I64],
                vec![],
                vec![ret(vec![bin(LexKind::Plus, ident("x"), ident("x"))])],
            )
            .export("double")
            .build();
        let root = ModuleBuilder::new("app")
            .import_from("util", "double")
            .proc(
                "main",
                vec![],
                vec![],
                vec![decl("y")],
                vec![set(
                    vec![ident("y")],
                    LexKind::Assignment,
                    call(ident("double"), vec![int("21")]),
                )],
            )
            .build();
        let world = check_world(vec![util, root], "app").expect("checks");
        let imported = world["app"].globals.get("double").expect("imported");
        assert_eq!(imported.ty, Type::proc(vec![Type::I64], vec![Type::I64]));
        assert_eq!(imported.external.as_deref(), Some("util"));
    }

    #[test]
    fn test_import_of_unexported_name() {
        let util = ModuleBuilder::new("util")
            .proc("hidden", vec![], vec![], vec![], vec![])
            .build();
        let root = ModuleBuilder::new("app")
            .import_from("util", "hidden")
            .with_main()
            .build();
        let err = check_world(vec![util, root], "app").expect_err("not exported");
        assert_eq!(err.kind, ErrorKind::NameNotExported);
    }

    #[test]
    fn test_missing_dependency() {
        let root = ModuleBuilder::new("app").import("nowhere").with_main().build();
        let err = check_world(vec![root], "app").expect_err("missing module");
        assert_eq!(err.kind, ErrorKind::ModuleNotFound);
    }

    #[test]
    fn test_qualified_access() {
        let util = ModuleBuilder::new("util")
            .constant("answer", int("42"))
            .export("answer")
            .build();
        let root = ModuleBuilder::new("app")
            .import("util")
            .proc(
                "main",
                vec![],
                vec![],
                vec![decl("x")],
                vec![set(
                    vec![ident("x")],
                    LexKind::Assignment,
                    ext("util", "answer"),
                )],
            )
            .build();
        check_world(vec![util, root], "app").expect("checks");
    }

    #[test]
    fn test_qualified_access_to_unexported_name() {
        let util = ModuleBuilder::new("util").constant("secret", int("1")).build();
        let root = ModuleBuilder::new("app")
            .import("util")
            .proc(
                "main",
                vec![],
                vec![],
                vec![decl("x")],
                vec![set(
                    vec![ident("x")],
                    LexKind::Assignment,
                    ext("util", "secret"),
                )],
            )
            .build();
        let err = check_world(vec![util, root], "app").expect_err("not exported");
        assert_eq!(err.kind, ErrorKind::NameNotExported);
    }

    #[test]
    fn test_unknown_module_alias() {
        let root = ModuleBuilder::new("app")
            .proc(
                "main",
                vec![],
                vec![],
                vec![decl("x")],
                vec![set(
                    vec![ident("x")],
                    LexKind::Assignment,
                    ext("util", "answer"),
                )],
            )
            .build();
        let err = check_world(vec![root], "app").expect_err("unknown alias");
        assert_eq!(err.kind, ErrorKind::NameNotDefined);
    }

    #[test]
    fn test_diamond_dependencies_check_once() {
        // app -> left -> base, app -> right -> base
        let base = ModuleBuilder::new("base")
            .constant("one", int("1"))
            .export("one")
            .build();
        let left = ModuleBuilder::new("left")
            .import_from("base", "one")
            .proc("l", vec![], vec![LexKind::I64], vec![], vec![ret(vec![ident("one")])])
            .export("l")
            .build();
        let right = ModuleBuilder::new("right")
            .import_from("base", "one")
            .proc("r", vec![], vec![LexKind::I64], vec![], vec![ret(vec![ident("one")])])
            .export("r")
            .build();
        let root = ModuleBuilder::new("app")
            .import("left")
            .import("right")
            .proc(
                "main",
                vec![],
                vec![],
                vec![decl("x")],
                vec![
                    set(vec![ident("x")], LexKind::Assignment, call(ext("left", "l"), vec![])),
                    set(vec![ident("x")], LexKind::Assignment, call(ext("right", "r"), vec![])),
                ],
            )
            .build();
        let world = check_world(vec![base, left, right, root], "app").expect("checks");
        for m in world.values() {
            assert!(!m.visited, "visited flags reset after the walk");
        }
    }

    #[test]
    fn test_checking_twice_is_a_no_op() {
        let build = || {
            ModuleBuilder::new("m")
                .proc(
                    "main",
                    vec![],
                    vec![],
                    vec![decl("x")],
                    vec![set(
                        vec![ident("x")],
                        LexKind::Assignment,
                        bin(LexKind::Plus, int("1"), int("2")),
                    )],
                )
                .build()
        };
        let mut world = check_one(build()).expect("first run");
        let snapshot = world["m"].root.clone();
        check(&mut world, "m").expect("second run");
        assert_eq!(world["m"].root, snapshot);
    }
}
