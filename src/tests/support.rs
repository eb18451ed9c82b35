//! Test doubles and IR builders.
//!
//! The external parser is replaced by [`FakeParser`], a fixed map from
//! file path to [`ParseOutput`]. The builders below construct IR the
//! way the parser contract specifies, including the derived symbol
//! table with reassignment flags.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::{
    ast::{
        ConstValue, DeclKind, Expr, FunctionShape, ImportBinding, ImportKind, ImportRecord,
        ImportedName, ParseError, ParseOutput, Parser, Stmt, SymbolKind, VarDeclarator,
    },
    BuildOptions, BuildOutput, BundlerGeneric, Loader, ModuleGraph,
};

use super::memory_fs::MemoryFS;

pub struct FakeParser {
    modules: FxHashMap<PathBuf, ParseOutput>,
}

impl FakeParser {
    pub fn new(modules: &[(&str, ParseOutput)]) -> Self {
        Self {
            modules: modules
                .iter()
                .map(|(path, output)| (PathBuf::from(path), output.clone()))
                .collect(),
        }
    }
}

impl Parser for FakeParser {
    fn parse(
        &self,
        path: &Path,
        _source: &str,
        _loader: Loader,
    ) -> Result<ParseOutput, ParseError> {
        Ok(self.modules.get(path).cloned().unwrap_or_default())
    }
}

/// Build from an in-memory tree. `files` seeds the filesystem (file
/// contents only matter for manifests and tsconfigs); `modules` maps
/// script paths to their parser output.
pub fn build_with(
    files: &[(&str, &str)],
    modules: &[(&str, ParseOutput)],
    options: BuildOptions,
) -> BuildOutput {
    let fs = MemoryFS::new(files);
    let bundler = BundlerGeneric::new_with_file_system(fs);
    let parser = FakeParser::new(modules);
    bundler.build(options, &parser)
}

pub fn entry_options(entries: &[&str]) -> BuildOptions {
    BuildOptions {
        entries: entries.iter().map(PathBuf::from).collect(),
        ..BuildOptions::default()
    }
}

/// A resolver over an in-memory tree, for exercising resolution on its
/// own.
pub fn resolver_with(
    files: &[(&str, &str)],
    options: BuildOptions,
) -> crate::ResolverGeneric<MemoryFS> {
    use std::sync::Arc;
    crate::ResolverGeneric::new(
        options,
        Arc::new(crate::cache::Cache::new(MemoryFS::new(files))),
        Arc::new(crate::DiagnosticSink::default()),
    )
}

pub fn module_id(graph: &ModuleGraph, path: &str) -> crate::ModuleId {
    graph
        .lookup(Path::new(path), crate::Namespace::File)
        .unwrap_or_else(|| panic!("module {path} not in graph"))
}

/// Statement indices that survived the shake for `path`.
pub fn kept_stmts(output: &BuildOutput, path: &str) -> Vec<usize> {
    let module = output.graph.get(module_id(&output.graph, path));
    module
        .stmt_kept
        .iter()
        .enumerate()
        .filter_map(|(index, &kept)| kept.then_some(index))
        .collect()
}

pub fn module_kept(output: &BuildOutput, path: &str) -> bool {
    output
        .graph
        .lookup(Path::new(path), crate::Namespace::File)
        .is_some_and(|id| output.graph.get(id).kept)
}

// ---------------------------------------------------------------------
// Expression builders.

pub fn num(value: f64) -> Expr {
    Expr::Value(ConstValue::Number(value))
}

pub fn string(value: &str) -> Expr {
    Expr::Value(ConstValue::String(value.to_string()))
}

pub fn boolean(value: bool) -> Expr {
    Expr::Value(ConstValue::Bool(value))
}

pub fn ident(name: &str) -> Expr {
    Expr::Ident(name.to_string())
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call { callee: Box::new(callee), args, pure: false, direct_eval: false }
}

pub fn pure_call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call { callee: Box::new(callee), args, pure: true, direct_eval: false }
}

pub fn assign(target: Expr, value: Expr) -> Expr {
    Expr::Assign { op: None, target: Box::new(target), value: Box::new(value) }
}

pub fn member(object: Expr, property: &str) -> Expr {
    Expr::Member {
        object: Box::new(object),
        property: Some(property.to_string()),
        computed: None,
    }
}

pub fn shape(params: &[&str], body: Vec<Stmt>) -> FunctionShape {
    FunctionShape {
        params: params.iter().map(|p| Some((*p).to_string())).collect(),
        has_defaults: false,
        is_async: false,
        is_generator: false,
        body,
        contains_direct_eval: false,
    }
}

// ---------------------------------------------------------------------
// Statement builders.

pub fn expr(e: Expr) -> Stmt {
    Stmt::Expr(e)
}

pub fn console_log(arg: Expr) -> Stmt {
    expr(call(member(ident("console"), "log"), vec![arg]))
}

fn var_decl(kind: DeclKind, name: &str, init: Option<Expr>, exported: bool) -> Stmt {
    Stmt::VarDecl {
        kind,
        decls: vec![VarDeclarator { name: name.to_string(), init }],
        exported,
        no_side_effects: false,
    }
}

pub fn const_(name: &str, init: Expr) -> Stmt {
    var_decl(DeclKind::Const, name, Some(init), false)
}

pub fn export_const(name: &str, init: Expr) -> Stmt {
    var_decl(DeclKind::Const, name, Some(init), true)
}

pub fn let_(name: &str, init: Expr) -> Stmt {
    var_decl(DeclKind::Let, name, Some(init), false)
}

pub fn var_(name: &str, init: Expr) -> Stmt {
    var_decl(DeclKind::Var, name, Some(init), false)
}

pub fn func_decl(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::FuncDecl {
        name: name.to_string(),
        shape: shape(params, body),
        exported: false,
        no_side_effects: false,
    }
}

pub fn export_func(name: &str, params: &[&str], body: Vec<Stmt>) -> Stmt {
    Stmt::FuncDecl {
        name: name.to_string(),
        shape: shape(params, body),
        exported: true,
        no_side_effects: false,
    }
}

pub fn ret(e: Expr) -> Stmt {
    Stmt::Return(Some(e))
}

pub fn import_named(record: u32, names: &[(&str, &str)]) -> Stmt {
    Stmt::Import {
        record,
        bindings: names
            .iter()
            .map(|(local, imported)| ImportBinding {
                local: (*local).to_string(),
                imported: ImportedName::Name((*imported).to_string()),
            })
            .collect(),
    }
}

pub fn import_bare(record: u32) -> Stmt {
    Stmt::Import { record, bindings: vec![] }
}

pub fn export_from(record: u32, names: &[(&str, &str)]) -> Stmt {
    Stmt::ExportFrom {
        record,
        names: names
            .iter()
            .map(|(imported, exported)| ((*imported).to_string(), (*exported).to_string()))
            .collect(),
        star: false,
    }
}

// ---------------------------------------------------------------------
// Module assembly.

/// Assemble a [`ParseOutput`] the way the parser contract specifies:
/// the statement list, import records in source order, and a symbol
/// table with reassignment flags derived from the statements.
pub fn module(stmts: Vec<Stmt>, imports: &[(&str, ImportKind)]) -> ParseOutput {
    let mut output = ParseOutput {
        import_records: imports
            .iter()
            .map(|(specifier, kind)| ImportRecord::new(*specifier, *kind))
            .collect(),
        ..ParseOutput::default()
    };
    for stmt in &stmts {
        declare_stmt(stmt, &mut output);
    }
    for stmt in &stmts {
        mark_reassignments_stmt(stmt, &mut output);
    }
    output.stmts = stmts;
    output
}

pub fn module_with_eval(stmts: Vec<Stmt>, imports: &[(&str, ImportKind)]) -> ParseOutput {
    let mut output = module(stmts, imports);
    output.has_direct_eval = true;
    output
}

fn declare_stmt(stmt: &Stmt, output: &mut ParseOutput) {
    match stmt {
        Stmt::VarDecl { kind, decls, .. } => {
            let symbol_kind = match kind {
                DeclKind::Var => SymbolKind::Var,
                DeclKind::Let => SymbolKind::Let,
                DeclKind::Const => SymbolKind::Const,
            };
            for decl in decls {
                output.symbols.declare(&decl.name, symbol_kind);
            }
        }
        Stmt::FuncDecl { name, .. } => output.symbols.declare(name, SymbolKind::Function),
        Stmt::ClassDecl { name, .. } => output.symbols.declare(name, SymbolKind::Class),
        Stmt::EnumDecl { name, .. } => output.symbols.declare(name, SymbolKind::Enum),
        Stmt::Import { bindings, .. } => {
            for binding in bindings {
                output.symbols.declare(&binding.local, SymbolKind::Import);
            }
        }
        _ => {}
    }
}

fn mark_reassignments_stmt(stmt: &Stmt, output: &mut ParseOutput) {
    match stmt {
        Stmt::VarDecl { decls, .. } => {
            for decl in decls {
                if let Some(init) = &decl.init {
                    mark_reassignments_expr(init, output);
                }
            }
        }
        Stmt::Expr(e) | Stmt::Throw(e) => mark_reassignments_expr(e, output),
        Stmt::FuncDecl { shape, .. } => {
            for s in &shape.body {
                mark_reassignments_stmt(s, output);
            }
        }
        Stmt::Block(stmts) => {
            for s in stmts {
                mark_reassignments_stmt(s, output);
            }
        }
        Stmt::If { test, consequent, alternate } => {
            mark_reassignments_expr(test, output);
            mark_reassignments_stmt(consequent, output);
            if let Some(alt) = alternate {
                mark_reassignments_stmt(alt, output);
            }
        }
        Stmt::Return(Some(e)) => mark_reassignments_expr(e, output),
        _ => {}
    }
}

fn mark_reassignments_expr(expr: &Expr, output: &mut ParseOutput) {
    match expr {
        Expr::Assign { target, value, .. } => {
            if let Expr::Ident(name) = target.as_ref() {
                output.symbols.mark_reassigned(name);
            } else {
                mark_reassignments_expr(target, output);
            }
            mark_reassignments_expr(value, output);
        }
        Expr::Unary {
            op:
                crate::ast::UnOp::PreIncrement
                | crate::ast::UnOp::PreDecrement
                | crate::ast::UnOp::PostIncrement
                | crate::ast::UnOp::PostDecrement,
            operand,
        } => {
            if let Expr::Ident(name) = operand.as_ref() {
                output.symbols.mark_reassigned(name);
            }
        }
        Expr::Unary { operand, .. } | Expr::Spread(operand) => {
            mark_reassignments_expr(operand, output);
        }
        Expr::Binary { left, right, .. } => {
            mark_reassignments_expr(left, output);
            mark_reassignments_expr(right, output);
        }
        Expr::Cond { test, consequent, alternate } => {
            mark_reassignments_expr(test, output);
            mark_reassignments_expr(consequent, output);
            mark_reassignments_expr(alternate, output);
        }
        Expr::Call { callee, args, .. } | Expr::New { callee, args, .. } => {
            mark_reassignments_expr(callee, output);
            for arg in args {
                mark_reassignments_expr(arg, output);
            }
        }
        Expr::Member { object, computed, .. } => {
            mark_reassignments_expr(object, output);
            if let Some(computed) = computed {
                mark_reassignments_expr(computed, output);
            }
        }
        Expr::Object(props) => {
            for prop in props {
                mark_reassignments_expr(&prop.value, output);
            }
        }
        Expr::Array(items) | Expr::Template { exprs: items } | Expr::Jsx { computed: items } => {
            for item in items {
                mark_reassignments_expr(item, output);
            }
        }
        Expr::Function(shape) => {
            for s in &shape.body {
                mark_reassignments_stmt(s, output);
            }
        }
        _ => {}
    }
}
