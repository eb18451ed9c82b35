//! Reachability from the entry roots (the DCE engine's second phase).
//!
//! Edges carry symbol demand. A demand lands on a module's export,
//! resolves through re-export chains and `export *`, and reaches the
//! declaring statement; reaching any local symbol of a module also runs
//! (keeps) its side-effectful statements. Pure re-export forwarders are
//! traversed without being retained.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast::{Expr, ImportedName, Stmt},
    diagnostics::{Diagnostic, DiagnosticSink, Note},
    graph::{EdgeTarget, ExportMember, ModuleGraph, ModuleId},
    side_effects::SideEffectClass,
};

use super::effects;

/// Where a module-scope name comes from.
#[derive(Debug, Clone)]
enum NameOrigin {
    /// Declared by these statement indices.
    Local(Vec<usize>),
    /// Bound by an import statement.
    Import { stmt: usize, record: u32, imported: ImportedName },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Work {
    Evaluate(ModuleId),
    DemandAllExports(ModuleId),
}

pub struct ReachabilityPass<'a> {
    graph: &'a mut ModuleGraph,
    sink: &'a DiagnosticSink,
    tree_shaking: bool,
    ignore_annotations: bool,

    name_origins: Vec<FxHashMap<String, NameOrigin>>,
    included: Vec<bool>,
    evaluated: Vec<bool>,
    stmt_keep: Vec<Vec<bool>>,
    reached: Vec<FxHashSet<String>>,
    demanded: FxHashSet<(ModuleId, String)>,
    all_exports_demanded: Vec<bool>,
    /// Bare-import warnings already emitted, shared across fixed-point
    /// reruns so they stay quiet.
    warned_bare: &'a mut FxHashSet<(ModuleId, usize)>,
    queue: Vec<QueueItem>,
}

#[derive(Debug, Clone)]
enum QueueItem {
    Work(Work),
    Demand(ModuleId, String),
}

impl<'a> ReachabilityPass<'a> {
    pub fn new(
        graph: &'a mut ModuleGraph,
        sink: &'a DiagnosticSink,
        tree_shaking: bool,
        ignore_annotations: bool,
        warned_bare: &'a mut FxHashSet<(ModuleId, usize)>,
    ) -> Self {
        let n = graph.modules.len();
        let name_origins = graph.modules.iter().map(|m| name_origins(&m.parse.stmts)).collect();
        let stmt_keep =
            graph.modules.iter().map(|m| vec![false; m.parse.stmts.len()]).collect();
        Self {
            graph,
            sink,
            tree_shaking,
            ignore_annotations,
            name_origins,
            included: vec![false; n],
            evaluated: vec![false; n],
            stmt_keep,
            reached: vec![FxHashSet::default(); n],
            demanded: FxHashSet::default(),
            all_exports_demanded: vec![false; n],
            warned_bare,
            queue: Vec::new(),
        }
    }

    /// Run to fixpoint and write the outcome back onto the graph.
    pub fn run(mut self) {
        if !self.tree_shaking {
            self.keep_everything();
            return;
        }

        for entry in self.graph.entries.clone() {
            self.queue.push(QueueItem::Work(Work::Evaluate(entry)));
            self.queue.push(QueueItem::Work(Work::DemandAllExports(entry)));
        }

        while let Some(item) = self.queue.pop() {
            match item {
                QueueItem::Work(Work::Evaluate(id)) => self.evaluate(id),
                QueueItem::Work(Work::DemandAllExports(id)) => self.demand_all_exports(id),
                QueueItem::Demand(id, name) => self.demand(id, name),
            }
        }

        self.root_css_edges();
        self.finish();
    }

    fn class_of(&self, id: ModuleId) -> SideEffectClass {
        if self.ignore_annotations {
            SideEffectClass::Unknown
        } else {
            self.graph.get(id).side_effects.class
        }
    }

    /// Keep a statement and demand everything it references.
    fn keep_stmt(&mut self, id: ModuleId, index: usize) {
        if std::mem::replace(&mut self.stmt_keep[id as usize][index], true) {
            return;
        }
        self.included[id as usize] = true;
        let stmt = self.graph.get(id).parse.stmts[index].clone();
        let mut refs = FxHashSet::default();
        effects::stmt_references(&stmt, &mut refs);
        for name in refs {
            self.demand_local(id, &name);
        }
        self.process_import_ops(id, &stmt);
    }

    /// A module-scope name used by a kept statement.
    fn demand_local(&mut self, id: ModuleId, name: &str) {
        let Some(origin) = self.name_origins[id as usize].get(name).cloned() else {
            return;
        };
        match origin {
            NameOrigin::Local(stmt_indices) => {
                if self.reached[id as usize].insert(name.to_string()) {
                    // Reaching a local symbol pins the module and runs
                    // its side-effectful statements.
                    self.push_evaluate(id);
                    for index in stmt_indices {
                        self.keep_stmt(id, index);
                    }
                }
            }
            NameOrigin::Import { stmt, record, imported } => {
                self.keep_stmt(id, stmt);
                let Some(edge) = self.graph.get(id).edge_for_record(record) else { return };
                let EdgeTarget::Module(target) = edge.target else { return };
                match imported {
                    ImportedName::Name(n) => {
                        self.queue.push(QueueItem::Demand(target, n));
                    }
                    ImportedName::Default => {
                        self.queue.push(QueueItem::Demand(target, "default".to_string()));
                    }
                    ImportedName::Namespace => {
                        self.graph.get_mut(target).wrap_cjs = true;
                        self.push_evaluate(target);
                        self.queue.push(QueueItem::Work(Work::DemandAllExports(target)));
                    }
                }
            }
        }
    }

    /// Demand an *exported* name of a module, resolving re-exports.
    fn demand(&mut self, id: ModuleId, name: String) {
        if !self.demanded.insert((id, name.clone())) {
            return;
        }
        // Importing from a module runs it, unless it declared itself
        // side-effect free; then only reached statements survive.
        if self.class_of(id) != SideEffectClass::NoSideEffects {
            self.push_evaluate(id);
        }
        match self.graph.get(id).exports.get(&name).cloned() {
            Some(ExportMember::Local { symbol }) => {
                self.demand_local(id, &symbol);
                // Keep the `export { x }` statement that creates the
                // binding, if any.
                self.keep_export_stmts_for(id, &name);
            }
            Some(ExportMember::ReExport { record, imported }) => {
                // Demand flows through without running this module's
                // side effects unless something else evaluates it.
                if let Some(edge) = self.graph.get(id).edge_for_record(record) {
                    if let EdgeTarget::Module(target) = edge.target {
                        self.queue.push(QueueItem::Demand(target, imported));
                    }
                }
            }
            None => {
                // `export * from` fan-out: demand from every star target
                // that can satisfy the name.
                for target in self.graph.get(id).star_exports.clone() {
                    let mut visited = FxHashSet::default();
                    if export_exists(self.graph, target, &name, &mut visited) {
                        self.queue.push(QueueItem::Demand(target, name.clone()));
                    }
                }
            }
        }
    }

    fn keep_export_stmts_for(&mut self, id: ModuleId, exported: &str) {
        let module = self.graph.get(id);
        let mut keep = Vec::new();
        for (index, stmt) in module.parse.stmts.iter().enumerate() {
            if let Stmt::ExportNamed { names } = stmt {
                if names.iter().any(|(_, e)| e == exported) {
                    keep.push(index);
                }
            }
        }
        for index in keep {
            self.keep_stmt(id, index);
        }
    }

    fn demand_all_exports(&mut self, id: ModuleId) {
        if std::mem::replace(&mut self.all_exports_demanded[id as usize], true) {
            return;
        }
        self.included[id as usize] = true;
        let names: Vec<String> = self.graph.get(id).exports.keys().cloned().collect();
        for name in names {
            self.queue.push(QueueItem::Demand(id, name));
        }
        for target in self.graph.get(id).star_exports.clone() {
            self.queue.push(QueueItem::Work(Work::DemandAllExports(target)));
        }
    }

    fn push_evaluate(&mut self, id: ModuleId) {
        if !self.evaluated[id as usize] {
            self.queue.push(QueueItem::Work(Work::Evaluate(id)));
        }
    }

    /// Run the module: keep every side-effectful top-level statement and
    /// follow its bare imports.
    fn evaluate(&mut self, id: ModuleId) {
        if std::mem::replace(&mut self.evaluated[id as usize], true) {
            return;
        }
        self.included[id as usize] = true;

        let effectful: Vec<usize> = self
            .graph
            .get(id)
            .stmt_effects
            .iter()
            .enumerate()
            .filter_map(|(index, &e)| e.then_some(index))
            .collect();
        for index in effectful {
            self.keep_stmt(id, index);
        }

        // Bare imports run their target, unless the target declared
        // itself free of side effects.
        let bare_imports: Vec<(usize, u32)> = self
            .graph
            .get(id)
            .parse
            .stmts
            .iter()
            .enumerate()
            .filter_map(|(index, stmt)| match stmt {
                Stmt::Import { record, bindings } if bindings.is_empty() => {
                    Some((index, *record))
                }
                _ => None,
            })
            .collect();
        for (index, record) in bare_imports {
            let Some(edge) = self.graph.get(id).edge_for_record(record) else { continue };
            let specifier = edge.specifier.clone();
            let EdgeTarget::Module(target) = edge.target else {
                // External targets stay in the output verbatim.
                self.keep_stmt(id, index);
                continue;
            };
            if self.class_of(target) == SideEffectClass::NoSideEffects {
                if self.warned_bare.insert((id, index)) {
                    let importer = self.graph.get(id);
                    let target_module = self.graph.get(target);
                    let mut diagnostic = Diagnostic::warning(format!(
                        "Ignoring this import of \"{specifier}\" because the module was marked as having no side effects"
                    ))
                    .with_path(importer.path.clone());
                    if let Some(declared_in) = &target_module.side_effects.declared_in {
                        diagnostic = diagnostic.with_note(Note::new(
                            "\"sideEffects\" is declared here",
                            declared_in.clone(),
                        ));
                    }
                    self.sink.push(
                        (importer.discovery_index, u32::try_from(index).unwrap_or(u32::MAX)),
                        diagnostic,
                    );
                }
                continue;
            }
            self.keep_stmt(id, index);
            self.push_evaluate(target);
        }
    }

    /// Dynamic imports and `require` calls inside a kept statement.
    fn process_import_ops(&mut self, id: ModuleId, stmt: &Stmt) {
        let mut ops = Vec::new();
        collect_import_ops_stmt(stmt, &mut ops);
        for op in ops {
            match op {
                ImportOp::Dynamic { record, referenced_exports } => {
                    let Some(edge) = self.graph.get(id).edge_for_record(record) else {
                        continue;
                    };
                    let EdgeTarget::Module(target) = edge.target else { continue };
                    match referenced_exports {
                        // Forked: only the referenced exports are kept
                        // when the target opted out of side effects.
                        Some(names)
                            if self.class_of(target) == SideEffectClass::NoSideEffects =>
                        {
                            for name in names {
                                self.queue.push(QueueItem::Demand(target, name));
                            }
                        }
                        _ => {
                            self.graph.get_mut(target).wrap_cjs = true;
                            self.push_evaluate(target);
                            self.queue.push(QueueItem::Work(Work::DemandAllExports(target)));
                        }
                    }
                }
                ImportOp::Require { record } => {
                    let Some(edge) = self.graph.get(id).edge_for_record(record) else {
                        continue;
                    };
                    let EdgeTarget::Module(target) = edge.target else { continue };
                    self.graph.get_mut(target).wrap_cjs = true;
                    self.push_evaluate(target);
                    self.queue.push(QueueItem::Work(Work::DemandAllExports(target)));
                }
            }
        }
    }

    /// CSS imported for side effect survives as long as any symbol of
    /// its owner is kept, even when the owner's import statement is not.
    fn root_css_edges(&mut self) {
        for id in 0..self.graph.modules.len() as ModuleId {
            if !self.included[id as usize] {
                continue;
            }
            for css in self.graph.get(id).css_edges.clone() {
                if self.class_of(css) != SideEffectClass::NoSideEffects {
                    self.evaluate(css);
                    // Drain follow-up work the evaluate may have queued.
                    while let Some(item) = self.queue.pop() {
                        match item {
                            QueueItem::Work(Work::Evaluate(m)) => self.evaluate(m),
                            QueueItem::Work(Work::DemandAllExports(m)) => {
                                self.demand_all_exports(m);
                            }
                            QueueItem::Demand(m, name) => self.demand(m, name),
                        }
                    }
                }
            }
        }
    }

    fn keep_everything(mut self) {
        for id in 0..self.graph.modules.len() {
            self.included[id] = true;
            self.evaluated[id] = true;
            for flag in &mut self.stmt_keep[id] {
                *flag = true;
            }
        }
        self.finish();
    }

    fn finish(self) {
        let Self { graph, included, stmt_keep, reached, .. } = self;
        for (index, module) in graph.modules.iter_mut().enumerate() {
            module.kept = included[index];
            module.reached_symbols = reached[index].clone();
            module.stmt_kept = stmt_keep[index].clone();
            if module.kept {
                let keep_all_imports = module.parse.has_direct_eval
                    && module.loader.is_script()
                    && !module.loader.is_typescript();
                for (stmt_index, stmt) in module.parse.stmts.iter().enumerate() {
                    match stmt {
                        // Directives survive with their module; the
                        // linker decides how formats combine them.
                        Stmt::Directive(_) => module.stmt_kept[stmt_index] = true,
                        // A direct eval can observe any import binding,
                        // so JS modules keep them all. TypeScript
                        // sources still drop unused imports: keeping
                        // them risks module instantiation failure.
                        Stmt::Import { .. } if keep_all_imports => {
                            module.stmt_kept[stmt_index] = true;
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}

/// `import { X } from "m"` where `m` has no such export. Checked once
/// per build, before the reachability fixpoint starts.
pub fn check_missing_exports(graph: &ModuleGraph, sink: &DiagnosticSink) {
    for module in &graph.modules {
        for (stmt_index, stmt) in module.parse.stmts.iter().enumerate() {
            let Stmt::Import { record, bindings } = stmt else { continue };
            let Some(edge) = module.edge_for_record(*record) else { continue };
            let EdgeTarget::Module(target) = edge.target else { continue };
            if !graph.get(target).loader.is_script() {
                continue;
            }
            for binding in bindings {
                let name = match &binding.imported {
                    ImportedName::Name(n) => n.clone(),
                    ImportedName::Default => "default".to_string(),
                    ImportedName::Namespace => continue,
                };
                let mut visited = FxHashSet::default();
                if !export_exists(graph, target, &name, &mut visited) {
                    sink.push(
                        (
                            module.discovery_index,
                            u32::try_from(stmt_index).unwrap_or(u32::MAX),
                        ),
                        Diagnostic::error(format!(
                            "No matching export in \"{}\" for import \"{name}\"",
                            graph.get(target).path.display()
                        ))
                        .with_path(module.path.clone()),
                    );
                }
            }
        }
    }
}

/// Whether `name` is exported by `id`, following re-exports and stars.
fn export_exists(
    graph: &ModuleGraph,
    id: ModuleId,
    name: &str,
    visited: &mut FxHashSet<ModuleId>,
) -> bool {
    if !visited.insert(id) {
        return false;
    }
    let module = graph.get(id);
    match module.exports.get(name) {
        Some(ExportMember::Local { .. }) => true,
        Some(ExportMember::ReExport { record, imported }) => {
            match module.edge_for_record(*record).map(|e| &e.target) {
                Some(EdgeTarget::Module(target)) => {
                    export_exists(graph, *target, imported, visited)
                }
                // Unresolved or external: assume it exists; the
                // unresolved import already has its own error.
                _ => true,
            }
        }
        None => module
            .star_exports
            .iter()
            .any(|&target| export_exists(graph, target, name, visited)),
    }
}

enum ImportOp {
    Dynamic { record: u32, referenced_exports: Option<Vec<String>> },
    Require { record: u32 },
}

fn collect_import_ops_stmt(stmt: &Stmt, out: &mut Vec<ImportOp>) {
    match stmt {
        Stmt::VarDecl { decls, .. } => {
            for decl in decls {
                if let Some(init) = &decl.init {
                    collect_import_ops_expr(init, out);
                }
            }
        }
        Stmt::Expr(expr) | Stmt::Throw(expr) => collect_import_ops_expr(expr, out),
        Stmt::FuncDecl { shape, .. } => {
            for s in &shape.body {
                collect_import_ops_stmt(s, out);
            }
        }
        Stmt::Block(stmts) => {
            for s in stmts {
                collect_import_ops_stmt(s, out);
            }
        }
        Stmt::If { test, consequent, alternate } => {
            collect_import_ops_expr(test, out);
            collect_import_ops_stmt(consequent, out);
            if let Some(alt) = alternate {
                collect_import_ops_stmt(alt, out);
            }
        }
        Stmt::For { init, test, update, body } => {
            for e in [init, test, update].into_iter().flatten() {
                collect_import_ops_expr(e, out);
            }
            collect_import_ops_stmt(body, out);
        }
        Stmt::While { test, body } | Stmt::With { object: test, body } => {
            collect_import_ops_expr(test, out);
            collect_import_ops_stmt(body, out);
        }
        Stmt::Labeled { body, .. } => collect_import_ops_stmt(body, out),
        Stmt::Return(Some(expr)) => collect_import_ops_expr(expr, out),
        _ => {}
    }
}

fn collect_import_ops_expr(expr: &Expr, out: &mut Vec<ImportOp>) {
    match expr {
        Expr::DynamicImport { record, referenced_exports } => out.push(ImportOp::Dynamic {
            record: *record,
            referenced_exports: referenced_exports.clone(),
        }),
        Expr::Require { record } => out.push(ImportOp::Require { record: *record }),
        Expr::Unary { operand, .. } | Expr::Spread(operand) => {
            collect_import_ops_expr(operand, out);
        }
        Expr::Binary { left, right, .. } => {
            collect_import_ops_expr(left, out);
            collect_import_ops_expr(right, out);
        }
        Expr::Cond { test, consequent, alternate } => {
            collect_import_ops_expr(test, out);
            collect_import_ops_expr(consequent, out);
            collect_import_ops_expr(alternate, out);
        }
        Expr::Assign { target, value, .. } => {
            collect_import_ops_expr(target, out);
            collect_import_ops_expr(value, out);
        }
        Expr::Call { callee, args, .. } | Expr::New { callee, args, .. } => {
            collect_import_ops_expr(callee, out);
            for arg in args {
                collect_import_ops_expr(arg, out);
            }
        }
        Expr::Member { object, computed, .. } => {
            collect_import_ops_expr(object, out);
            if let Some(computed) = computed {
                collect_import_ops_expr(computed, out);
            }
        }
        Expr::Object(props) => {
            for prop in props {
                collect_import_ops_expr(&prop.value, out);
            }
        }
        Expr::Array(items) | Expr::Template { exprs: items } | Expr::Jsx { computed: items } => {
            for item in items {
                collect_import_ops_expr(item, out);
            }
        }
        Expr::TaggedTemplate { tag, exprs } => {
            collect_import_ops_expr(tag, out);
            for e in exprs {
                collect_import_ops_expr(e, out);
            }
        }
        Expr::Function(shape) => {
            for s in &shape.body {
                collect_import_ops_stmt(s, out);
            }
        }
        Expr::Value(_) | Expr::Ident(_) => {}
    }
}

fn name_origins(stmts: &[Stmt]) -> FxHashMap<String, NameOrigin> {
    let mut origins: FxHashMap<String, NameOrigin> = FxHashMap::default();
    for (index, stmt) in stmts.iter().enumerate() {
        match stmt {
            Stmt::Import { record, bindings } => {
                for binding in bindings {
                    origins.insert(
                        binding.local.clone(),
                        NameOrigin::Import {
                            stmt: index,
                            record: *record,
                            imported: binding.imported.clone(),
                        },
                    );
                }
            }
            _ => {
                for name in effects::stmt_declared_names(stmt) {
                    match origins.get_mut(name) {
                        Some(NameOrigin::Local(indices)) => indices.push(index),
                        _ => {
                            origins.insert(name.to_string(), NameOrigin::Local(vec![index]));
                        }
                    }
                }
            }
        }
    }
    origins
}
