//! Inlining and folding rewrites (the DCE engine's third phase).
//!
//! Each rewrite can delete references and thereby unlock further drops,
//! so the tree shaker alternates this phase with reachability until
//! nothing changes.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast::{BinOp, ConstValue, DeclKind, Expr, FunctionShape, Stmt, SymbolKind, UnOp},
    diagnostics::{Diagnostic, DiagnosticSink, Note},
    graph::{EdgeTarget, ExportMember, ModuleGraph, ModuleId},
};

use super::effects::{self, EffectCx};

/// What one module offers to inlining, gathered before any mutation.
#[derive(Default, Clone)]
struct ModuleEnv {
    /// Eligible `const NAME = literal` bindings by local name.
    consts: FxHashMap<String, ConstValue>,
    /// Numeric enum members by enum name.
    enums: FxHashMap<String, FxHashMap<String, f64>>,
    /// Same, keyed by exported name for cross-module lookup.
    exported_consts: FxHashMap<String, ConstValue>,
    exported_enums: FxHashMap<String, FxHashMap<String, f64>>,
    /// Identity functions `function f(x) { return x }` by name.
    identity_fns: FxHashSet<String>,
    /// Empty functions `function f() {}` by name.
    empty_fns: FxHashSet<String>,
}

pub struct InlinePass<'a> {
    graph: &'a mut ModuleGraph,
    sink: &'a DiagnosticSink,
    /// Const-reassignment errors already reported, so fixed-point
    /// iterations stay quiet.
    reported_const_assigns: &'a mut FxHashSet<(ModuleId, String)>,
    changed: bool,
}

impl<'a> InlinePass<'a> {
    pub fn new(
        graph: &'a mut ModuleGraph,
        sink: &'a DiagnosticSink,
        reported_const_assigns: &'a mut FxHashSet<(ModuleId, String)>,
    ) -> Self {
        Self { graph, sink, reported_const_assigns, changed: false }
    }

    /// Returns whether anything was rewritten.
    pub fn run(mut self) -> bool {
        self.report_const_reassignments();

        let scc_sizes = self.scc_sizes();
        let envs: Vec<ModuleEnv> = (0..self.graph.modules.len() as ModuleId)
            .map(|id| {
                if self.graph.get(id).kept {
                    scan_module(self.graph, id, &scc_sizes)
                } else {
                    ModuleEnv::default()
                }
            })
            .collect();

        for id in 0..self.graph.modules.len() as ModuleId {
            if !self.graph.get(id).kept {
                continue;
            }
            let env = self.combined_env(id, &envs);
            let mut stmts = std::mem::take(&mut self.graph.get_mut(id).parse.stmts);
            let mut rewriter = Rewriter { env: &env, changed: false };
            for stmt in &mut stmts {
                rewriter.rewrite_stmt(stmt);
            }
            self.changed |= rewriter.changed;
            self.graph.get_mut(id).parse.stmts = stmts;
        }

        self.changed
    }

    fn scc_sizes(&self) -> FxHashMap<u32, u32> {
        let mut sizes: FxHashMap<u32, u32> = FxHashMap::default();
        for module in &self.graph.modules {
            *sizes.entry(module.scc).or_insert(0) += 1;
        }
        sizes
    }

    /// The module's own environment plus constants imported from
    /// non-cyclic dependencies.
    fn combined_env(&self, id: ModuleId, envs: &[ModuleEnv]) -> ModuleEnv {
        let module = self.graph.get(id);
        let mut env = envs[id as usize].clone();
        if module.parse.has_direct_eval {
            // A direct eval can observe every binding; nothing inlines.
            return ModuleEnv {
                identity_fns: env.identity_fns,
                empty_fns: env.empty_fns,
                ..ModuleEnv::default()
            };
        }
        for stmt in &module.parse.stmts {
            let Stmt::Import { record, bindings } = stmt else { continue };
            let Some(edge) = module.edge_for_record(*record) else { continue };
            let EdgeTarget::Module(target) = edge.target else { continue };
            // Never inline across a module cycle that transits the
            // declaring module.
            if self.graph.in_same_cycle(id, target) {
                continue;
            }
            let target_env = &envs[target as usize];
            for binding in bindings {
                let crate::ast::ImportedName::Name(imported) = &binding.imported else {
                    continue;
                };
                if let Some(value) = target_env.exported_consts.get(imported) {
                    env.consts.insert(binding.local.clone(), value.clone());
                }
                if let Some(members) = target_env.exported_enums.get(imported) {
                    env.enums.insert(binding.local.clone(), members.clone());
                }
            }
        }
        env
    }

    /// `const x = 1; x = 2;` is an error raised by the DCE engine itself,
    /// even when the declaration has already been inlined away.
    fn report_const_reassignments(&mut self) {
        for module in &self.graph.modules {
            if !module.kept {
                continue;
            }
            for symbol in module.parse.symbols.iter() {
                if symbol.kind == SymbolKind::Const && !symbol.single_assignment {
                    if self
                        .reported_const_assigns
                        .insert((module.id, symbol.name.clone()))
                    {
                        self.sink.push(
                            (module.discovery_index, 0),
                            Diagnostic::error(format!(
                                "Cannot assign to \"{}\" because it is a constant",
                                symbol.name
                            ))
                            .with_path(module.path.clone())
                            .with_note(Note::new(
                                format!(
                                    "The symbol \"{}\" was declared a constant here",
                                    symbol.name
                                ),
                                module.path.clone(),
                            )),
                        );
                    }
                }
            }
        }
    }
}

/// Gather inlining opportunities from a module without mutating it.
fn scan_module(
    graph: &ModuleGraph,
    id: ModuleId,
    scc_sizes: &FxHashMap<u32, u32>,
) -> ModuleEnv {
    let module = graph.get(id);
    let mut env = ModuleEnv::default();
    if module.parse.has_direct_eval {
        return env;
    }
    let in_cycle = scc_sizes.get(&module.scc).copied().unwrap_or(0) > 1;

    // Duplicate function declarations: only the last textual one counts.
    let mut last_fn: FxHashMap<&str, &FunctionShape> = FxHashMap::default();
    for stmt in &module.parse.stmts {
        if let Stmt::FuncDecl { name, shape, .. } = stmt {
            last_fn.insert(name.as_str(), shape);
        }
    }

    for stmt in &module.parse.stmts {
        match stmt {
            Stmt::VarDecl { kind: DeclKind::Const, decls, exported, .. } => {
                for decl in decls {
                    let Some(Expr::Value(value)) = &decl.init else { continue };
                    if !value.is_inlineable() {
                        continue;
                    }
                    let Some(symbol) = module.parse.symbols.get(&decl.name) else { continue };
                    if !symbol.single_assignment {
                        continue;
                    }
                    // An exported constant on an import cycle must keep
                    // its binding.
                    if *exported && in_cycle {
                        continue;
                    }
                    env.consts.insert(decl.name.clone(), value.clone());
                    if *exported {
                        env.exported_consts.insert(decl.name.clone(), value.clone());
                    }
                }
            }
            Stmt::EnumDecl { name, members, exported } => {
                let constant_members: FxHashMap<String, f64> = members
                    .iter()
                    .filter_map(|(member, value)| value.map(|v| (member.clone(), v)))
                    .collect();
                if constant_members.is_empty() {
                    continue;
                }
                env.enums.insert(name.clone(), constant_members.clone());
                if *exported && !in_cycle {
                    env.exported_enums.insert(name.clone(), constant_members);
                }
            }
            _ => {}
        }
    }

    for (name, shape) in last_fn {
        let Some(symbol) = module.parse.symbols.get(name) else { continue };
        if !symbol.single_assignment {
            continue;
        }
        if shape.is_async || shape.is_generator || shape.has_defaults {
            continue;
        }
        if shape.body.is_empty() && shape.params.is_empty() {
            env.empty_fns.insert(name.to_string());
            continue;
        }
        if let [Some(param)] = shape.params.as_slice() {
            if let [Stmt::Return(Some(Expr::Ident(returned)))] = shape.body.as_slice() {
                if returned == param {
                    env.identity_fns.insert(name.to_string());
                }
            }
        }
    }

    // Exported names may differ from local ones.
    let exported_alias: Vec<(String, String)> = module
        .exports
        .iter()
        .filter_map(|(exported, member)| match member {
            ExportMember::Local { symbol } if exported != symbol => {
                Some((exported.clone(), symbol.clone()))
            }
            _ => None,
        })
        .collect();
    for (exported, local) in exported_alias {
        if let Some(value) = env.consts.get(&local) {
            env.exported_consts.insert(exported.clone(), value.clone());
        }
        if let Some(members) = env.enums.get(&local) {
            env.exported_enums.insert(exported, members.clone());
        }
    }

    env
}

struct Rewriter<'e> {
    env: &'e ModuleEnv,
    changed: bool,
}

impl Rewriter<'_> {
    fn rewrite_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::VarDecl { decls, .. } => {
                for decl in decls {
                    if let Some(init) = &mut decl.init {
                        self.rewrite_expr(init, Position::Value);
                    }
                }
            }
            Stmt::Expr(expr) | Stmt::Throw(expr) => self.rewrite_expr(expr, Position::Value),
            Stmt::FuncDecl { shape, .. } => self.rewrite_function(shape),
            Stmt::ClassDecl { body, .. } => {
                if let Some(extends) = &mut body.extends {
                    self.rewrite_expr(extends, Position::Value);
                }
                for member in &mut body.members {
                    match member {
                        crate::ast::ClassMember::Method { key } => self.rewrite_key(key),
                        crate::ast::ClassMember::Field { key, value, .. } => {
                            self.rewrite_key(key);
                            if let Some(value) = value {
                                self.rewrite_expr(value, Position::Value);
                            }
                        }
                        crate::ast::ClassMember::StaticBlock(stmts) => {
                            for s in stmts.iter_mut() {
                                self.rewrite_stmt(s);
                            }
                        }
                    }
                }
            }
            Stmt::Block(stmts) => {
                for s in stmts.iter_mut() {
                    self.rewrite_stmt(s);
                }
            }
            Stmt::If { test, consequent, alternate } => {
                self.rewrite_expr(test, Position::Value);
                self.rewrite_stmt(consequent);
                if let Some(alt) = alternate {
                    self.rewrite_stmt(alt);
                }
            }
            Stmt::For { init, test, update, body } => {
                if let Some(init_expr) = init {
                    self.rewrite_expr(init_expr, Position::Value);
                    // An inlined empty call in the header collapses to
                    // an empty slot.
                    if matches!(init_expr, Expr::Value(_)) {
                        *init = None;
                        self.changed = true;
                    }
                }
                for e in [test, update].into_iter().flatten() {
                    self.rewrite_expr(e, Position::Value);
                }
                self.rewrite_stmt(body);
            }
            Stmt::While { test, body } => {
                self.rewrite_expr(test, Position::Value);
                self.rewrite_stmt(body);
            }
            Stmt::With { object, body } => {
                self.rewrite_expr(object, Position::Value);
                self.rewrite_stmt(body);
            }
            Stmt::Labeled { body, .. } => self.rewrite_stmt(body),
            Stmt::Return(Some(expr)) => self.rewrite_expr(expr, Position::Value),
            _ => {}
        }
    }

    fn rewrite_key(&mut self, key: &mut crate::ast::PropKey) {
        if let crate::ast::PropKey::Computed(expr) = key {
            self.rewrite_expr(expr, Position::Value);
        }
    }

    fn rewrite_function(&mut self, shape: &mut FunctionShape) {
        for stmt in &mut shape.body {
            self.rewrite_stmt(stmt);
        }
        let mut hoisted = Vec::new();
        self.drop_dead_code_in_list(&mut shape.body, &mut hoisted);
        if !hoisted.is_empty() {
            // Hoisted declarations surface at the top of the enclosing
            // function.
            for (i, stmt) in hoisted.into_iter().enumerate() {
                shape.body.insert(i, stmt);
            }
            self.changed = true;
        }
        // `return;` at the tail carries no information.
        if matches!(shape.body.last(), Some(Stmt::Return(None))) {
            shape.body.pop();
            self.changed = true;
        }
    }

    /// Dead-code removal for one function's whole body tree. `hoist`
    /// belongs to the enclosing function; nested functions start their
    /// own via [`Self::rewrite_function`].
    fn drop_dead_code_in_list(&mut self, stmts: &mut Vec<Stmt>, hoist: &mut Vec<Stmt>) {
        self.drop_after_jump(stmts, hoist);
        for stmt in stmts {
            match stmt {
                Stmt::Block(inner) => self.drop_dead_code_in_list(inner, hoist),
                Stmt::If { consequent, alternate, .. } => {
                    self.drop_dead_code_in_stmt(consequent, hoist);
                    if let Some(alt) = alternate {
                        self.drop_dead_code_in_stmt(alt, hoist);
                    }
                }
                Stmt::For { body, .. }
                | Stmt::While { body, .. }
                | Stmt::With { body, .. }
                | Stmt::Labeled { body, .. } => self.drop_dead_code_in_stmt(body, hoist),
                _ => {}
            }
        }
    }

    fn drop_dead_code_in_stmt(&mut self, stmt: &mut Stmt, hoist: &mut Vec<Stmt>) {
        if let Stmt::Block(inner) = stmt {
            self.drop_dead_code_in_list(inner, hoist);
        }
    }

    /// Statements after an unconditional jump are dead until the next
    /// label or the end of the block. `var` and function declarations
    /// hoist to the enclosing function first; everything else drops.
    fn drop_after_jump(&mut self, stmts: &mut Vec<Stmt>, hoist: &mut Vec<Stmt>) {
        let Some(jump) = stmts.iter().position(|s| {
            matches!(s, Stmt::Return(_) | Stmt::Throw(_) | Stmt::Break(_) | Stmt::Continue(_))
        }) else {
            return;
        };
        let dead_end = stmts[jump + 1..]
            .iter()
            .position(|s| matches!(s, Stmt::Labeled { .. }))
            .map_or(stmts.len(), |offset| jump + 1 + offset);
        if jump + 1 == dead_end {
            return;
        }
        for dead in stmts.drain(jump + 1..dead_end) {
            match dead {
                Stmt::VarDecl { kind: DeclKind::Var, decls, exported, no_side_effects } => {
                    // Initializers never ran; only the bindings survive.
                    let decls = decls
                        .into_iter()
                        .map(|mut d| {
                            d.init = None;
                            d
                        })
                        .collect();
                    hoist.push(Stmt::VarDecl {
                        kind: DeclKind::Var,
                        decls,
                        exported,
                        no_side_effects,
                    });
                }
                func @ Stmt::FuncDecl { .. } => {
                    hoist.push(func);
                }
                // Dead compound statements can still contain `var`
                // bindings that belong to the function scope.
                other => collect_hoisted_vars(&other, hoist),
            }
        }
        self.changed = true;
    }

    fn rewrite_expr(&mut self, expr: &mut Expr, position: Position) {
        // Children first, then this node folds over literal children.
        match expr {
            Expr::Value(_)
            | Expr::DynamicImport { .. }
            | Expr::Require { .. } => {}
            Expr::Ident(name) => {
                if position == Position::Value {
                    if let Some(value) = self.env.consts.get(name) {
                        *expr = Expr::Value(value.clone());
                        self.changed = true;
                        return;
                    }
                }
            }
            Expr::Unary { operand, .. } => self.rewrite_expr(operand, Position::Value),
            Expr::Binary { left, right, .. } => {
                self.rewrite_expr(left, Position::Value);
                self.rewrite_expr(right, Position::Value);
            }
            Expr::Cond { test, consequent, alternate } => {
                self.rewrite_expr(test, Position::Value);
                self.rewrite_expr(consequent, Position::Value);
                self.rewrite_expr(alternate, Position::Value);
            }
            Expr::Assign { target, value, .. } => {
                // The target's object/key expressions rewrite; a bare
                // target identifier does not.
                if !matches!(target.as_ref(), Expr::Ident(_)) {
                    self.rewrite_expr(target, Position::AssignTarget);
                }
                self.rewrite_expr(value, Position::Value);
            }
            Expr::Call { callee, args, .. } => {
                self.rewrite_expr(callee, Position::Callee);
                for arg in args.iter_mut() {
                    self.rewrite_expr(arg, Position::Value);
                }
                if let Some(rewritten) = self.try_inline_call(callee, args, position) {
                    *expr = rewritten;
                    self.changed = true;
                    return;
                }
            }
            Expr::New { callee, args, .. } => {
                self.rewrite_expr(callee, Position::Callee);
                for arg in args.iter_mut() {
                    self.rewrite_expr(arg, Position::Value);
                }
            }
            Expr::Member { object, property, computed } => {
                // Enum member access folds to its constant before the
                // object identifier could be considered on its own.
                if let (Expr::Ident(enum_name), Some(member)) = (&**object, property.as_deref()) {
                    if let Some(members) = self.env.enums.get(enum_name) {
                        if let Some(value) = members.get(member) {
                            *expr = Expr::Value(ConstValue::Number(*value));
                            self.changed = true;
                            return;
                        }
                    }
                }
                self.rewrite_expr(object, Position::Value);
                if let Some(computed) = computed {
                    self.rewrite_expr(computed, Position::Value);
                }
            }
            Expr::Object(props) => {
                for prop in props.iter_mut() {
                    self.rewrite_key(&mut prop.key);
                    self.rewrite_expr(&mut prop.value, Position::Value);
                }
            }
            Expr::Array(items) | Expr::Template { exprs: items } | Expr::Jsx { computed: items } => {
                for item in items.iter_mut() {
                    self.rewrite_expr(item, Position::Value);
                }
            }
            Expr::Spread(inner) => self.rewrite_expr(inner, Position::Value),
            Expr::TaggedTemplate { tag, exprs } => {
                self.rewrite_expr(tag, Position::Callee);
                for e in exprs.iter_mut() {
                    self.rewrite_expr(e, Position::Value);
                }
            }
            Expr::Function(shape) => self.rewrite_function(shape),
        }

        if let Some(folded) = fold(expr, position) {
            *expr = folded;
            self.changed = true;
        }
    }

    /// Identity- and empty-function call inlining.
    fn try_inline_call(
        &mut self,
        callee: &Expr,
        args: &mut Vec<Expr>,
        position: Position,
    ) -> Option<Expr> {
        let Expr::Ident(name) = callee else { return None };

        if self.env.identity_fns.contains(name) {
            // Only a single-argument, non-spread call inlines.
            if args.len() != 1 || matches!(args[0], Expr::Spread(_)) {
                return None;
            }
            let arg = args.remove(0);
            return Some(self.preserve_call_shape(arg, position));
        }

        if self.env.empty_fns.contains(name) {
            // The call evaluates its arguments and yields undefined; a
            // spread argument still iterates.
            let mut result = Expr::Value(ConstValue::Undefined);
            for arg in args.drain(..).rev() {
                let arg = match arg {
                    spread @ Expr::Spread(_) => Expr::Array(vec![spread]),
                    other => other,
                };
                result = Expr::Binary {
                    op: BinOp::Comma,
                    left: Box::new(arg),
                    right: Box::new(result),
                };
            }
            return Some(result);
        }

        None
    }

    /// `id(foo.bar)()` must not become `foo.bar()`: receiver identity is
    /// severed with a comma expression. An inlined `eval` in callee
    /// position likewise must stay indirect.
    fn preserve_call_shape(&self, arg: Expr, position: Position) -> Expr {
        if position != Position::Callee {
            return arg;
        }
        let needs_severing = matches!(arg, Expr::Member { .. })
            || matches!(&arg, Expr::Ident(name) if name == "eval");
        if needs_severing {
            Expr::Binary {
                op: BinOp::Comma,
                left: Box::new(Expr::Value(ConstValue::Number(0.0))),
                right: Box::new(arg),
            }
        } else {
            arg
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Value,
    Callee,
    AssignTarget,
}

/// `var` bindings anywhere under a dead statement (but not inside
/// nested functions, which have their own scope).
fn collect_hoisted_vars(stmt: &Stmt, hoist: &mut Vec<Stmt>) {
    match stmt {
        Stmt::VarDecl { kind: DeclKind::Var, decls, exported, no_side_effects } => {
            hoist.push(Stmt::VarDecl {
                kind: DeclKind::Var,
                decls: decls
                    .iter()
                    .map(|d| crate::ast::VarDeclarator { name: d.name.clone(), init: None })
                    .collect(),
                exported: *exported,
                no_side_effects: *no_side_effects,
            });
        }
        Stmt::Block(stmts) => {
            for s in stmts {
                collect_hoisted_vars(s, hoist);
            }
        }
        Stmt::If { consequent, alternate, .. } => {
            collect_hoisted_vars(consequent, hoist);
            if let Some(alt) = alternate {
                collect_hoisted_vars(alt, hoist);
            }
        }
        Stmt::For { body, .. }
        | Stmt::While { body, .. }
        | Stmt::With { body, .. }
        | Stmt::Labeled { body, .. } => collect_hoisted_vars(body, hoist),
        _ => {}
    }
}

fn truthiness(value: &ConstValue) -> bool {
    match value {
        ConstValue::Null | ConstValue::Undefined => false,
        ConstValue::Bool(b) => *b,
        ConstValue::Number(n) => *n != 0.0 && !n.is_nan(),
        ConstValue::String(s) => !s.is_empty(),
    }
}

fn is_nullish(value: &ConstValue) -> bool {
    matches!(value, ConstValue::Null | ConstValue::Undefined)
}

/// JS ToInt32.
fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    let n = n.trunc();
    (n as i64 as u64 as u32) as i32
}

fn strict_eq(a: &ConstValue, b: &ConstValue) -> Option<bool> {
    match (a, b) {
        (ConstValue::Number(x), ConstValue::Number(y)) => Some(x == y),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(x == y),
        (ConstValue::String(x), ConstValue::String(y)) => Some(x == y),
        (ConstValue::Null, ConstValue::Null) => Some(true),
        (ConstValue::Undefined, ConstValue::Undefined) => Some(true),
        _ => Some(false),
    }
}

/// Fold an operator whose operands are now literals. Returns `None`
/// when nothing folds. Comma expressions in callee position never
/// collapse: `(0, foo.bar)()` is how receiver identity stays severed.
fn fold(expr: &Expr, position: Position) -> Option<Expr> {
    match expr {
        Expr::Unary { op, operand } => {
            let Expr::Value(value) = operand.as_ref() else { return None };
            let folded = match op {
                UnOp::Not => ConstValue::Bool(!truthiness(value)),
                UnOp::Void => ConstValue::Undefined,
                UnOp::TypeOf => ConstValue::String(
                    match value {
                        ConstValue::Null => "object",
                        ConstValue::Undefined => "undefined",
                        ConstValue::Number(_) => "number",
                        ConstValue::Bool(_) => "boolean",
                        ConstValue::String(_) => "string",
                    }
                    .to_string(),
                ),
                UnOp::Pos => match value {
                    ConstValue::Number(n) => ConstValue::Number(*n),
                    _ => return None,
                },
                UnOp::Neg => match value {
                    ConstValue::Number(n) => ConstValue::Number(-n),
                    _ => return None,
                },
                UnOp::BitNot => match value {
                    ConstValue::Number(n) => ConstValue::Number(f64::from(!to_int32(*n))),
                    _ => return None,
                },
                _ => return None,
            };
            Some(Expr::Value(folded))
        }
        Expr::Binary { op, left, right } => {
            // Short-circuit forms only need the left side.
            if let Expr::Value(l) = left.as_ref() {
                match op {
                    BinOp::And => {
                        return Some(if truthiness(l) {
                            right.as_ref().clone()
                        } else {
                            Expr::Value(l.clone())
                        });
                    }
                    BinOp::Or => {
                        return Some(if truthiness(l) {
                            Expr::Value(l.clone())
                        } else {
                            right.as_ref().clone()
                        });
                    }
                    BinOp::NullishCoalesce => {
                        return Some(if is_nullish(l) {
                            right.as_ref().clone()
                        } else {
                            Expr::Value(l.clone())
                        });
                    }
                    BinOp::Comma => {
                        if position == Position::Callee {
                            return None;
                        }
                        return Some(right.as_ref().clone());
                    }
                    _ => {}
                }
            }
            let (Expr::Value(l), Expr::Value(r)) = (left.as_ref(), right.as_ref()) else {
                return None;
            };
            let folded = match op {
                BinOp::StrictEq => ConstValue::Bool(strict_eq(l, r)?),
                BinOp::StrictNe => ConstValue::Bool(!strict_eq(l, r)?),
                BinOp::Add => match (l, r) {
                    (ConstValue::Number(x), ConstValue::Number(y)) => ConstValue::Number(x + y),
                    (ConstValue::String(x), ConstValue::String(y)) => {
                        ConstValue::String(format!("{x}{y}"))
                    }
                    _ => return None,
                },
                BinOp::Sub
                | BinOp::Mul
                | BinOp::Div
                | BinOp::Rem
                | BinOp::Pow => {
                    let (ConstValue::Number(x), ConstValue::Number(y)) = (l, r) else {
                        return None;
                    };
                    ConstValue::Number(match op {
                        BinOp::Sub => x - y,
                        BinOp::Mul => x * y,
                        BinOp::Div => x / y,
                        BinOp::Rem => x % y,
                        BinOp::Pow => x.powf(*y),
                        _ => unreachable!(),
                    })
                }
                BinOp::ShiftLeft
                | BinOp::ShiftRight
                | BinOp::ShiftRightUnsigned
                | BinOp::BitAnd
                | BinOp::BitOr
                | BinOp::BitXor => {
                    let (ConstValue::Number(x), ConstValue::Number(y)) = (l, r) else {
                        return None;
                    };
                    let a = to_int32(*x);
                    let shift = (to_int32(*y) as u32) & 31;
                    ConstValue::Number(match op {
                        BinOp::ShiftLeft => f64::from(a.wrapping_shl(shift)),
                        BinOp::ShiftRight => f64::from(a.wrapping_shr(shift)),
                        BinOp::ShiftRightUnsigned => {
                            f64::from((a as u32).wrapping_shr(shift))
                        }
                        BinOp::BitAnd => f64::from(a & to_int32(*y)),
                        BinOp::BitOr => f64::from(a | to_int32(*y)),
                        BinOp::BitXor => f64::from(a ^ to_int32(*y)),
                        _ => unreachable!(),
                    })
                }
                BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                    let (ConstValue::Number(x), ConstValue::Number(y)) = (l, r) else {
                        return None;
                    };
                    ConstValue::Bool(match op {
                        BinOp::Lt => x < y,
                        BinOp::Gt => x > y,
                        BinOp::Le => x <= y,
                        BinOp::Ge => x >= y,
                        _ => unreachable!(),
                    })
                }
                // Loose equality coerces; only same-type operands fold.
                BinOp::LooseEq | BinOp::LooseNe => {
                    let same_type = matches!(
                        (l, r),
                        (ConstValue::Number(_), ConstValue::Number(_))
                            | (ConstValue::String(_), ConstValue::String(_))
                            | (ConstValue::Bool(_), ConstValue::Bool(_))
                    );
                    if !same_type {
                        return None;
                    }
                    let eq = strict_eq(l, r)?;
                    ConstValue::Bool(if *op == BinOp::LooseEq { eq } else { !eq })
                }
                _ => return None,
            };
            Some(Expr::Value(folded))
        }
        Expr::Cond { test, consequent, alternate } => {
            let Expr::Value(test) = test.as_ref() else { return None };
            Some(if truthiness(test) {
                consequent.as_ref().clone()
            } else {
                alternate.as_ref().clone()
            })
        }
        _ => None,
    }
}

/// Shake-level rewrite (independent of `--minify-syntax`): a kept
/// declaration whose symbols are all unreached keeps only its
/// initializer's side effects; same for a class declaration kept only
/// for its computed keys.
pub fn extract_unused_decl_effects(
    graph: &mut ModuleGraph,
    defines: &FxHashMap<String, crate::options::Define>,
    ignore_annotations: bool,
) -> bool {
    let mut changed = false;
    for module in &mut graph.modules {
        if !module.kept {
            continue;
        }
        let cx = EffectCx::new(
            &module.parse.symbols,
            &module.parse.stmts,
            defines,
            ignore_annotations,
        );
        let mut replacements: Vec<(usize, Stmt)> = Vec::new();
        for (index, stmt) in module.parse.stmts.iter().enumerate() {
            if !module.stmt_kept[index] {
                continue;
            }
            match stmt {
                Stmt::VarDecl { decls, exported: false, .. } => {
                    if decls
                        .iter()
                        .any(|d| module.reached_symbols.contains(&d.name))
                    {
                        continue;
                    }
                    if !effects::stmt_has_effects(stmt, &cx) {
                        continue;
                    }
                    let mut effect_exprs: Vec<Expr> = decls
                        .iter()
                        .filter_map(|d| d.init.as_ref())
                        .filter_map(|init| effects::extract_side_effects(init, &cx))
                        .collect();
                    let replacement = if effect_exprs.is_empty() {
                        Stmt::Empty
                    } else {
                        let first = effect_exprs.remove(0);
                        Stmt::Expr(effect_exprs.into_iter().fold(first, |acc, next| {
                            Expr::Binary {
                                op: BinOp::Comma,
                                left: Box::new(acc),
                                right: Box::new(next),
                            }
                        }))
                    };
                    replacements.push((index, replacement));
                }
                Stmt::ClassDecl { name, body, exported: false } => {
                    if module.reached_symbols.contains(name) {
                        continue;
                    }
                    if !effects::stmt_has_effects(stmt, &cx) {
                        continue;
                    }
                    // A side-effectful static block only runs if the
                    // class evaluates; such a class cannot be reduced to
                    // its keys.
                    let static_block_effects =
                        body.members.iter().any(|member| match member {
                            crate::ast::ClassMember::StaticBlock(stmts) => {
                                stmts.iter().any(|s| effects::stmt_has_effects(s, &cx))
                            }
                            _ => false,
                        });
                    if static_block_effects {
                        continue;
                    }
                    let replacement = effects::extract_class_side_effects(body, &cx)
                        .map_or(Stmt::Empty, Stmt::Expr);
                    replacements.push((index, replacement));
                }
                _ => {}
            }
        }
        for (index, replacement) in replacements {
            module.parse.stmts[index] = replacement;
            changed = true;
        }
    }
    changed
}
