//! Statement-level side-effect classification (the DCE engine's first
//! phase).
//!
//! The classification is syntactic and conservative: anything not
//! provably free of observable effects is treated as effectful. The
//! visitor is a flat match over the IR.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast::{
        BinOp, ClassBody, ClassMember, ConstValue, DeclKind, Expr, PropKey, Stmt, SymbolTable,
        UnOp,
    },
    options::Define,
};

/// Module-scoped context for the classifier.
pub struct EffectCx<'a> {
    pub symbols: &'a SymbolTable,
    /// Names whose every call is pure (`@__NO_SIDE_EFFECTS__`).
    pub pure_call_names: FxHashSet<String>,
    pub defines: &'a FxHashMap<String, Define>,
    /// `--ignore-annotations`: `@__PURE__` and `@__NO_SIDE_EFFECTS__`
    /// are disabled together with `sideEffects`.
    pub ignore_annotations: bool,
}

impl<'a> EffectCx<'a> {
    pub fn new(
        symbols: &'a SymbolTable,
        stmts: &[Stmt],
        defines: &'a FxHashMap<String, Define>,
        ignore_annotations: bool,
    ) -> Self {
        let mut pure_call_names = FxHashSet::default();
        if !ignore_annotations {
            for stmt in stmts {
                match stmt {
                    Stmt::FuncDecl { name, no_side_effects: true, .. } => {
                        pure_call_names.insert(name.clone());
                    }
                    // The marker on a declaration list only applies when
                    // the first declarator is a `const` function
                    // initializer.
                    Stmt::VarDecl { kind: DeclKind::Const, decls, no_side_effects: true, .. } => {
                        if let Some(first) = decls.first() {
                            if matches!(first.init, Some(Expr::Function(_))) {
                                pure_call_names.insert(first.name.clone());
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        Self { symbols, pure_call_names, defines, ignore_annotations }
    }

    fn ident_is_bound(&self, name: &str) -> bool {
        matches!(name, "undefined" | "NaN" | "Infinity" | "globalThis")
            || self.symbols.get(name).is_some()
    }

    fn call_is_annotated_pure(&self, callee: &Expr, annotated: bool) -> bool {
        // Defines are configuration, not annotations; they survive
        // `--ignore-annotations`.
        if let Expr::Ident(name) = callee {
            if self.defines.get(name).is_some_and(|d| d.call_can_be_unwrapped_if_unused) {
                return true;
            }
        }
        if self.ignore_annotations {
            return false;
        }
        if annotated {
            return true;
        }
        if let Expr::Ident(name) = callee {
            if self.pure_call_names.contains(name) {
                return true;
            }
        }
        false
    }
}

/// `typeof x === 'undefined'` and friends: the guard forms whose purpose
/// is to avoid a throwing reference.
///
/// Recognized: `typeof x {===,!==,==,!=} 'undefined'`, the mirrored
/// operand order, and `{<,>,<=,>=}` against the single character `'u'`.
/// No other typeof-compare strings count.
pub fn typeof_guard_subject(expr: &Expr) -> Option<&str> {
    let Expr::Binary { op, left, right } = expr else { return None };

    fn subject_of(e: &Expr) -> Option<&str> {
        if let Expr::Unary { op: UnOp::TypeOf, operand } = e {
            if let Expr::Ident(name) = operand.as_ref() {
                return Some(name.as_str());
            }
        }
        None
    }

    let is_undefined_str =
        |e: &Expr| matches!(e, Expr::Value(ConstValue::String(s)) if s == "undefined");
    let is_u_str = |e: &Expr| matches!(e, Expr::Value(ConstValue::String(s)) if s == "u");

    match op {
        BinOp::StrictEq | BinOp::StrictNe | BinOp::LooseEq | BinOp::LooseNe => {
            if let Some(name) = subject_of(left) {
                if is_undefined_str(right) {
                    return Some(name);
                }
            }
            if let Some(name) = subject_of(right) {
                if is_undefined_str(left) {
                    return Some(name);
                }
            }
            None
        }
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            if let Some(name) = subject_of(left) {
                if is_u_str(right) {
                    return Some(name);
                }
            }
            if let Some(name) = subject_of(right) {
                if is_u_str(left) {
                    return Some(name);
                }
            }
            None
        }
        _ => None,
    }
}

/// Whether a guarded branch is the "bare reference" the guard protects:
/// `x` itself, or an assignment to `x` with a pure right-hand side (the
/// source treats the guard as effect-free regardless of which branch is
/// kept, even when the kept branch writes `x`).
fn is_guarded_branch(expr: &Expr, subject: &str, cx: &EffectCx) -> bool {
    match expr {
        Expr::Ident(name) => name == subject,
        Expr::Assign { op: None, target, value } => {
            matches!(target.as_ref(), Expr::Ident(name) if name == subject)
                && !expr_has_effects(value, cx)
        }
        _ => false,
    }
}

pub fn expr_has_effects(expr: &Expr, cx: &EffectCx) -> bool {
    match expr {
        Expr::Value(_) | Expr::Function(_) => false,
        Expr::Ident(name) => !cx.ident_is_bound(name),
        Expr::Unary { op, operand } => match op {
            // `typeof x` never throws, even when `x` is undeclared.
            UnOp::TypeOf => false,
            UnOp::Not | UnOp::Void => expr_has_effects(operand, cx),
            UnOp::Pos
            | UnOp::Neg
            | UnOp::BitNot
            | UnOp::Delete
            | UnOp::PreIncrement
            | UnOp::PreDecrement
            | UnOp::PostIncrement
            | UnOp::PostDecrement => true,
        },
        Expr::Binary { op, left, right } => match op {
            BinOp::StrictEq | BinOp::StrictNe | BinOp::Comma => {
                expr_has_effects(left, cx) || expr_has_effects(right, cx)
            }
            BinOp::NullishCoalesce | BinOp::Or | BinOp::And => {
                // `typeof x === 'undefined' || x` selects away from the
                // throwing reference.
                if let Some(subject) = typeof_guard_subject(left) {
                    if is_guarded_branch(right, subject, cx) {
                        return false;
                    }
                }
                expr_has_effects(left, cx) || expr_has_effects(right, cx)
            }
            _ => true,
        },
        Expr::Cond { test, consequent, alternate } => {
            if let Some(subject) = typeof_guard_subject(test) {
                let consequent_ok = is_guarded_branch(consequent, subject, cx)
                    || !expr_has_effects(consequent, cx);
                let alternate_ok = is_guarded_branch(alternate, subject, cx)
                    || !expr_has_effects(alternate, cx);
                return !(consequent_ok && alternate_ok);
            }
            expr_has_effects(test, cx)
                || expr_has_effects(consequent, cx)
                || expr_has_effects(alternate, cx)
        }
        Expr::Assign { .. } => true,
        Expr::Call { callee, args, pure, .. } => {
            if cx.call_is_annotated_pure(callee, *pure) {
                // The call is pure; its arguments still contribute their
                // own effects.
                args.iter().any(|arg| expr_has_effects(arg, cx))
            } else {
                true
            }
        }
        Expr::New { callee, args, pure } => {
            if cx.call_is_annotated_pure(callee, *pure) {
                args.iter().any(|arg| expr_has_effects(arg, cx))
            } else {
                true
            }
        }
        Expr::Member { .. } => true,
        Expr::Object(props) => props.iter().any(|prop| {
            let key_effects = match &prop.key {
                PropKey::Static(_) => false,
                PropKey::Computed(key) => expr_has_effects(key, cx),
            };
            key_effects || expr_has_effects(&prop.value, cx)
        }),
        Expr::Array(items) => items.iter().any(|item| expr_has_effects(item, cx)),
        // Iteration protocol runs user code.
        Expr::Spread(_) => true,
        Expr::Template { exprs } => exprs.iter().any(|e| expr_has_effects(e, cx)),
        Expr::TaggedTemplate { .. } => true,
        // React-element creation is registered pure; only computed
        // children can observe construction.
        Expr::Jsx { computed } => computed.iter().any(|e| expr_has_effects(e, cx)),
        Expr::DynamicImport { .. } | Expr::Require { .. } => true,
    }
}

fn class_body_has_effects(body: &ClassBody, cx: &EffectCx) -> bool {
    if body.extends.as_ref().is_some_and(|e| expr_has_effects(e, cx)) {
        return true;
    }
    body.members.iter().any(|member| match member {
        ClassMember::Method { key } => match key {
            PropKey::Static(_) => false,
            PropKey::Computed(key) => expr_has_effects(key, cx),
        },
        ClassMember::Field { key, value, is_static } => {
            let key_effects = match key {
                PropKey::Static(_) => false,
                PropKey::Computed(key) => expr_has_effects(key, cx),
            };
            // Instance field initializers only run at construction.
            key_effects
                || (*is_static && value.as_ref().is_some_and(|v| expr_has_effects(v, cx)))
        }
        ClassMember::StaticBlock(stmts) => stmts.iter().any(|s| stmt_has_effects(s, cx)),
    })
}

pub fn stmt_has_effects(stmt: &Stmt, cx: &EffectCx) -> bool {
    match stmt {
        Stmt::Directive(_) | Stmt::Empty => false,
        // Linking itself is effect-free; whether the *target module*
        // must run is reachability's decision, not a syntactic one.
        Stmt::Import { .. } | Stmt::ExportNamed { .. } | Stmt::ExportFrom { .. } => false,
        Stmt::VarDecl { decls, .. } => decls
            .iter()
            .any(|decl| decl.init.as_ref().is_some_and(|init| expr_has_effects(init, cx))),
        // Bodies are not executed at module scope.
        Stmt::FuncDecl { .. } => false,
        Stmt::ClassDecl { body, .. } => class_body_has_effects(body, cx),
        Stmt::EnumDecl { .. } => false,
        Stmt::Expr(expr) => expr_has_effects(expr, cx),
        Stmt::Block(stmts) => stmts.iter().any(|s| stmt_has_effects(s, cx)),
        Stmt::If { test, consequent, alternate } => {
            expr_has_effects(test, cx)
                || stmt_has_effects(consequent, cx)
                || alternate.as_ref().is_some_and(|alt| stmt_has_effects(alt, cx))
        }
        // Loops may not terminate; keep them. `with` changes scope
        // resolution for its whole body.
        Stmt::For { .. } | Stmt::While { .. } | Stmt::With { .. } => true,
        Stmt::Labeled { body, .. } => stmt_has_effects(body, cx),
        Stmt::Return(expr) => expr.as_ref().is_some_and(|e| expr_has_effects(e, cx)),
        Stmt::Throw(_) => true,
        Stmt::Break(_) | Stmt::Continue(_) => false,
    }
}

/// The minimal expression preserving `expr`'s side effects, or `None`
/// when it has none. Used when a declaration is dropped but its
/// initializer (or an object/class literal's computed keys) must still
/// evaluate.
pub fn extract_side_effects(expr: &Expr, cx: &EffectCx) -> Option<Expr> {
    if !expr_has_effects(expr, cx) {
        return None;
    }
    match expr {
        Expr::Call { callee, args, pure, .. } | Expr::New { callee, args, pure } => {
            if cx.call_is_annotated_pure(callee, *pure) {
                return join_effects(args.iter().filter_map(|a| extract_side_effects(a, cx)));
            }
            Some(expr.clone())
        }
        Expr::Object(props) => join_effects(props.iter().flat_map(|prop| {
            let key = match &prop.key {
                PropKey::Computed(key) => extract_side_effects(key, cx),
                PropKey::Static(_) => None,
            };
            key.into_iter().chain(extract_side_effects(&prop.value, cx))
        })),
        Expr::Array(items) => {
            join_effects(items.iter().filter_map(|item| extract_side_effects(item, cx)))
        }
        Expr::Template { exprs } | Expr::Jsx { computed: exprs } => {
            join_effects(exprs.iter().filter_map(|e| extract_side_effects(e, cx)))
        }
        Expr::Unary { op: UnOp::Not | UnOp::Void, operand } => extract_side_effects(operand, cx),
        Expr::Binary { op: BinOp::StrictEq | BinOp::StrictNe | BinOp::Comma, left, right } => {
            join_effects(
                extract_side_effects(left, cx)
                    .into_iter()
                    .chain(extract_side_effects(right, cx)),
            )
        }
        _ => Some(expr.clone()),
    }
}

/// Effects extracted from a class body that is being dropped as a whole:
/// computed keys and static initializers still evaluate.
pub fn extract_class_side_effects(body: &ClassBody, cx: &EffectCx) -> Option<Expr> {
    let mut effects = Vec::new();
    if let Some(extends) = &body.extends {
        effects.extend(extract_side_effects(extends, cx));
    }
    for member in &body.members {
        let key = match member {
            ClassMember::Method { key }
            | ClassMember::Field { key, .. } => Some(key),
            ClassMember::StaticBlock(_) => None,
        };
        if let Some(PropKey::Computed(key)) = key {
            effects.extend(extract_side_effects(key, cx));
        }
        if let ClassMember::Field { value: Some(value), is_static: true, .. } = member {
            effects.extend(extract_side_effects(value, cx));
        }
    }
    join_effects(effects)
}

fn join_effects(effects: impl IntoIterator<Item = Expr>) -> Option<Expr> {
    let mut iter = effects.into_iter();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, next| Expr::Binary {
        op: BinOp::Comma,
        left: Box::new(acc),
        right: Box::new(next),
    }))
}

/// Collect every identifier a statement references, including inside
/// function bodies. Declared names are not references. Shadowing inside
/// functions is ignored, which can only over-approximate demand.
pub fn stmt_references(stmt: &Stmt, out: &mut FxHashSet<String>) {
    match stmt {
        Stmt::Directive(_)
        | Stmt::Empty
        | Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Import { .. }
        | Stmt::EnumDecl { .. } => {}
        Stmt::VarDecl { decls, .. } => {
            for decl in decls {
                if let Some(init) = &decl.init {
                    expr_references(init, out);
                }
            }
        }
        Stmt::FuncDecl { shape, .. } => {
            for s in &shape.body {
                stmt_references(s, out);
            }
        }
        Stmt::ClassDecl { body, .. } => class_references(body, out),
        Stmt::Expr(expr) | Stmt::Throw(expr) => expr_references(expr, out),
        Stmt::ExportNamed { names } => {
            for (local, _) in names {
                out.insert(local.clone());
            }
        }
        Stmt::ExportFrom { .. } => {}
        Stmt::Block(stmts) => {
            for s in stmts {
                stmt_references(s, out);
            }
        }
        Stmt::If { test, consequent, alternate } => {
            expr_references(test, out);
            stmt_references(consequent, out);
            if let Some(alt) = alternate {
                stmt_references(alt, out);
            }
        }
        Stmt::For { init, test, update, body } => {
            for e in [init, test, update].into_iter().flatten() {
                expr_references(e, out);
            }
            stmt_references(body, out);
        }
        Stmt::While { test, body } => {
            expr_references(test, out);
            stmt_references(body, out);
        }
        Stmt::With { object, body } => {
            expr_references(object, out);
            stmt_references(body, out);
        }
        Stmt::Labeled { body, .. } => stmt_references(body, out),
        Stmt::Return(expr) => {
            if let Some(e) = expr {
                expr_references(e, out);
            }
        }
    }
}

fn class_references(body: &ClassBody, out: &mut FxHashSet<String>) {
    if let Some(extends) = &body.extends {
        expr_references(extends, out);
    }
    for member in &body.members {
        match member {
            ClassMember::Method { key } => prop_key_references(key, out),
            ClassMember::Field { key, value, .. } => {
                prop_key_references(key, out);
                if let Some(value) = value {
                    expr_references(value, out);
                }
            }
            ClassMember::StaticBlock(stmts) => {
                for s in stmts {
                    stmt_references(s, out);
                }
            }
        }
    }
}

fn prop_key_references(key: &PropKey, out: &mut FxHashSet<String>) {
    if let PropKey::Computed(key) = key {
        expr_references(key, out);
    }
}

pub fn expr_references(expr: &Expr, out: &mut FxHashSet<String>) {
    match expr {
        Expr::Value(_) | Expr::DynamicImport { .. } | Expr::Require { .. } => {}
        Expr::Ident(name) => {
            out.insert(name.clone());
        }
        Expr::Unary { operand, .. } => expr_references(operand, out),
        Expr::Binary { left, right, .. } => {
            expr_references(left, out);
            expr_references(right, out);
        }
        Expr::Cond { test, consequent, alternate } => {
            expr_references(test, out);
            expr_references(consequent, out);
            expr_references(alternate, out);
        }
        Expr::Assign { target, value, .. } => {
            expr_references(target, out);
            expr_references(value, out);
        }
        Expr::Call { callee, args, .. } | Expr::New { callee, args, .. } => {
            expr_references(callee, out);
            for arg in args {
                expr_references(arg, out);
            }
        }
        Expr::Member { object, computed, .. } => {
            expr_references(object, out);
            if let Some(computed) = computed {
                expr_references(computed, out);
            }
        }
        Expr::Object(props) => {
            for prop in props {
                prop_key_references(&prop.key, out);
                expr_references(&prop.value, out);
            }
        }
        Expr::Array(items) | Expr::Template { exprs: items } | Expr::Jsx { computed: items } => {
            for item in items {
                expr_references(item, out);
            }
        }
        Expr::Spread(inner) => expr_references(inner, out),
        Expr::TaggedTemplate { tag, exprs } => {
            expr_references(tag, out);
            for e in exprs {
                expr_references(e, out);
            }
        }
        Expr::Function(shape) => {
            for s in &shape.body {
                stmt_references(s, out);
            }
        }
    }
}

/// Names a statement declares at module scope.
pub fn stmt_declared_names(stmt: &Stmt) -> Vec<&str> {
    match stmt {
        Stmt::VarDecl { decls, .. } => decls.iter().map(|d| d.name.as_str()).collect(),
        Stmt::FuncDecl { name, .. }
        | Stmt::ClassDecl { name, .. }
        | Stmt::EnumDecl { name, .. } => vec![name.as_str()],
        Stmt::Import { bindings, .. } => bindings.iter().map(|b| b.local.as_str()).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FunctionShape, SymbolKind, VarDeclarator};

    fn cx_with<'a>(
        symbols: &'a SymbolTable,
        defines: &'a FxHashMap<String, Define>,
    ) -> EffectCx<'a> {
        EffectCx::new(symbols, &[], defines, false)
    }

    fn num(n: f64) -> Expr {
        Expr::Value(ConstValue::Number(n))
    }

    fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    fn typeof_eq_undefined(name: &str) -> Expr {
        Expr::Binary {
            op: BinOp::StrictEq,
            left: Box::new(Expr::Unary {
                op: UnOp::TypeOf,
                operand: Box::new(ident(name)),
            }),
            right: Box::new(Expr::Value(ConstValue::String("undefined".into()))),
        }
    }

    #[test]
    fn pure_and_impure_unary() {
        let symbols = SymbolTable::default();
        let defines = FxHashMap::default();
        let cx = cx_with(&symbols, &defines);
        let free = ident("free");
        assert!(!expr_has_effects(
            &Expr::Unary { op: UnOp::TypeOf, operand: Box::new(free.clone()) },
            &cx
        ));
        assert!(expr_has_effects(
            &Expr::Unary { op: UnOp::Neg, operand: Box::new(num(1.0)) },
            &cx
        ));
        // A bare free identifier reference may throw.
        assert!(expr_has_effects(&free, &cx));
    }

    #[test]
    fn binary_purity_table() {
        let symbols = SymbolTable::default();
        let defines = FxHashMap::default();
        let cx = cx_with(&symbols, &defines);
        let pure = Expr::Binary {
            op: BinOp::StrictEq,
            left: Box::new(num(1.0)),
            right: Box::new(num(2.0)),
        };
        assert!(!expr_has_effects(&pure, &cx));
        let impure = Expr::Binary {
            op: BinOp::Add,
            left: Box::new(num(1.0)),
            right: Box::new(num(2.0)),
        };
        assert!(expr_has_effects(&impure, &cx));
        let loose = Expr::Binary {
            op: BinOp::LooseEq,
            left: Box::new(num(1.0)),
            right: Box::new(num(2.0)),
        };
        assert!(expr_has_effects(&loose, &cx));
    }

    #[test]
    fn pure_annotation_keeps_argument_effects() {
        let symbols = SymbolTable::default();
        let defines = FxHashMap::default();
        let cx = cx_with(&symbols, &defines);
        let pure_call_pure_args = Expr::Call {
            callee: Box::new(ident("foo")),
            args: vec![num(1.0)],
            pure: true,
            direct_eval: false,
        };
        assert!(!expr_has_effects(&pure_call_pure_args, &cx));

        let inner_call = Expr::Call {
            callee: Box::new(ident("bar")),
            args: vec![],
            pure: false,
            direct_eval: false,
        };
        let pure_call_impure_args = Expr::Call {
            callee: Box::new(ident("foo")),
            args: vec![inner_call.clone()],
            pure: true,
            direct_eval: false,
        };
        assert!(expr_has_effects(&pure_call_impure_args, &cx));
        // And the extracted effects are exactly the argument.
        let extracted = extract_side_effects(&pure_call_impure_args, &cx).unwrap();
        assert_eq!(extracted, inner_call);
    }

    #[test]
    fn typeof_guard_forms() {
        assert_eq!(typeof_guard_subject(&typeof_eq_undefined("x")), Some("x"));
        let lt_u = Expr::Binary {
            op: BinOp::Lt,
            left: Box::new(Expr::Unary { op: UnOp::TypeOf, operand: Box::new(ident("y")) }),
            right: Box::new(Expr::Value(ConstValue::String("u".into()))),
        };
        assert_eq!(typeof_guard_subject(&lt_u), Some("y"));
        let other = Expr::Binary {
            op: BinOp::StrictEq,
            left: Box::new(Expr::Unary { op: UnOp::TypeOf, operand: Box::new(ident("y")) }),
            right: Box::new(Expr::Value(ConstValue::String("object".into()))),
        };
        assert_eq!(typeof_guard_subject(&other), None);
    }

    #[test]
    fn guarded_ternary_is_pure_despite_free_reference() {
        let symbols = SymbolTable::default();
        let defines = FxHashMap::default();
        let cx = cx_with(&symbols, &defines);
        // typeof x === 'undefined' ? undefined : x
        let guarded = Expr::Cond {
            test: Box::new(typeof_eq_undefined("x")),
            consequent: Box::new(ident("undefined")),
            alternate: Box::new(ident("x")),
        };
        assert!(!expr_has_effects(&guarded, &cx));
        // Same shape with a non-guard test is impure (free `x`).
        let unguarded = Expr::Cond {
            test: Box::new(Expr::Value(ConstValue::Bool(true))),
            consequent: Box::new(ident("undefined")),
            alternate: Box::new(ident("x")),
        };
        assert!(expr_has_effects(&unguarded, &cx));
    }

    #[test]
    fn no_side_effects_annotation_applies_to_calls() {
        let mut symbols = SymbolTable::default();
        symbols.declare("f", SymbolKind::Function);
        let defines = FxHashMap::default();
        let stmts = vec![Stmt::FuncDecl {
            name: "f".into(),
            shape: FunctionShape::default(),
            exported: false,
            no_side_effects: true,
        }];
        let cx = EffectCx::new(&symbols, &stmts, &defines, false);
        let call = Expr::Call {
            callee: Box::new(ident("f")),
            args: vec![],
            pure: false,
            direct_eval: false,
        };
        assert!(!expr_has_effects(&call, &cx));

        // Ignoring annotations turns it back into an ordinary call.
        let cx = EffectCx::new(&symbols, &stmts, &defines, true);
        assert!(expr_has_effects(&call, &cx));
    }

    #[test]
    fn var_decl_purity_follows_initializers() {
        let mut symbols = SymbolTable::default();
        symbols.declare("a", SymbolKind::Const);
        let defines = FxHashMap::default();
        let cx = cx_with(&symbols, &defines);
        let pure_decl = Stmt::VarDecl {
            kind: DeclKind::Const,
            decls: vec![VarDeclarator { name: "a".into(), init: Some(num(1.0)) }],
            exported: false,
            no_side_effects: false,
        };
        assert!(!stmt_has_effects(&pure_decl, &cx));

        let impure_decl = Stmt::VarDecl {
            kind: DeclKind::Let,
            decls: vec![VarDeclarator {
                name: "a".into(),
                init: Some(Expr::Call {
                    callee: Box::new(ident("init")),
                    args: vec![],
                    pure: false,
                    direct_eval: false,
                }),
            }],
            exported: false,
            no_side_effects: false,
        };
        assert!(stmt_has_effects(&impure_decl, &cx));
    }

    #[test]
    fn unwrappable_defines_make_calls_pure() {
        let symbols = SymbolTable::default();
        let mut defines = FxHashMap::default();
        defines.insert(
            "__DEV_ASSERT__".to_string(),
            Define { replacement: "assert".into(), call_can_be_unwrapped_if_unused: true },
        );
        let cx = EffectCx::new(&symbols, &[], &defines, false);
        let call = Expr::Call {
            callee: Box::new(ident("__DEV_ASSERT__")),
            args: vec![num(1.0)],
            pure: false,
            direct_eval: false,
        };
        assert!(!expr_has_effects(&call, &cx));

        let plain = FxHashMap::default();
        let cx = EffectCx::new(&symbols, &[], &plain, false);
        assert!(expr_has_effects(&call, &cx));
    }

    #[test]
    fn jsx_with_pure_children_is_pure() {
        let symbols = SymbolTable::default();
        let defines = FxHashMap::default();
        let cx = cx_with(&symbols, &defines);
        assert!(!expr_has_effects(&Expr::Jsx { computed: vec![num(1.0)] }, &cx));
        assert!(expr_has_effects(
            &Expr::Jsx {
                computed: vec![Expr::Call {
                    callee: Box::new(ident("f")),
                    args: vec![],
                    pure: false,
                    direct_eval: false,
                }]
            },
            &cx
        ));
    }
}
