//! Inlining and folding: `@__PURE__` drops, identity- and
//! empty-function inlining, constant and enum inlining, hoisting, and
//! the const-reassignment error.

use crate::ast::{BinOp, DeclKind, Expr, ImportKind, Stmt, VarDeclarator};
use crate::Severity;

use super::support::{
    assign, build_with, call, console_log, const_, entry_options, export_const, expr,
    func_decl, ident, import_named, kept_stmts, member, module, module_id, num, pure_call,
    ret, var_,
};

fn minify_options(entries: &[&str]) -> crate::BuildOptions {
    let mut options = entry_options(entries);
    options.minify_syntax = true;
    options
}

fn entry_stmts(output: &crate::BuildOutput, path: &str) -> Vec<Stmt> {
    output.graph.get(module_id(&output.graph, path)).parse.stmts.clone()
}

/// `@__PURE__` drops the call but an impure argument still executes.
#[test]
fn pure_annotation_boundary() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![
            func_decl("bar", &[], vec![]),
            super::support::let_("a", pure_call(ident("foo"), vec![ident("bar")])),
            super::support::let_("b", pure_call(ident("foo"), vec![call(ident("bar"), vec![])])),
            console_log(num(0.0)),
        ],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], entry_options(&["/app/entry.js"]));

    let kept = kept_stmts(&output, "/app/entry.js");
    // `a` drops entirely; `b` drops but its argument survives.
    assert!(!kept.contains(&1));
    assert!(kept.contains(&2));
    assert!(kept.contains(&3));
    let stmts = entry_stmts(&output, "/app/entry.js");
    assert_eq!(stmts[2], expr(call(ident("bar"), vec![])));
}

/// `function f(x){return x} console.log(f(1)); f(foo()); f(1);`
#[test]
fn identity_function_inlining() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![
            func_decl("f", &["x"], vec![ret(ident("x"))]),
            console_log(call(ident("f"), vec![num(1.0)])),
            expr(call(ident("f"), vec![call(ident("foo"), vec![])])),
            expr(call(ident("f"), vec![num(1.0)])),
        ],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));

    let stmts = entry_stmts(&output, "/app/entry.js");
    assert_eq!(stmts[1], console_log(num(1.0)));
    assert_eq!(stmts[2], expr(call(ident("foo"), vec![])));

    let kept = kept_stmts(&output, "/app/entry.js");
    // The declaration and the pure call drop.
    assert!(!kept.contains(&0));
    assert!(kept.contains(&1));
    assert!(kept.contains(&2));
    assert!(!kept.contains(&3));
}

#[test]
fn identity_inlining_skips_multi_arg_and_spread_calls() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![
            func_decl("f", &["x"], vec![ret(ident("x"))]),
            expr(call(ident("f"), vec![num(1.0), num(2.0)])),
            expr(call(ident("f"), vec![Expr::Spread(Box::new(ident("xs")))])),
        ],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));
    let stmts = entry_stmts(&output, "/app/entry.js");
    // Both calls stay calls.
    assert!(matches!(&stmts[1], Stmt::Expr(Expr::Call { .. })));
    assert!(matches!(&stmts[2], Stmt::Expr(Expr::Call { .. })));
}

#[test]
fn duplicate_declarations_only_last_counts() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![
            func_decl("f", &["x"], vec![ret(ident("x"))]),
            func_decl("f", &["x"], vec![ret(num(1.0))]),
            expr(call(ident("f"), vec![num(5.0)])),
        ],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));
    let stmts = entry_stmts(&output, "/app/entry.js");
    assert!(matches!(&stmts[2], Stmt::Expr(Expr::Call { .. })));
}

/// `id(foo.bar)()` becomes `(0, foo.bar)()`, not `foo.bar()`.
#[test]
fn receiver_identity_is_severed() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![
            func_decl("id", &["x"], vec![ret(ident("x"))]),
            expr(call(
                call(ident("id"), vec![member(ident("obj"), "method")]),
                vec![],
            )),
        ],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));
    let stmts = entry_stmts(&output, "/app/entry.js");
    let Stmt::Expr(Expr::Call { callee, .. }) = &stmts[1] else {
        panic!("expected call statement, got {:?}", stmts[1]);
    };
    let Expr::Binary { op: BinOp::Comma, left, right } = callee.as_ref() else {
        panic!("expected severing comma, got {callee:?}");
    };
    assert_eq!(left.as_ref(), &num(0.0));
    assert!(matches!(right.as_ref(), Expr::Member { .. }));
}

#[test]
fn empty_function_calls_keep_argument_effects() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![
            func_decl("noop", &[], vec![]),
            expr(call(ident("noop"), vec![call(ident("side"), vec![])])),
            expr(call(ident("noop"), vec![Expr::Spread(Box::new(ident("xs")))])),
        ],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));
    let stmts = entry_stmts(&output, "/app/entry.js");
    // The call is gone; the argument's effects remain as a comma chain.
    let Stmt::Expr(Expr::Binary { op: BinOp::Comma, left, .. }) = &stmts[1] else {
        panic!("expected comma expression, got {:?}", stmts[1]);
    };
    assert!(matches!(left.as_ref(), Expr::Call { .. }));
    // A spread argument still iterates.
    let Stmt::Expr(Expr::Binary { op: BinOp::Comma, left, .. }) = &stmts[2] else {
        panic!("expected comma expression, got {:?}", stmts[2]);
    };
    assert!(matches!(left.as_ref(), Expr::Array(_)));
}

/// `const x = 1; x = 2;` is an error from the DCE engine itself.
#[test]
fn const_reassignment_is_an_error() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![
            const_("x", num(1.0)),
            expr(assign(ident("x"), num(2.0))),
        ],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));
    let error = output
        .diagnostics
        .iter()
        .find(|d| d.severity == Severity::Error)
        .expect("const reassignment error");
    assert_eq!(error.message, "Cannot assign to \"x\" because it is a constant");
    assert!(!error.notes.is_empty());
    assert!(output.link.chunks.is_empty());
}

#[test]
fn local_constants_inline_and_fold() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![
            const_("WIDTH", num(10.0)),
            const_("HEIGHT", num(4.0)),
            console_log(binary_mul(ident("WIDTH"), ident("HEIGHT"))),
        ],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));
    let stmts = entry_stmts(&output, "/app/entry.js");
    assert_eq!(stmts[2], console_log(num(40.0)));
    let kept = kept_stmts(&output, "/app/entry.js");
    assert_eq!(kept, vec![2]);
}

fn binary_mul(left: Expr, right: Expr) -> Expr {
    Expr::Binary { op: BinOp::Mul, left: Box::new(left), right: Box::new(right) }
}

/// Strings never inline.
#[test]
fn string_constants_do_not_inline() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![
            const_("NAME", super::support::string("sheaf")),
            console_log(ident("NAME")),
        ],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));
    let stmts = entry_stmts(&output, "/app/entry.js");
    assert_eq!(stmts[1], console_log(ident("NAME")));
    // Which keeps the declaration alive.
    assert_eq!(kept_stmts(&output, "/app/entry.js"), vec![0, 1]);
}

#[test]
fn cross_module_constants_inline() {
    let files = [
        ("/app/entry.js", ""),
        ("/app/node_modules/config/package.json", r#"{"sideEffects": false}"#),
        ("/app/node_modules/config/index.js", ""),
    ];
    let entry = module(
        vec![
            import_named(0, &[("LIMIT", "LIMIT")]),
            console_log(ident("LIMIT")),
        ],
        &[("config", ImportKind::EsmNamed)],
    );
    let config = module(vec![export_const("LIMIT", num(50.0))], &[]);
    let output = build_with(
        &files,
        &[("/app/entry.js", entry), ("/app/node_modules/config/index.js", config)],
        minify_options(&["/app/entry.js"]),
    );
    let stmts = entry_stmts(&output, "/app/entry.js");
    assert_eq!(stmts[1], console_log(num(50.0)));
    // The import and the source declaration are both gone.
    assert_eq!(kept_stmts(&output, "/app/entry.js"), vec![1]);
    assert!(!super::support::module_kept(&output, "/app/node_modules/config/index.js"));
}

/// Constants never inline across an import cycle that transits the
/// declaring module.
#[test]
fn cycles_block_cross_module_inlining() {
    let files = [("/app/entry.js", ""), ("/app/a.js", ""), ("/app/b.js", "")];
    let entry = module(
        vec![import_named(0, &[("go", "go")]), expr(call(ident("go"), vec![]))],
        &[("./a.js", ImportKind::EsmNamed)],
    );
    let a = module(
        vec![
            import_named(0, &[("VAL", "VAL")]),
            super::support::export_func("go", &[], vec![ret(ident("VAL"))]),
        ],
        &[("./b.js", ImportKind::EsmNamed)],
    );
    let b = module(
        vec![
            import_named(0, &[("go", "go")]),
            export_const("VAL", num(9.0)),
            super::support::export_const("USE", call(ident("go"), vec![])),
        ],
        &[("./a.js", ImportKind::EsmNamed)],
    );
    let output = build_with(
        &files,
        &[("/app/entry.js", entry), ("/app/a.js", a), ("/app/b.js", b)],
        minify_options(&["/app/entry.js"]),
    );
    let a_stmts = entry_stmts(&output, "/app/a.js");
    let Stmt::FuncDecl { shape, .. } = &a_stmts[1] else { panic!("expected function") };
    // The reference to VAL survives un-inlined.
    assert_eq!(shape.body, vec![ret(ident("VAL"))]);
}

#[test]
fn enum_members_inline_and_fold() {
    let files = [("/app/entry.ts", "")];
    let entry = module(
        vec![
            Stmt::EnumDecl {
                name: "Level".to_string(),
                members: vec![
                    ("Debug".to_string(), Some(1.0)),
                    ("Warn".to_string(), Some(2.0)),
                    ("Computed".to_string(), None),
                ],
                exported: false,
            },
            console_log(Expr::Binary {
                op: BinOp::Add,
                left: Box::new(member(ident("Level"), "Debug")),
                right: Box::new(member(ident("Level"), "Warn")),
            }),
        ],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.ts", entry)], minify_options(&["/app/entry.ts"]));
    let stmts = entry_stmts(&output, "/app/entry.ts");
    assert_eq!(stmts[1], console_log(num(3.0)));
    // Members without constant initializers stay member accesses.
    assert_eq!(kept_stmts(&output, "/app/entry.ts"), vec![1]);
}

/// A `var` inside dead code after a `return` hoists to the top of the
/// enclosing function before the dead range drops.
#[test]
fn hoisting_survives_dead_code_elimination() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![
            super::support::export_func(
                "g",
                &[],
                vec![
                    ret(num(1.0)),
                    var_("y", num(2.0)),
                    console_log(ident("y")),
                ],
            ),
        ],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));
    let stmts = entry_stmts(&output, "/app/entry.js");
    let Stmt::FuncDecl { shape, .. } = &stmts[0] else { panic!("expected function") };
    assert_eq!(
        shape.body,
        vec![
            Stmt::VarDecl {
                kind: DeclKind::Var,
                decls: vec![VarDeclarator { name: "y".to_string(), init: None }],
                exported: false,
                no_side_effects: false,
            },
            ret(num(1.0)),
        ]
    );
}

/// `var y` inside a block after an unconditional `return` survives as a
/// hoisted declaration of the function.
#[test]
fn vars_in_dead_blocks_hoist_too() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![super::support::export_func(
            "g",
            &[],
            vec![
                ret(num(1.0)),
                Stmt::Block(vec![var_("y", num(2.0)), console_log(ident("y"))]),
            ],
        )],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));
    let stmts = entry_stmts(&output, "/app/entry.js");
    let Stmt::FuncDecl { shape, .. } = &stmts[0] else { panic!("expected function") };
    assert_eq!(
        shape.body,
        vec![
            Stmt::VarDecl {
                kind: DeclKind::Var,
                decls: vec![VarDeclarator { name: "y".to_string(), init: None }],
                exported: false,
                no_side_effects: false,
            },
            ret(num(1.0)),
        ]
    );
}

#[test]
fn trailing_bare_return_is_elided() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![super::support::export_func(
            "g",
            &[],
            vec![console_log(num(1.0)), Stmt::Return(None)],
        )],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));
    let stmts = entry_stmts(&output, "/app/entry.js");
    let Stmt::FuncDecl { shape, .. } = &stmts[0] else { panic!("expected function") };
    assert_eq!(shape.body, vec![console_log(num(1.0))]);

    // `return value` is not elided.
    let entry = module(
        vec![super::support::export_func("g", &[], vec![ret(num(1.0))])],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));
    let stmts = entry_stmts(&output, "/app/entry.js");
    let Stmt::FuncDecl { shape, .. } = &stmts[0] else { panic!("expected function") };
    assert_eq!(shape.body, vec![ret(num(1.0))]);
}

#[test]
fn conditional_folding_collapses_known_tests() {
    let files = [("/app/entry.js", "")];
    let entry = module(
        vec![
            const_("DEBUG", super::support::boolean(false)),
            console_log(Expr::Cond {
                test: Box::new(ident("DEBUG")),
                consequent: Box::new(call(ident("debugInfo"), vec![])),
                alternate: Box::new(num(0.0)),
            }),
        ],
        &[],
    );
    let output =
        build_with(&files, &[("/app/entry.js", entry)], minify_options(&["/app/entry.js"]));
    let stmts = entry_stmts(&output, "/app/entry.js");
    assert_eq!(stmts[1], console_log(num(0.0)));
}

/// A direct eval in the module blocks constant inlining and unused
/// import removal (for JS).
#[test]
fn direct_eval_blocks_inlining_and_import_removal() {
    let files = [
        ("/app/entry.js", ""),
        ("/app/node_modules/lib/package.json", r#"{"sideEffects": false}"#),
        ("/app/node_modules/lib/index.js", ""),
    ];
    let entry = super::support::module_with_eval(
        vec![
            import_named(0, &[("unused", "unused")]),
            const_("K", num(1.0)),
            console_log(ident("K")),
        ],
        &[("lib", ImportKind::EsmNamed)],
    );
    let lib = module(vec![export_const("unused", num(2.0))], &[]);
    let output = build_with(
        &files,
        &[("/app/entry.js", entry), ("/app/node_modules/lib/index.js", lib)],
        minify_options(&["/app/entry.js"]),
    );
    let stmts = entry_stmts(&output, "/app/entry.js");
    // K stays a reference.
    assert_eq!(stmts[2], console_log(ident("K")));
    // The unused import is retained for the eval's sake.
    assert!(kept_stmts(&output, "/app/entry.js").contains(&0));
}
