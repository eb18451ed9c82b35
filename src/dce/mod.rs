//! Dead-code elimination.
//!
//! Three phases over the parsed graph: syntactic side-effect
//! classification ([`effects`]), reachability from the entry roots
//! ([`reachability`]), and inlining/folding rewrites ([`inline`]).
//! Rewrites can delete references, which can strand more symbols, so
//! the phases alternate until a fixed point. The engine runs
//! single-threaded over the finished graph.

pub mod effects;
pub mod inline;
pub mod reachability;

use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashSet;

use crate::{
    diagnostics::DiagnosticSink, graph::ModuleGraph, options::BuildOptions,
};

use effects::EffectCx;
use inline::InlinePass;
use reachability::ReachabilityPass;

/// Hard cap on fixed-point iterations; every rewrite strictly shrinks
/// the tree, so this is unreachable in practice.
const MAX_PASSES: u32 = 64;

pub struct TreeShaker<'a> {
    graph: &'a mut ModuleGraph,
    sink: &'a DiagnosticSink,
    options: &'a BuildOptions,
    cancelled: &'a AtomicBool,
}

impl<'a> TreeShaker<'a> {
    pub fn new(
        graph: &'a mut ModuleGraph,
        sink: &'a DiagnosticSink,
        options: &'a BuildOptions,
        cancelled: &'a AtomicBool,
    ) -> Self {
        Self { graph, sink, options, cancelled }
    }

    pub fn run(mut self) {
        let tree_shaking = self.options.tree_shaking_enabled();
        let mut reported_const_assigns = FxHashSet::default();
        let mut warned_bare_imports = FxHashSet::default();

        reachability::check_missing_exports(self.graph, self.sink);

        for pass in 0..MAX_PASSES {
            if self.cancelled.load(Ordering::Relaxed) {
                return;
            }
            tracing::debug!(pass, "tree_shaking_pass");

            self.classify_side_effects();
            ReachabilityPass::new(
                self.graph,
                self.sink,
                tree_shaking,
                self.options.ignore_annotations,
                &mut warned_bare_imports,
            )
            .run();

            if !tree_shaking {
                return;
            }

            let mut changed = inline::extract_unused_decl_effects(
                self.graph,
                &self.options.define,
                self.options.ignore_annotations,
            );
            if self.options.minify_syntax {
                changed |=
                    InlinePass::new(self.graph, self.sink, &mut reported_const_assigns).run();
            }
            if !changed {
                return;
            }
        }
    }

    /// Fill `stmt_effects` for every module from the current statement
    /// lists.
    fn classify_side_effects(&mut self) {
        for module in &mut self.graph.modules {
            let cx = EffectCx::new(
                &module.parse.symbols,
                &module.parse.stmts,
                &self.options.define,
                self.options.ignore_annotations,
            );
            module.stmt_effects = module
                .parse
                .stmts
                .iter()
                .map(|stmt| effects::stmt_has_effects(stmt, &cx))
                .collect();
        }
    }
}
