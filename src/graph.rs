//! The module graph.
//!
//! Nodes are parsed modules; edges carry *symbol demand*, not control
//! flow. Strongly connected components over the import edges are
//! computed once after walking and consulted by the inliner to block
//! cross-module constant inlining through cycles.

use std::path::PathBuf;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast::{ImportKind, ParseOutput},
    loader::Loader,
    resolver::Namespace,
    side_effects::SideEffectVerdict,
};

pub type ModuleId = u32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeTarget {
    Module(ModuleId),
    /// Kept in the output as-is (Node builtins, host-declared externals).
    External(String),
    /// Resolution failed; an error diagnostic exists for it.
    Unresolved,
}

/// One import record's resolution.
#[derive(Debug, Clone)]
pub struct Edge {
    pub specifier: String,
    pub kind: ImportKind,
    pub target: EdgeTarget,
}

/// How an exported name is satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportMember {
    /// Bound to a module-local symbol.
    Local { symbol: String },
    /// `export { imported as name } from "m"`: demand flows through
    /// without running `m`'s side effects.
    ReExport { record: u32, imported: String },
}

#[derive(Debug)]
pub struct Module {
    pub id: ModuleId,
    pub path: PathBuf,
    pub namespace: Namespace,
    pub loader: Loader,
    pub side_effects: SideEffectVerdict,
    pub is_entry: bool,
    /// Order in which the walker discovered the module; diagnostics
    /// sort by it.
    pub discovery_index: u32,
    pub parse: ParseOutput,
    /// Parallel to `parse.import_records`.
    pub edges: Vec<Edge>,
    pub exports: FxHashMap<String, ExportMember>,
    /// `export * from` targets, in source order.
    pub star_exports: Vec<ModuleId>,
    /// CSS imported for side effect, tracked apart from `edges` so a
    /// dropped JS owner can still pin its side-effectful CSS.
    pub css_edges: Vec<ModuleId>,

    // DCE annotations.
    /// May-have-side-effects per top-level statement, from the
    /// syntactic classifier.
    pub stmt_effects: Vec<bool>,
    /// Shaking outcome per top-level statement; the printer trusts it.
    pub stmt_kept: Vec<bool>,
    /// Symbols something kept still refers to.
    pub reached_symbols: FxHashSet<String>,
    /// Whether the module survives at all.
    pub kept: bool,
    /// Strongly connected component over import edges.
    pub scc: u32,
    /// The linker wraps this module in a CommonJS closure.
    pub wrap_cjs: bool,
}

impl Module {
    pub fn edge_for_record(&self, record: u32) -> Option<&Edge> {
        self.edges.get(record as usize)
    }
}

#[derive(Debug, Default)]
pub struct ModuleGraph {
    pub modules: Vec<Module>,
    by_key: FxHashMap<(PathBuf, Namespace), ModuleId>,
    pub entries: Vec<ModuleId>,
}

impl ModuleGraph {
    #[must_use]
    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id as usize]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id as usize]
    }

    #[must_use]
    pub fn lookup(&self, path: &std::path::Path, namespace: Namespace) -> Option<ModuleId> {
        self.by_key.get(&(path.to_path_buf(), namespace)).copied()
    }

    /// Reserve an id for a path. Returns `(id, true)` when the module is
    /// new and needs loading.
    pub fn intern(&mut self, path: PathBuf, namespace: Namespace) -> (ModuleId, bool) {
        if let Some(&id) = self.by_key.get(&(path.clone(), namespace)) {
            return (id, false);
        }
        let id = u32::try_from(self.modules.len()).expect("module count fits in u32");
        self.by_key.insert((path.clone(), namespace), id);
        self.modules.push(Module {
            id,
            path,
            namespace,
            loader: Loader::Js,
            side_effects: SideEffectVerdict::unknown(),
            is_entry: false,
            discovery_index: id,
            parse: ParseOutput::default(),
            edges: Vec::new(),
            exports: FxHashMap::default(),
            star_exports: Vec::new(),
            css_edges: Vec::new(),
            stmt_effects: Vec::new(),
            stmt_kept: Vec::new(),
            reached_symbols: FxHashSet::default(),
            kept: false,
            scc: 0,
            wrap_cjs: false,
        });
        (id, true)
    }

    /// Every edge's target module, including `export * from` and CSS
    /// edges.
    fn neighbors(&self, id: ModuleId) -> impl Iterator<Item = ModuleId> + '_ {
        let module = self.get(id);
        module
            .edges
            .iter()
            .filter_map(|edge| match edge.target {
                EdgeTarget::Module(target) => Some(target),
                _ => None,
            })
            .chain(module.star_exports.iter().copied())
    }

    /// Iterative Tarjan over import edges; fills `Module::scc`.
    ///
    /// Modules in the same component are mutually reachable, which is
    /// exactly the condition that blocks cross-module constant inlining.
    pub fn compute_sccs(&mut self) {
        let n = self.modules.len();
        let mut index = vec![u32::MAX; n];
        let mut low = vec![0u32; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<u32> = Vec::new();
        let mut next_index = 0u32;
        let mut next_scc = 0u32;
        let mut sccs = vec![0u32; n];

        // (node, neighbor cursor)
        let mut work: Vec<(u32, usize)> = Vec::new();

        for start in 0..n as u32 {
            if index[start as usize] != u32::MAX {
                continue;
            }
            work.push((start, 0));
            while let Some(&mut (node, ref mut cursor)) = work.last_mut() {
                if *cursor == 0 {
                    index[node as usize] = next_index;
                    low[node as usize] = next_index;
                    next_index += 1;
                    stack.push(node);
                    on_stack[node as usize] = true;
                }
                let neighbors: Vec<u32> = self.neighbors(node).collect();
                if let Some(&next) = neighbors.get(*cursor) {
                    *cursor += 1;
                    if index[next as usize] == u32::MAX {
                        work.push((next, 0));
                    } else if on_stack[next as usize] {
                        low[node as usize] = low[node as usize].min(index[next as usize]);
                    }
                } else {
                    work.pop();
                    if let Some(&(parent, _)) = work.last() {
                        low[parent as usize] = low[parent as usize].min(low[node as usize]);
                    }
                    if low[node as usize] == index[node as usize] {
                        loop {
                            let popped = stack.pop().expect("tarjan stack underflow");
                            on_stack[popped as usize] = false;
                            sccs[popped as usize] = next_scc;
                            if popped == node {
                                break;
                            }
                        }
                        next_scc += 1;
                    }
                }
            }
        }

        for (module, scc) in self.modules.iter_mut().zip(sccs) {
            module.scc = scc;
        }
    }

    /// Whether `a` and `b` sit on a common import cycle.
    #[must_use]
    pub fn in_same_cycle(&self, a: ModuleId, b: ModuleId) -> bool {
        a != b && self.get(a).scc == self.get(b).scc
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn graph_with_edges(n: u32, edges: &[(u32, u32)]) -> ModuleGraph {
        let mut graph = ModuleGraph::default();
        for i in 0..n {
            let (id, fresh) = graph.intern(PathBuf::from(format!("/m{i}.js")), Namespace::File);
            assert!(fresh);
            assert_eq!(id, i);
        }
        for &(from, to) in edges {
            graph.get_mut(from).edges.push(Edge {
                specifier: format!("./m{to}"),
                kind: ImportKind::EsmNamed,
                target: EdgeTarget::Module(to),
            });
        }
        graph
    }

    #[test]
    fn intern_is_idempotent() {
        let mut graph = ModuleGraph::default();
        let (a, fresh_a) = graph.intern(PathBuf::from("/a.js"), Namespace::File);
        let (b, fresh_b) = graph.intern(PathBuf::from("/a.js"), Namespace::File);
        assert!(fresh_a);
        assert!(!fresh_b);
        assert_eq!(a, b);
    }

    #[test]
    fn scc_detects_cycles() {
        // 0 -> 1 -> 2 -> 0 is a cycle; 3 hangs off it.
        let mut graph = graph_with_edges(4, &[(0, 1), (1, 2), (2, 0), (1, 3)]);
        graph.compute_sccs();
        assert!(graph.in_same_cycle(0, 1));
        assert!(graph.in_same_cycle(1, 2));
        assert!(!graph.in_same_cycle(1, 3));
        assert!(!graph.in_same_cycle(3, 3));
    }

    #[test]
    fn acyclic_chain_has_distinct_components() {
        let mut graph = graph_with_edges(3, &[(0, 1), (1, 2)]);
        graph.compute_sccs();
        assert!(!graph.in_same_cycle(0, 1));
        assert!(!graph.in_same_cycle(0, 2));
    }

    #[test]
    fn star_export_edges_participate_in_cycles() {
        let mut graph = graph_with_edges(2, &[(0, 1)]);
        graph.get_mut(1).star_exports.push(0);
        graph.compute_sccs();
        assert!(graph.in_same_cycle(0, 1));
    }
}
