//! Linker frontend.
//!
//! Computes the ordered emission list per output chunk and the chunk's
//! leading directives, and hands the annotated graph to the printer.
//! Wrapping modules in CommonJS closures is the printer's concern; the
//! linker only selects which modules need it (`Module::wrap_cjs`).

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast::{ImportKind, Stmt},
    graph::{EdgeTarget, ModuleGraph, ModuleId},
    options::OutputFormat,
};

/// One output chunk: an entry root and the modules it emits, dependency
/// order, dependencies first.
#[derive(Debug)]
pub struct Chunk {
    pub root: ModuleId,
    /// Emission order: every module appears before any module that
    /// imports it by name binding.
    pub module_order: Vec<ModuleId>,
    /// Leading string directives, deduplicated, order-preserving.
    /// Empty under ESM output, which is always strict.
    pub directives: Vec<String>,
    pub format: OutputFormat,
}

#[derive(Debug, Default)]
pub struct LinkOutput {
    pub chunks: Vec<Chunk>,
}

pub fn link(graph: &ModuleGraph, format: OutputFormat) -> LinkOutput {
    // Chunk roots: the entries, plus every kept dynamic-import target
    // (a code-splitting point).
    let mut roots: Vec<ModuleId> = Vec::new();
    let mut seen_roots = FxHashSet::default();
    for &entry in &graph.entries {
        if graph.get(entry).kept && seen_roots.insert(entry) {
            roots.push(entry);
        }
    }
    for module in &graph.modules {
        if !module.kept {
            continue;
        }
        for edge in &module.edges {
            if edge.kind == ImportKind::DynamicImport {
                if let EdgeTarget::Module(target) = edge.target {
                    if graph.get(target).kept && seen_roots.insert(target) {
                        roots.push(target);
                    }
                }
            }
        }
    }

    let chunks = roots
        .into_iter()
        .map(|root| {
            let module_order = emission_order(graph, root);
            let directives = chunk_directives(graph, &module_order, format);
            Chunk { root, module_order, directives, format }
        })
        .collect();

    LinkOutput { chunks }
}

/// Post-order over static edges: dependencies come out first, and
/// side-effectful statements keep their source-textual order because
/// statement lists are never reordered within a module. Dynamic imports
/// are chunk boundaries, not members.
fn emission_order(graph: &ModuleGraph, root: ModuleId) -> Vec<ModuleId> {
    let mut order = Vec::new();
    let mut state: FxHashMap<ModuleId, bool> = FxHashMap::default();
    // (module, child cursor)
    let mut stack: Vec<(ModuleId, usize)> = vec![(root, 0)];
    state.insert(root, false);

    while let Some(&mut (id, ref mut cursor)) = stack.last_mut() {
        let children = static_children(graph, id);
        if let Some(&child) = children.get(*cursor) {
            *cursor += 1;
            if graph.get(child).kept && !state.contains_key(&child) {
                state.insert(child, false);
                stack.push((child, 0));
            }
        } else {
            stack.pop();
            if let Some(done) = state.get_mut(&id) {
                if !*done {
                    *done = true;
                    order.push(id);
                }
            }
        }
    }
    order
}

fn static_children(graph: &ModuleGraph, id: ModuleId) -> Vec<ModuleId> {
    let module = graph.get(id);
    module
        .edges
        .iter()
        .filter(|edge| edge.kind != ImportKind::DynamicImport)
        .filter_map(|edge| match edge.target {
            EdgeTarget::Module(target) => Some(target),
            _ => None,
        })
        .chain(module.star_exports.iter().copied())
        .chain(module.css_edges.iter().copied())
        .collect()
}

fn chunk_directives(
    graph: &ModuleGraph,
    module_order: &[ModuleId],
    format: OutputFormat,
) -> Vec<String> {
    // ESM is always strict; directives are suppressed.
    if format == OutputFormat::Esm {
        return Vec::new();
    }
    let mut seen = FxHashSet::default();
    let mut directives = Vec::new();
    for &id in module_order {
        let module = graph.get(id);
        for (index, stmt) in module.parse.stmts.iter().enumerate() {
            match stmt {
                Stmt::Directive(directive) => {
                    if module.stmt_kept.get(index).copied().unwrap_or(false)
                        && seen.insert(directive.clone())
                    {
                        directives.push(directive.clone());
                    }
                }
                // Directives only lead a file.
                _ => break,
            }
        }
    }
    directives
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{graph::Edge, resolver::Namespace};

    fn module_graph(edges: &[(u32, u32, ImportKind)], n: u32) -> ModuleGraph {
        let mut graph = ModuleGraph::default();
        for i in 0..n {
            let (id, _) = graph.intern(PathBuf::from(format!("/m{i}.js")), Namespace::File);
            let module = graph.get_mut(id);
            module.kept = true;
        }
        for &(from, to, kind) in edges {
            graph.get_mut(from).edges.push(Edge {
                specifier: format!("./m{to}"),
                kind,
                target: EdgeTarget::Module(to),
            });
        }
        graph
    }

    #[test]
    fn dependencies_emit_before_importers() {
        // 0 -> 1 -> 2, 0 -> 2
        let mut graph = module_graph(
            &[
                (0, 1, ImportKind::EsmNamed),
                (1, 2, ImportKind::EsmNamed),
                (0, 2, ImportKind::EsmNamed),
            ],
            3,
        );
        graph.entries.push(0);
        graph.get_mut(0).is_entry = true;
        let output = link(&graph, OutputFormat::Esm);
        assert_eq!(output.chunks.len(), 1);
        assert_eq!(output.chunks[0].module_order, vec![2, 1, 0]);
    }

    #[test]
    fn dynamic_imports_split_chunks() {
        let mut graph = module_graph(
            &[(0, 1, ImportKind::DynamicImport), (1, 2, ImportKind::EsmNamed)],
            3,
        );
        graph.entries.push(0);
        graph.get_mut(0).is_entry = true;
        let output = link(&graph, OutputFormat::Esm);
        assert_eq!(output.chunks.len(), 2);
        assert_eq!(output.chunks[0].module_order, vec![0]);
        assert_eq!(output.chunks[1].root, 1);
        assert_eq!(output.chunks[1].module_order, vec![2, 1]);
    }

    #[test]
    fn cycles_do_not_hang_ordering() {
        let mut graph = module_graph(
            &[(0, 1, ImportKind::EsmNamed), (1, 0, ImportKind::EsmNamed)],
            2,
        );
        graph.entries.push(0);
        graph.get_mut(0).is_entry = true;
        let output = link(&graph, OutputFormat::Esm);
        assert_eq!(output.chunks[0].module_order.len(), 2);
    }

    #[test]
    fn directives_suppressed_under_esm() {
        let mut graph = module_graph(&[], 1);
        graph.entries.push(0);
        graph.get_mut(0).is_entry = true;
        let module = graph.get_mut(0);
        module.parse.stmts = vec![Stmt::Directive("use strict".into())];
        module.stmt_kept = vec![true];
        let esm = link(&graph, OutputFormat::Esm);
        assert!(esm.chunks[0].directives.is_empty());
        let iife = link(&graph, OutputFormat::Iife);
        assert_eq!(iife.chunks[0].directives, vec!["use strict".to_string()]);
    }

    #[test]
    fn directives_deduplicate_across_modules() {
        let mut graph = module_graph(&[(0, 1, ImportKind::EsmBare)], 2);
        graph.entries.push(0);
        graph.get_mut(0).is_entry = true;
        for id in 0..2 {
            let module = graph.get_mut(id);
            module.parse.stmts = vec![Stmt::Directive("use strict".into())];
            module.stmt_kept = vec![true];
        }
        let output = link(&graph, OutputFormat::CommonJs);
        assert_eq!(output.chunks[0].directives, vec!["use strict".to_string()]);
    }
}
