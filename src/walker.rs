//! Dependency walker.
//!
//! Starting from the entry points, demand-loads and parses each file,
//! collects its import records, drives the resolver, and builds the
//! module graph.
//!
//! Parsing is embarrassingly parallel once a frontier of pending
//! modules is known, so each wave runs on the rayon pool; the graph
//! itself is only touched on the walking thread, and wave results are
//! merged in discovery order so the resulting graph does not depend on
//! scheduling.

use std::{
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
};

use rayon::prelude::*;

use crate::{
    ast::{ImportKind, ImportRecord, ParseOutput, Parser, Stmt},
    diagnostics::{Diagnostic, DiagnosticSink, Note},
    error::ResolveError,
    file_system::FileSystem,
    graph::{Edge, EdgeTarget, ExportMember, ModuleGraph, ModuleId},
    loader::Loader,
    resolver::{Namespace, Resolution, ResolverGeneric},
    side_effects::SideEffectVerdict,
    specifier::{Specifier, SpecifierKind},
};

/// A module waiting to be loaded and parsed.
struct Pending {
    id: ModuleId,
    path: PathBuf,
    namespace: Namespace,
    loader: Loader,
    side_effects: SideEffectVerdict,
    /// Decoded data URL contents.
    data: Option<Vec<u8>>,
}

/// What one worker produced for one pending module.
struct Loaded {
    parse: ParseOutput,
    /// Per import record, in record order.
    resolutions: Vec<Result<Resolution, ResolveError>>,
}

pub struct Walker<'a, Fs> {
    resolver: &'a ResolverGeneric<Fs>,
    parser: &'a dyn Parser,
    sink: &'a DiagnosticSink,
    cancelled: &'a AtomicBool,
}

impl<'a, Fs: FileSystem> Walker<'a, Fs> {
    pub fn new(
        resolver: &'a ResolverGeneric<Fs>,
        parser: &'a dyn Parser,
        sink: &'a DiagnosticSink,
        cancelled: &'a AtomicBool,
    ) -> Self {
        Self { resolver, parser, sink, cancelled }
    }

    /// Build the graph from the configured entries (and injected files,
    /// which root the graph the same way).
    pub fn walk(&self) -> ModuleGraph {
        let mut graph = ModuleGraph::default();
        let mut frontier = Vec::new();

        let options = self.resolver.options();
        // Injected files root the graph exactly like entries.
        let entry_paths: Vec<PathBuf> =
            options.inject.iter().chain(options.entries.iter()).cloned().collect();

        for entry in entry_paths {
            match self.seed_entry(&entry) {
                Ok((loader, side_effects)) => {
                    let (id, fresh) = graph.intern(entry.clone(), Namespace::File);
                    let module = graph.get_mut(id);
                    module.is_entry = true;
                    graph.entries.push(id);
                    if fresh {
                        frontier.push(Pending {
                            id,
                            path: entry,
                            namespace: Namespace::File,
                            loader,
                            side_effects,
                            data: None,
                        });
                    }
                }
                Err(err) => {
                    self.sink.push_unordered(
                        Diagnostic::error(format!("Could not read entry point: {err}"))
                            .with_path(entry),
                    );
                }
            }
        }

        while !frontier.is_empty() {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }
            let wave: Vec<Loaded> =
                frontier.par_iter().map(|pending| self.load_one(pending)).collect();
            let tasks = std::mem::take(&mut frontier);
            for (pending, loaded) in tasks.into_iter().zip(wave) {
                self.merge(&mut graph, pending, loaded, &mut frontier);
            }
        }

        self.finish_star_exports(&mut graph);
        graph.compute_sccs();
        graph
    }

    fn seed_entry(&self, entry: &PathBuf) -> Result<(Loader, SideEffectVerdict), ResolveError> {
        let cache = self.resolver.cache();
        let cached = cache.value(entry);
        if !cached.is_file(&cache.fs) {
            return Err(ResolveError::NotFound(entry.to_string_lossy().into_owned()));
        }
        let package_json = cached.find_package_json(&cache.fs)?;
        let side_effects = if self.resolver.options().ignore_annotations {
            SideEffectVerdict::unknown()
        } else {
            crate::side_effects::classify(package_json.as_deref(), entry)
        };
        Ok((self.resolver.options().loaders.for_path(entry), side_effects))
    }

    /// Runs on the worker pool: read, parse, resolve the module's
    /// imports.
    fn load_one(&self, pending: &Pending) -> Loaded {
        if self.cancelled.load(Ordering::Relaxed) {
            return Loaded { parse: ParseOutput::default(), resolutions: vec![] };
        }
        let parse = self.parse_pending(pending);
        let resolutions = parse
            .import_records
            .iter()
            .map(|record| {
                if pending.namespace == Namespace::DataUrl {
                    let kind = Specifier::parse(&record.specifier)
                        .map(|s| s.kind)
                        .unwrap_or(SpecifierKind::Bare);
                    if kind == SpecifierKind::Relative {
                        return Err(ResolveError::DataUrlRelativeImport(
                            record.specifier.clone(),
                        ));
                    }
                    // Nothing to resolve bare specifiers against either;
                    // fall back to the filesystem root.
                    return self.resolver.resolve(
                        std::path::Path::new("/"),
                        &record.specifier,
                        record.kind,
                    );
                }
                self.resolver.resolve(&pending.path, &record.specifier, record.kind)
            })
            .collect();
        Loaded { parse, resolutions }
    }

    fn parse_pending(&self, pending: &Pending) -> ParseOutput {
        let source = match &pending.data {
            Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            None => match self.resolver.cache().fs.read_to_string(&pending.path) {
                Ok(source) => source,
                Err(err) => {
                    self.sink.push_unordered(
                        Diagnostic::error(format!("Could not read file: {err}"))
                            .with_path(pending.path.clone()),
                    );
                    return ParseOutput::default();
                }
            },
        };
        if pending.loader.is_script() || pending.loader.is_css() {
            match self.parser.parse(&pending.path, &source, pending.loader) {
                Ok(parse) => parse,
                Err(err) => {
                    self.sink.push(
                        (pending.id, 0),
                        Diagnostic::error(err.message).with_path(pending.path.clone()),
                    );
                    ParseOutput::default()
                }
            }
        } else {
            // Non-script assets enter the graph as a synthetic module
            // with a single default export.
            ParseOutput::default()
        }
    }

    /// Single-threaded: merge one worker result into the graph and
    /// enqueue newly discovered modules.
    fn merge(
        &self,
        graph: &mut ModuleGraph,
        pending: Pending,
        loaded: Loaded,
        frontier: &mut Vec<Pending>,
    ) {
        let mut edges = Vec::with_capacity(loaded.parse.import_records.len());
        let mut discovered = Vec::new();
        let mut css_edges = Vec::new();

        for (record_index, resolution) in loaded.resolutions.into_iter().enumerate() {
            let record = &loaded.parse.import_records[record_index];
            let target = match resolution {
                Err(err) => {
                    self.report_resolve_error(&pending, record_index, &record.specifier, &err);
                    EdgeTarget::Unresolved
                }
                Ok(resolution) if resolution.external => {
                    EdgeTarget::External(record.specifier.clone())
                }
                Ok(resolution) => {
                    self.check_import_attributes(&pending, record_index, record, &resolution);
                    let (id, fresh) = graph.intern(resolution.path.clone(), resolution.namespace);
                    if fresh {
                        discovered.push(Pending {
                            id,
                            path: resolution.path,
                            namespace: resolution.namespace,
                            loader: resolution.loader,
                            side_effects: resolution.side_effects,
                            data: resolution.data,
                        });
                    }
                    if resolution.loader.is_css()
                        && matches!(record.kind, ImportKind::EsmBare | ImportKind::CssImport)
                    {
                        css_edges.push(id);
                    }
                    EdgeTarget::Module(id)
                }
            };
            edges.push(Edge { specifier: record.specifier.clone(), kind: record.kind, target });
        }

        self.check_with_statements(&pending, &loaded.parse);

        let module = graph.get_mut(pending.id);
        module.loader = pending.loader;
        module.side_effects = pending.side_effects;
        module.edges = edges;
        module.css_edges = css_edges;
        module.exports = collect_exports(&loaded.parse);
        if !pending.loader.is_script() && !pending.loader.is_css() {
            module.exports.insert(
                "default".to_string(),
                ExportMember::Local { symbol: "default".to_string() },
            );
        }
        module.parse = loaded.parse;

        frontier.append(&mut discovered);
    }

    /// `with` is a syntax error in strict mode; strictness can come from
    /// the tsconfig projected onto the file.
    fn check_with_statements(&self, pending: &Pending, parse: &ParseOutput) {
        if !parse.stmts.iter().any(stmt_contains_with) {
            return;
        }
        let Ok(Some(tsconfig)) = self.resolver.tsconfig_for_file(&pending.path) else {
            return;
        };
        if !tsconfig.compiler_options.always_strict_effective() {
            return;
        }
        let option = tsconfig
            .compiler_options
            .always_strict
            .as_ref()
            .or(tsconfig.compiler_options.strict.as_ref());
        let mut diagnostic = Diagnostic::error(
            "With statements cannot be used in strict mode".to_string(),
        )
        .with_path(pending.path.clone());
        if let Some(option) = option {
            diagnostic = diagnostic.with_note(Note::new(
                "Strict mode is enabled by the \"alwaysStrict\" setting here",
                option.defined_in.clone(),
            ));
        }
        self.sink.push((pending.id, 0), diagnostic);
    }

    fn report_resolve_error(
        &self,
        pending: &Pending,
        record_index: usize,
        specifier: &str,
        err: &ResolveError,
    ) {
        let key = (pending.id, u32::try_from(record_index).unwrap_or(u32::MAX));
        let diagnostic = match err {
            ResolveError::NotFoundRelativeHint(_, hint) => Diagnostic::error(format!(
                "Could not resolve \"{specifier}\". Use the relative path \"{hint}\" to reference the file"
            )),
            _ => Diagnostic::error(format!("Could not resolve \"{specifier}\": {err}")),
        };
        self.sink.push(key, diagnostic.with_path(pending.path.clone()));
    }

    fn check_import_attributes(
        &self,
        pending: &Pending,
        record_index: usize,
        record: &ImportRecord,
        resolution: &Resolution,
    ) {
        if record.kind != ImportKind::ImportAttribute {
            return;
        }
        let key = (pending.id, u32::try_from(record_index).unwrap_or(u32::MAX));
        match record.attribute_type.as_deref() {
            Some("json") => {
                if resolution.loader != Loader::Json {
                    self.sink.push(
                        key,
                        Diagnostic::error(format!(
                            "The file \"{}\" was loaded with the \"{:?}\" loader instead of the \"json\" loader required by the import assertion",
                            resolution.path.display(),
                            resolution.loader
                        ))
                        .with_path(pending.path.clone())
                        .with_note(Note {
                            message: "the import carries `assert { type: \"json\" }`".to_string(),
                            path: None,
                        }),
                    );
                }
            }
            _ => {
                if self.resolver.options().bundle {
                    self.sink.push(
                        key,
                        Diagnostic::error(format!(
                            "Bundling with import attributes is not supported for \"{}\"",
                            record.specifier
                        ))
                        .with_path(pending.path.clone()),
                    );
                }
            }
        }
    }

    /// `export * from` targets become graph-level links once every edge
    /// is resolved.
    fn finish_star_exports(&self, graph: &mut ModuleGraph) {
        for index in 0..graph.modules.len() {
            let module = &graph.modules[index];
            let mut stars = Vec::new();
            for stmt in &module.parse.stmts {
                if let Stmt::ExportFrom { record, star: true, .. } = stmt {
                    if let Some(Edge { target: EdgeTarget::Module(target), .. }) =
                        module.edge_for_record(*record)
                    {
                        stars.push(*target);
                    }
                }
            }
            graph.modules[index].star_exports = stars;
        }
    }
}

fn stmt_contains_with(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::With { .. } => true,
        Stmt::Block(stmts) => stmts.iter().any(stmt_contains_with),
        Stmt::If { consequent, alternate, .. } => {
            stmt_contains_with(consequent)
                || alternate.as_ref().is_some_and(|alt| stmt_contains_with(alt))
        }
        Stmt::For { body, .. } | Stmt::While { body, .. } | Stmt::Labeled { body, .. } => {
            stmt_contains_with(body)
        }
        Stmt::FuncDecl { shape, .. } => shape.body.iter().any(stmt_contains_with),
        _ => false,
    }
}

/// Exported-name table from the statement list.
fn collect_exports(parse: &ParseOutput) -> rustc_hash::FxHashMap<String, ExportMember> {
    let mut exports = rustc_hash::FxHashMap::default();
    for stmt in &parse.stmts {
        match stmt {
            Stmt::VarDecl { decls, exported: true, .. } => {
                for decl in decls {
                    exports.insert(
                        decl.name.clone(),
                        ExportMember::Local { symbol: decl.name.clone() },
                    );
                }
            }
            Stmt::FuncDecl { name, exported: true, .. }
            | Stmt::ClassDecl { name, exported: true, .. }
            | Stmt::EnumDecl { name, exported: true, .. } => {
                exports.insert(name.clone(), ExportMember::Local { symbol: name.clone() });
            }
            Stmt::ExportNamed { names } => {
                for (local, exported) in names {
                    exports
                        .insert(exported.clone(), ExportMember::Local { symbol: local.clone() });
                }
            }
            Stmt::ExportFrom { record, names, star: false } => {
                for (imported, exported) in names {
                    exports.insert(
                        exported.clone(),
                        ExportMember::ReExport { record: *record, imported: imported.clone() },
                    );
                }
            }
            _ => {}
        }
    }
    exports
}
