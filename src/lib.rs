//! # Sheaf
//!
//! Bundler core for JavaScript, TypeScript, JSX and CSS: module
//! resolution, tree shaking and tsconfig projection.
//!
//! The crate resolves a dependency graph from one or more entry points,
//! parses every reachable module through an external [`Parser`],
//! performs dead-code elimination and constant folding, and computes
//! per-chunk emission order for an external printer.
//!
//! ## References:
//!
//! * Resolution follows the Node.js [CommonJS Module Resolution Algorithm]
//!   and [ECMAScript Module Resolution Algorithm], augmented with
//!   tsconfig `paths`/`baseUrl` and package `sideEffects`.
//!
//! [CommonJS Module Resolution Algorithm]: https://nodejs.org/api/modules.html#all-together
//! [ECMAScript Module Resolution Algorithm]: https://nodejs.org/api/esm.html#resolution-algorithm-specification

mod builtins;
mod cache;
mod data_url;
mod dce;
mod diagnostics;
mod error;
mod file_system;
mod glob;
mod graph;
mod linker;
mod loader;
mod options;
mod package_json;
mod path;
mod resolver;
mod side_effects;
mod specifier;
mod tsconfig;
mod tsconfig_resolver;
mod walker;

pub mod ast;

#[cfg(test)]
mod tests;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

pub use crate::{
    ast::{ImportKind, ParseError, ParseOutput, Parser},
    builtins::NODEJS_BUILTINS,
    diagnostics::{Diagnostic, DiagnosticSink, Note, Severity},
    error::{JSONError, ResolveError, SpecifierError},
    file_system::{FileMetadata, FileSystem, FileSystemOs},
    graph::{Edge, EdgeTarget, ExportMember, Module, ModuleGraph, ModuleId},
    linker::{Chunk, LinkOutput},
    loader::{Loader, LoaderRegistry},
    options::{BuildOptions, Define, OutputFormat, ResolveOptions, TsconfigDiscovery},
    package_json::{
        BrowserField, ExportsField, ExportsKey, ModuleType, PackageJson, SideEffectsField,
    },
    resolver::{Namespace, Resolution, ResolverGeneric},
    side_effects::{SideEffectClass, SideEffectVerdict},
    tsconfig::{
        CompilerOptions, ExtendsField, ImportsNotUsedAsValues, JsxMode, PathsMap, ScriptTarget,
        Sourced, Tsconfig,
    },
};
use crate::{cache::Cache, dce::TreeShaker, walker::Walker};

/// Cooperative cancellation: checked at I/O boundaries and before each
/// DCE pass. A cancelled build returns no chunks.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The outcome of one build. The build is atomic: when any error was
/// diagnosed, `link.chunks` is empty.
#[derive(Debug)]
pub struct BuildOutput {
    pub graph: ModuleGraph,
    pub link: LinkOutput,
    pub diagnostics: Vec<Diagnostic>,
}

impl BuildOutput {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

/// Bundler with the current operating system as the file system
pub type Bundler = BundlerGeneric<FileSystemOs>;

/// Generic implementation of the bundler, can be configured by the
/// [FileSystem] trait.
///
/// Caches are owned by the bundler and shared by its builds; multiple
/// bundlers can run concurrently in one process without sharing any
/// state.
pub struct BundlerGeneric<Fs> {
    cache: Arc<Cache<Fs>>,
}

impl<Fs: FileSystem + Default> Default for BundlerGeneric<Fs> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Fs: FileSystem + Default> BundlerGeneric<Fs> {
    #[must_use]
    pub fn new() -> Self {
        Self { cache: Arc::new(Cache::new(Fs::default())) }
    }
}

impl<Fs: FileSystem> BundlerGeneric<Fs> {
    pub fn new_with_file_system(file_system: Fs) -> Self {
        Self { cache: Arc::new(Cache::new(file_system)) }
    }

    /// Clear the underlying cache. Required between builds when the
    /// filesystem changed; within one build every cache entry is
    /// write-once.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn build(&self, options: BuildOptions, parser: &dyn Parser) -> BuildOutput {
        self.build_cancellable(options, parser, &CancellationToken::default())
    }

    pub fn build_cancellable(
        &self,
        options: BuildOptions,
        parser: &dyn Parser,
        token: &CancellationToken,
    ) -> BuildOutput {
        let span = tracing::debug_span!("build", entries = ?options.entries);
        let _enter = span.enter();

        let sink = Arc::new(DiagnosticSink::default());
        check_config(&options, &sink);

        let resolver =
            ResolverGeneric::new(options, Arc::clone(&self.cache), Arc::clone(&sink));
        let cancelled = &token.0;

        let mut graph = Walker::new(&resolver, parser, &sink, cancelled).walk();

        if !token.is_cancelled() {
            TreeShaker::new(&mut graph, &sink, resolver.options(), cancelled).run();
        }

        let has_errors = sink.has_errors() || token.is_cancelled();
        let link = if has_errors {
            LinkOutput::default()
        } else {
            linker::link(&graph, resolver.options().format)
        };

        drop(resolver);
        let diagnostics = Arc::try_unwrap(sink)
            .map(DiagnosticSink::finish)
            .unwrap_or_default();

        BuildOutput { graph, link, diagnostics }
    }
}

fn check_config(options: &BuildOptions, sink: &DiagnosticSink) {
    for inject in &options.inject {
        if options.loaders.for_path(inject) == Loader::Copy && !options.bundle {
            sink.push_unordered(
                Diagnostic::error(
                    "Cannot inject a file with the \"copy\" loader without bundling",
                )
                .with_path(inject.clone()),
            );
        }
    }
}
