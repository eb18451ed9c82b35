//! Build and resolution options.
//!
//! These mirror the host-facing CLI surface; the core itself has no
//! argument parser.

use std::path::PathBuf;

use rustc_hash::FxHashMap;

use crate::loader::LoaderRegistry;

/// Output module format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Esm,
    CommonJs,
    Iife,
}

/// How a tsconfig is found for a source file.
#[derive(Debug, Clone, Default)]
pub enum TsconfigDiscovery {
    /// Walk up from the source file to the nearest `tsconfig.json` /
    /// `jsconfig.json`, never crossing a `node_modules` boundary.
    #[default]
    Auto,
    /// `--tsconfig=PATH`: one explicit config for the whole build.
    Manual(PathBuf),
    Disabled,
}

/// A `--define=key=value` substitution.
///
/// The substitution itself happens in the parser; the core only needs to
/// know that a define exists and whether calls to it can be dropped when
/// the result is unused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub replacement: String,
    pub call_can_be_unwrapped_if_unused: bool,
}

/// Module resolution options.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Fields of `package.json` tried for a package's entry point, in
    /// order.
    ///
    /// Default `["module", "main"]`.
    pub main_fields: Vec<String>,

    /// Extra condition names for `exports` / `imports` resolution, on
    /// top of `default` and the import-kind condition.
    ///
    /// Default `[]`.
    pub condition_names: Vec<String>,

    /// Implicit extensions tried for extension-less specifiers, in
    /// order. All extensions carry a leading dot.
    ///
    /// Default `[".tsx", ".ts", ".jsx", ".js", ".css", ".json"]`.
    pub extensions: Vec<String>,

    /// Tsconfig discovery mode.
    pub tsconfig: TsconfigDiscovery,

    /// Treat Node builtin modules (`fs`, `node:path`, …) as external
    /// instead of resolution failures.
    ///
    /// Default `true`.
    pub builtin_modules: bool,

    /// Resolve symlinked files to their real path.
    ///
    /// Default `true`.
    pub symlinks: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            main_fields: vec!["module".into(), "main".into()],
            condition_names: vec![],
            extensions: vec![
                ".tsx".into(),
                ".ts".into(),
                ".jsx".into(),
                ".js".into(),
                ".css".into(),
                ".json".into(),
            ],
            tsconfig: TsconfigDiscovery::Auto,
            builtin_modules: true,
            symlinks: true,
        }
    }
}

/// Options for one build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Entry points; must be absolute paths.
    pub entries: Vec<PathBuf>,

    /// Bundle the graph into chunks; when false, each entry passes
    /// through alone (format conversion only).
    pub bundle: bool,

    pub format: OutputFormat,

    /// Enable the DCE engine's rewrite phase (inlining, folding) beyond
    /// plain reachability.
    pub minify_syntax: bool,

    /// `None` means the default: on when bundling, off otherwise.
    pub tree_shaking: Option<bool>,

    /// Disable `@__PURE__`, `@__NO_SIDE_EFFECTS__` and `sideEffects`
    /// processing, all three together.
    pub ignore_annotations: bool,

    pub define: FxHashMap<String, Define>,

    /// Files whose exports are prepended as imports to every entry.
    /// Incompatible with the `copy` loader unless bundling.
    pub inject: Vec<PathBuf>,

    pub loaders: LoaderRegistry,

    pub resolve: ResolveOptions,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            bundle: true,
            format: OutputFormat::default(),
            minify_syntax: false,
            tree_shaking: None,
            ignore_annotations: false,
            define: FxHashMap::default(),
            inject: Vec::new(),
            loaders: LoaderRegistry::default(),
            resolve: ResolveOptions::default(),
        }
    }
}

impl BuildOptions {
    /// Effective tree-shaking flag: defaults to on when bundling.
    #[must_use]
    pub fn tree_shaking_enabled(&self) -> bool {
        self.tree_shaking.unwrap_or(self.bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_shaking_defaults() {
        let bundling = BuildOptions::default();
        assert!(bundling.tree_shaking_enabled());

        let passthrough = BuildOptions { bundle: false, ..BuildOptions::default() };
        assert!(!passthrough.tree_shaking_enabled());

        let forced =
            BuildOptions { bundle: false, tree_shaking: Some(true), ..BuildOptions::default() };
        assert!(forced.tree_shaking_enabled());
    }
}
