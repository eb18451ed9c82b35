//! tsconfig.json: parsing, the `extends` merge policy, and `paths`
//! candidate generation.
//!
//! The `extends` *chain resolution* (package lookups, cycle detection)
//! lives in `tsconfig_resolver`; this module owns the data model. Every
//! effective option remembers the tsconfig file that set it, so
//! diagnostics can point back at configuration.

use std::{
    hash::BuildHasherDefault,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use rustc_hash::FxHasher;
use serde::Deserialize;

use crate::{
    diagnostics::Diagnostic,
    path::PathUtil,
};

pub type PathsMap = IndexMap<String, Vec<String>, BuildHasherDefault<FxHasher>>;

/// An option value plus the tsconfig file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sourced<T> {
    pub value: T,
    pub defined_in: PathBuf,
}

impl<T> Sourced<T> {
    fn new(value: T, defined_in: &Path) -> Self {
        Self { value, defined_in: defined_in.to_path_buf() }
    }
}

/// Value for the "extends" field.
///
/// <https://www.typescriptlang.org/tsconfig/#extends>
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(untagged)]
pub enum ExtendsField {
    Single(String),
    Multiple(Vec<String>),
}

/// <https://www.typescriptlang.org/tsconfig/#jsx>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsxMode {
    /// `"react"`: `React.createElement` calls.
    Classic,
    /// `"react-jsx"`: the automatic runtime.
    Automatic,
    /// `"react-jsxdev"`: the automatic runtime, dev helpers.
    AutomaticDev,
    /// `"preserve"` / `"react-native"`: JSX reaches the printer as-is.
    Preserve,
}

/// <https://www.typescriptlang.org/tsconfig/#importsNotUsedAsValues>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportsNotUsedAsValues {
    Remove,
    Preserve,
    Error,
}

/// ECMAScript language level for `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptTarget {
    Es(u16),
    EsNext,
    /// Kept verbatim; treated as unset, with a warning.
    Unrecognized(String),
}

impl ScriptTarget {
    fn parse(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        match lower.as_str() {
            "esnext" => return Self::EsNext,
            "es3" => return Self::Es(3),
            "es5" => return Self::Es(5),
            "es6" => return Self::Es(2015),
            _ => {}
        }
        if let Some(year) = lower.strip_prefix("es").and_then(|y| y.parse::<u16>().ok()) {
            if (2015..=2099).contains(&year) {
                return Self::Es(year);
            }
        }
        Self::Unrecognized(raw.to_string())
    }

    /// Whether class fields default to `define` semantics: ES2022 and
    /// newer, and `esnext` explicitly. Mirrors the TypeScript compiler's
    /// rule rather than the intuitive reading.
    pub fn implies_define_for_class_fields(&self) -> bool {
        match self {
            Self::EsNext => true,
            Self::Es(year) => *year >= 2022,
            Self::Unrecognized(_) => false,
        }
    }
}

/// Compiler options after semantic projection, each carrying its origin.
///
/// <https://www.typescriptlang.org/tsconfig#compilerOptions>
#[derive(Debug, Default)]
pub struct CompilerOptions {
    pub base_url: Option<Sourced<PathBuf>>,

    /// Path aliases, in declaration order.
    pub paths: Option<Sourced<PathsMap>>,

    /// Directory of the tsconfig that declared `paths`. Relative
    /// replacements resolve against this, not against the config that
    /// declared `baseUrl`.
    pub(crate) paths_base: PathBuf,

    pub jsx: Option<Sourced<JsxMode>>,
    pub jsx_factory: Option<Sourced<String>>,
    pub jsx_fragment_factory: Option<Sourced<String>>,
    pub jsx_import_source: Option<Sourced<String>>,

    pub target: Option<Sourced<ScriptTarget>>,

    pub strict: Option<Sourced<bool>>,
    pub always_strict: Option<Sourced<bool>>,

    pub use_define_for_class_fields: Option<Sourced<bool>>,
    pub experimental_decorators: Option<Sourced<bool>>,

    pub imports_not_used_as_values: Option<Sourced<ImportsNotUsedAsValues>>,
    pub preserve_value_imports: Option<Sourced<bool>>,
    pub verbatim_module_syntax: Option<Sourced<bool>>,
}

impl CompilerOptions {
    /// Effective strictness for directive handling: `alwaysStrict`, or
    /// `strict` when `alwaysStrict` is unset.
    pub fn always_strict_effective(&self) -> bool {
        self.always_strict
            .as_ref()
            .or(self.strict.as_ref())
            .is_some_and(|option| option.value)
    }

    /// Effective `useDefineForClassFields`, applying the target-derived
    /// default when unset.
    pub fn use_define_for_class_fields_effective(&self) -> bool {
        if let Some(option) = &self.use_define_for_class_fields {
            return option.value;
        }
        self.target
            .as_ref()
            .is_some_and(|target| target.value.implies_define_for_class_fields())
    }
}

/// A tsconfig with its `extends` chain already flattened in.
#[derive(Debug, Default)]
pub struct Tsconfig {
    /// Whether this is the config discovery selected (as opposed to a
    /// base reached through `extends`).
    pub(crate) root: bool,

    /// Path to the file, filename included.
    path: PathBuf,

    pub extends: Option<ExtendsField>,

    pub compiler_options: CompilerOptions,

    /// Parse-time warnings, drained into the build sink by the engine.
    pub(crate) warnings: Vec<Diagnostic>,
}

/// Top-level keys that are actually compiler options; their appearance
/// at the top level gets a warning instead of silent loss.
const COMPILER_OPTION_KEYS: &[&str] = &[
    "alwaysStrict",
    "baseUrl",
    "experimentalDecorators",
    "importsNotUsedAsValues",
    "jsx",
    "jsxFactory",
    "jsxFragmentFactory",
    "jsxImportSource",
    "paths",
    "preserveValueImports",
    "strict",
    "target",
    "useDefineForClassFields",
    "verbatimModuleSyntax",
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TsconfigSerde {
    #[serde(default)]
    extends: Option<ExtendsField>,
    #[serde(default)]
    compiler_options: CompilerOptionsSerde,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompilerOptionsSerde {
    base_url: Option<PathBuf>,
    paths: Option<PathsMap>,
    jsx: Option<String>,
    jsx_factory: Option<String>,
    jsx_fragment_factory: Option<String>,
    jsx_import_source: Option<String>,
    target: Option<String>,
    strict: Option<bool>,
    always_strict: Option<bool>,
    use_define_for_class_fields: Option<bool>,
    experimental_decorators: Option<bool>,
    imports_not_used_as_values: Option<String>,
    preserve_value_imports: Option<bool>,
    verbatim_module_syntax: Option<bool>,
}

impl Tsconfig {
    /// Parses a tsconfig from JSONC text. Comments and trailing commas
    /// are accepted; an all-whitespace file is an empty config.
    ///
    /// # Errors
    ///
    /// * Any error that can be returned by `serde_json::from_str()`.
    pub fn parse(root: bool, path: &Path, json: &str) -> Result<Self, serde_json::Error> {
        let mut json = json.trim_start_matches('\u{feff}').to_string().into_bytes();
        _ = json_strip_comments::strip_slice(&mut json);

        let serde: TsconfigSerde = if json.iter().all(u8::is_ascii_whitespace) {
            TsconfigSerde::default()
        } else {
            serde_json::from_slice(&json)?
        };

        let mut tsconfig = Self {
            root,
            path: path.to_path_buf(),
            extends: serde.extends,
            compiler_options: CompilerOptions::default(),
            warnings: Vec::new(),
        };

        for key in serde.rest.keys() {
            if COMPILER_OPTION_KEYS.contains(&key.as_str()) {
                tsconfig.warnings.push(
                    Diagnostic::warning(format!(
                        "\"{key}\" must be nested inside \"compilerOptions\" to take effect"
                    ))
                    .with_path(path),
                );
            }
        }

        tsconfig.apply_serde(serde.compiler_options);
        Ok(tsconfig)
    }

    fn apply_serde(&mut self, serde: CompilerOptionsSerde) {
        let path = self.path.clone();
        let directory = path.parent().expect("tsconfig path has a file name").to_path_buf();
        let options = &mut self.compiler_options;
        if let Some(base_url) = serde.base_url {
            let absolute = directory.normalize_with(&base_url);
            options.base_url = Some(Sourced::new(absolute, &path));
        }
        if let Some(paths) = serde.paths {
            options.paths = Some(Sourced::new(paths, &path));
            options.paths_base = directory.clone();
        }
        if let Some(jsx) = serde.jsx {
            let mode = match jsx.as_str() {
                "react" => Some(JsxMode::Classic),
                "react-jsx" => Some(JsxMode::Automatic),
                "react-jsxdev" => Some(JsxMode::AutomaticDev),
                "preserve" | "react-native" => Some(JsxMode::Preserve),
                _ => None,
            };
            if let Some(mode) = mode {
                options.jsx = Some(Sourced::new(mode, &path));
            }
        }
        if let Some(factory) = serde.jsx_factory {
            options.jsx_factory = Some(Sourced::new(factory, &path));
        }
        if let Some(fragment) = serde.jsx_fragment_factory {
            options.jsx_fragment_factory = Some(Sourced::new(fragment, &path));
        }
        if let Some(source) = serde.jsx_import_source {
            options.jsx_import_source = Some(Sourced::new(source, &path));
        }
        let mut warnings = Vec::new();
        if let Some(raw) = serde.target {
            let target = ScriptTarget::parse(&raw);
            if let ScriptTarget::Unrecognized(raw) = &target {
                warnings.push(
                    Diagnostic::warning(format!("Unrecognized target environment \"{raw}\""))
                        .with_path(&path),
                );
            }
            options.target = Some(Sourced::new(target, &path));
        }
        if let Some(strict) = serde.strict {
            options.strict = Some(Sourced::new(strict, &path));
        }
        if let Some(always_strict) = serde.always_strict {
            options.always_strict = Some(Sourced::new(always_strict, &path));
        }
        if let Some(value) = serde.use_define_for_class_fields {
            options.use_define_for_class_fields = Some(Sourced::new(value, &path));
        }
        if let Some(value) = serde.experimental_decorators {
            options.experimental_decorators = Some(Sourced::new(value, &path));
        }
        if let Some(raw) = serde.imports_not_used_as_values {
            let value = match raw.as_str() {
                "preserve" => Some(ImportsNotUsedAsValues::Preserve),
                "error" => Some(ImportsNotUsedAsValues::Error),
                "remove" => Some(ImportsNotUsedAsValues::Remove),
                _ => None,
            };
            if let Some(value) = value {
                options.imports_not_used_as_values = Some(Sourced::new(value, &path));
            }
        }
        if let Some(value) = serde.preserve_value_imports {
            options.preserve_value_imports = Some(Sourced::new(value, &path));
        }
        if let Some(value) = serde.verbatim_module_syntax {
            options.verbatim_module_syntax = Some(Sourced::new(value, &path));
        }
        self.warnings.append(&mut warnings);
    }

    /// Returns the path where the tsconfig was found, filename included.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the tsconfig.
    ///
    /// # Panics
    ///
    /// * When the tsconfig path is misconfigured.
    #[must_use]
    pub fn directory(&self) -> &Path {
        debug_assert!(self.path.file_name().is_some());
        self.path.parent().unwrap()
    }

    /// The `extends` entries in declaration order.
    pub(crate) fn extends_entries(&self) -> Vec<String> {
        match &self.extends {
            Some(ExtendsField::Single(specifier)) => vec![specifier.clone()],
            Some(ExtendsField::Multiple(specifiers)) => specifiers.clone(),
            None => Vec::new(),
        }
    }

    /// Inherit settings from a base config.
    ///
    /// The deriving config wins every conflict, so the engine applies
    /// bases in *reverse* declaration order: with `"extends": [a, b]`,
    /// `b`'s options land first and `a` only fills what remains; later
    /// entries override earlier ones, and the deriving file overrides
    /// both.
    pub(crate) fn extend_with(&mut self, base: &Self) {
        let options = &mut self.compiler_options;
        let base_options = &base.compiler_options;

        if options.base_url.is_none() {
            options.base_url.clone_from(&base_options.base_url);
        }
        if options.paths.is_none() {
            options.paths.clone_from(&base_options.paths);
            if options.paths.is_some() {
                // Inherited paths stay relative to the config that
                // declared them.
                options.paths_base.clone_from(&base_options.paths_base);
            }
        }

        macro_rules! inherit {
            ($field:ident) => {
                if options.$field.is_none() {
                    options.$field.clone_from(&base_options.$field);
                }
            };
        }
        inherit!(jsx);
        inherit!(jsx_factory);
        inherit!(jsx_fragment_factory);
        inherit!(jsx_import_source);
        inherit!(target);
        inherit!(strict);
        inherit!(always_strict);
        inherit!(use_define_for_class_fields);
        inherit!(experimental_decorators);
        inherit!(imports_not_used_as_values);
        inherit!(preserve_value_imports);
        inherit!(verbatim_module_syntax);
    }

    /// Final validation once the chain is flattened: `paths`
    /// replacements that are neither relative nor absolute require
    /// `baseUrl`; offending replacements warn and drop.
    pub(crate) fn validate(&mut self) {
        if self.compiler_options.base_url.is_some() {
            return;
        }
        let Some(paths) = &mut self.compiler_options.paths else { return };
        let defined_in = paths.defined_in.clone();
        let mut warnings = Vec::new();
        for (pattern, replacements) in &mut paths.value {
            replacements.retain(|replacement| {
                let ok = is_relative_or_absolute(replacement);
                if !ok {
                    warnings.push(
                        Diagnostic::warning(format!(
                            "Non-relative path \"{replacement}\" for pattern \"{pattern}\" is not allowed when \"baseUrl\" is not set (did you forget a leading \"./\"?)"
                        ))
                        .with_path(&defined_in),
                    );
                }
                ok
            });
        }
        self.warnings.append(&mut warnings);
    }

    /// Candidate filesystem paths for a bare specifier through `paths`.
    ///
    /// Ordering implements the tie-break: exact-key matches first, then
    /// single-`*` keys by longest literal prefix, declaration order
    /// breaking ties. Within a key, replacements keep declaration order.
    /// The caller performs the filesystem lookups; the first candidate
    /// that exists wins.
    #[must_use]
    pub fn paths_candidates(&self, specifier: &str) -> Vec<PathBuf> {
        let options = &self.compiler_options;
        let Some(paths) = &options.paths else { return Vec::new() };

        struct Match<'a> {
            prefix_len: usize,
            declaration_index: usize,
            replacements: &'a [String],
            captured: &'a str,
        }

        let mut matches = Vec::new();
        for (declaration_index, (pattern, replacements)) in paths.value.iter().enumerate() {
            if pattern == specifier {
                matches.push(Match {
                    prefix_len: usize::MAX,
                    declaration_index,
                    replacements,
                    captured: "",
                });
            } else if let Some((prefix, suffix)) = crate::glob::single_star_split(pattern) {
                if specifier.len() >= prefix.len() + suffix.len()
                    && specifier.starts_with(prefix)
                    && specifier.ends_with(suffix)
                {
                    matches.push(Match {
                        prefix_len: prefix.len(),
                        declaration_index,
                        replacements,
                        captured: &specifier[prefix.len()..specifier.len() - suffix.len()],
                    });
                }
            }
        }
        matches.sort_by(|a, b| {
            b.prefix_len.cmp(&a.prefix_len).then(a.declaration_index.cmp(&b.declaration_index))
        });

        let mut candidates = Vec::new();
        for matched in matches {
            for replacement in matched.replacements {
                let substituted = replacement.replace('*', matched.captured);
                let path = if is_relative_or_absolute(&substituted) {
                    if Path::new(&substituted).is_absolute() {
                        PathBuf::from(&substituted)
                    } else {
                        self.compiler_options.paths_base.normalize_with(&substituted)
                    }
                } else if let Some(base_url) = &options.base_url {
                    base_url.value.normalize_with(&substituted)
                } else {
                    // Dropped by validate(); skip defensively-kept forms.
                    continue;
                };
                candidates.push(path);
            }
        }
        candidates
    }

    /// The `baseUrl`-rooted candidate for a bare specifier, when
    /// `baseUrl` is set.
    #[must_use]
    pub fn base_url_candidate(&self, specifier: &str) -> Option<PathBuf> {
        let base_url = self.compiler_options.base_url.as_ref()?;
        Some(base_url.value.normalize_with(specifier))
    }
}

fn is_relative_or_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    match bytes.first() {
        Some(b'.') => {
            matches!(bytes.get(1), Some(b'/') | None)
                || (bytes.get(1) == Some(&b'.') && matches!(bytes.get(2), Some(b'/') | None))
        }
        Some(b'/') | Some(b'\\') => true,
        Some(c) if c.is_ascii_alphabetic() => bytes.get(1) == Some(&b':'),
        _ => false,
    }
}
