//! package.json definitions.
//!
//! Only the fields the bundler consumes are kept in semantic form; the
//! raw JSON is retained for main-field lookup by configured order.

use std::path::{Path, PathBuf};

use serde_json::Value as JSONValue;

use crate::{error::ResolveError, path::PathUtil};

pub type JSONMap = serde_json::Map<String, JSONValue>;

/// The `"type"` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleType {
    Module,
    CommonJs,
}

/// The `"sideEffects"` field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SideEffectsField {
    #[default]
    Unspecified,
    /// `"sideEffects": true`
    Always,
    /// `"sideEffects": false`
    Never,
    /// `"sideEffects": ["./src/polyfill.js", "*.css"]`: glob patterns
    /// relative to the package root.
    Globs(Vec<String>),
}

/// The `"exports"` / `"imports"` value tree.
///
/// Key order inside maps is semantic (`["require", "import", "default"]`
/// must be tried in declaration order), which is why `serde_json` runs
/// with `preserve_order`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExportsField {
    #[default]
    None,
    /// `null` target: the subpath is explicitly not exported.
    Null,
    String(String),
    Array(Vec<ExportsField>),
    Map(Vec<(ExportsKey, ExportsField)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportsKey {
    /// `"."`
    Main,
    /// A `"./…"` subpath, stored without the `./` prefix.
    Pattern(String),
    /// A condition name such as `import`, `require`, `default`, `browser`.
    Condition(String),
}

impl ExportsField {
    pub(crate) fn from_value(value: &JSONValue) -> Self {
        match value {
            JSONValue::Null => Self::Null,
            JSONValue::String(s) => Self::String(s.clone()),
            JSONValue::Array(items) => {
                Self::Array(items.iter().map(Self::from_value).collect())
            }
            JSONValue::Object(map) => Self::Map(
                map.iter()
                    .map(|(key, value)| {
                        let key = if key == "." {
                            ExportsKey::Main
                        } else if let Some(subpath) = key.strip_prefix("./") {
                            ExportsKey::Pattern(subpath.to_string())
                        } else if let Some(subpath) = key.strip_prefix('#') {
                            // `imports` maps reuse this tree; keep the
                            // hash out of the pattern.
                            ExportsKey::Pattern(subpath.to_string())
                        } else {
                            ExportsKey::Condition(key.clone())
                        };
                        (key, Self::from_value(value))
                    })
                    .collect(),
            ),
            JSONValue::Bool(_) | JSONValue::Number(_) => Self::None,
        }
    }

    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// The `"browser"` field: either a replacement for `main` or a
/// specifier/path remap table.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserField {
    Main(String),
    Map(JSONMap),
}

/// Deserialized package.json
#[derive(Debug, Default)]
pub struct PackageJson {
    /// Path to `package.json`. Contains the `package.json` filename.
    pub path: PathBuf,

    /// Realpath to `package.json`, when symlinks were resolved.
    pub realpath: PathBuf,

    /// <https://nodejs.org/api/packages.html#name>
    pub name: Option<String>,

    /// <https://nodejs.org/api/packages.html#type>
    pub module_type: Option<ModuleType>,

    /// Whether the package declares its files free of module-level side
    /// effects. Drives tree shaking (§DCE) and bare-import drops.
    pub side_effects: SideEffectsField,

    /// Extension point: a package may name the tsconfig that `extends`
    /// resolution should pick up when the package itself has no
    /// `exports` mapping for it.
    pub tsconfig: Option<String>,

    /// <https://nodejs.org/api/packages.html#exports>
    pub exports: ExportsField,

    /// <https://nodejs.org/api/packages.html#subpath-imports>
    pub imports: Option<ExportsField>,

    /// <https://github.com/defunctzombie/package-browser-field-spec>
    pub browser: Option<BrowserField>,

    raw: JSONValue,
}

impl PackageJson {
    /// # Errors
    ///
    /// * Any error that can be returned by `serde_json::from_str()`.
    pub(crate) fn parse(
        path: PathBuf,
        realpath: PathBuf,
        json: &str,
    ) -> Result<Self, serde_json::Error> {
        let raw: JSONValue = serde_json::from_str(json)?;
        let mut package_json = Self::default();

        if let Some(object) = raw.as_object() {
            package_json.name =
                object.get("name").and_then(JSONValue::as_str).map(ToString::to_string);
            package_json.module_type =
                object.get("type").and_then(JSONValue::as_str).and_then(|t| match t {
                    "module" => Some(ModuleType::Module),
                    "commonjs" => Some(ModuleType::CommonJs),
                    _ => None,
                });
            package_json.side_effects = match object.get("sideEffects") {
                None => SideEffectsField::Unspecified,
                Some(JSONValue::Bool(true)) => SideEffectsField::Always,
                Some(JSONValue::Bool(false)) => SideEffectsField::Never,
                Some(JSONValue::Array(globs)) => SideEffectsField::Globs(
                    globs
                        .iter()
                        .filter_map(JSONValue::as_str)
                        .map(ToString::to_string)
                        .collect(),
                ),
                Some(_) => SideEffectsField::Unspecified,
            };
            package_json.tsconfig =
                object.get("tsconfig").and_then(JSONValue::as_str).map(ToString::to_string);
            if let Some(exports) = object.get("exports") {
                package_json.exports = ExportsField::from_value(exports);
            }
            if let Some(imports) = object.get("imports") {
                package_json.imports = Some(ExportsField::from_value(imports));
            }
            package_json.browser = match object.get("browser") {
                Some(JSONValue::String(main)) => Some(BrowserField::Main(main.clone())),
                Some(JSONValue::Object(map)) => Some(BrowserField::Map(map.clone())),
                _ => None,
            };
        }

        package_json.path = path;
        package_json.realpath = realpath;
        package_json.raw = raw;
        Ok(package_json)
    }

    /// Directory to `package.json`
    ///
    /// # Panics
    ///
    /// * When the package.json path is misconfigured.
    pub fn directory(&self) -> &Path {
        debug_assert!(self.realpath.file_name().is_some_and(|x| x == "package.json"));
        self.realpath.parent().unwrap()
    }

    /// Entry-point candidates in the configured main-field order
    /// (`main`, `module`, `browser`, …). The `browser` field only
    /// participates in its string form.
    pub(crate) fn main_fields<'a>(
        &'a self,
        main_fields: &'a [String],
    ) -> impl Iterator<Item = &'a str> + 'a {
        main_fields
            .iter()
            .filter_map(|field| self.raw.get(field))
            .filter_map(JSONValue::as_str)
    }

    /// Resolve a request through the `browser` map.
    ///
    /// Bare keys remap specifiers; `./`-prefixed keys remap files of this
    /// package (matched against `path` relative to the package root).
    ///
    /// # Errors
    ///
    /// * Returns [ResolveError::Ignored] for `"./path": false` entries.
    pub(crate) fn resolve_browser_field(
        &self,
        path: &Path,
        request: Option<&str>,
    ) -> Result<Option<&str>, ResolveError> {
        let Some(BrowserField::Map(map)) = &self.browser else {
            return Ok(None);
        };
        if let Some(request) = request {
            if let Some(value) = map.get(request) {
                return Self::alias_value(path, value);
            }
            return Ok(None);
        }
        // Match the resolved file against `./`-style keys.
        for (key, value) in map {
            let Some(relative_key) = key.strip_prefix("./") else { continue };
            let target = self.directory().normalize_with(relative_key);
            if target == path {
                return Self::alias_value(path, value);
            }
        }
        Ok(None)
    }

    fn alias_value<'a>(key: &Path, value: &'a JSONValue) -> Result<Option<&'a str>, ResolveError> {
        match value {
            JSONValue::String(value) => Ok(Some(value.as_str())),
            JSONValue::Bool(false) => Err(ResolveError::Ignored(key.to_path_buf())),
            _ => Ok(None),
        }
    }
}
