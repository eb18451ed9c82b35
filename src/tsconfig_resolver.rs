//! Tsconfig discovery and `extends` chain resolution.
//!
//! Discovery walks from a source file's directory upward to the nearest
//! `tsconfig.json` or `jsconfig.json`, never crossing a `node_modules`
//! boundary; configs inside `node_modules` never govern user code.
//!
//! `extends` entries resolve relative to the containing config, or as
//! package-relative paths through `node_modules`. Cycles and unresolvable
//! targets are warnings, not errors: the offending step is skipped and
//! the build proceeds on the acyclic prefix of options.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    ast::ImportKind,
    cache::CachedPath,
    diagnostics::Diagnostic,
    error::ResolveError,
    file_system::FileSystem,
    package_json::ExportsField,
    path::PathUtil,
    resolver::ResolverGeneric,
    tsconfig::Tsconfig,
};

/// Chain of configs currently being extended, for cycle detection.
#[derive(Default)]
pub(crate) struct ExtendsContext {
    visited: Vec<PathBuf>,
}

impl ExtendsContext {
    fn with_file<R, T: FnOnce(&mut Self) -> R>(&mut self, path: PathBuf, cb: T) -> R {
        self.visited.push(path);
        let result = cb(self);
        self.visited.pop();
        result
    }

    fn is_cycle(&self, path: &Path) -> bool {
        self.visited.iter().any(|config| config == path)
    }
}

impl<Fs: FileSystem> ResolverGeneric<Fs> {
    /// Find the tsconfig governing files in `dir` by walking upward.
    /// Memoized per directory.
    pub(crate) fn discover_tsconfig(
        &self,
        dir: &CachedPath,
    ) -> Result<Option<Arc<Tsconfig>>, ResolveError> {
        let mut current = Some(dir.clone());
        while let Some(cv) = current {
            if cv.path().file_name().is_some_and(|name| name == "node_modules") {
                return Ok(None);
            }
            if let Some(tsconfig) = cv
                .discovered_tsconfig
                .get_or_try_init(|| {
                    for file_name in ["tsconfig.json", "jsconfig.json"] {
                        let candidate = cv.path().join(file_name);
                        let candidate = self.cache().value(&candidate);
                        if candidate.is_file(&self.cache().fs) {
                            return self.load_extended_tsconfig(candidate.path()).map(Some);
                        }
                    }
                    Ok(None)
                })?
                .as_ref()
            {
                return Ok(Some(Arc::clone(tsconfig)));
            }
            current = cv.parent().cloned();
        }
        Ok(None)
    }

    /// Load `path` as a tsconfig with its whole `extends` chain flattened
    /// in.
    ///
    /// # Errors
    ///
    /// * [ResolveError::TsconfigNotFound] when `path` itself is missing
    ///   (missing *extends targets* are warnings instead).
    /// * [ResolveError::Json]
    pub(crate) fn load_extended_tsconfig(
        &self,
        path: &Path,
    ) -> Result<Arc<Tsconfig>, ResolveError> {
        let mut ctx = ExtendsContext::default();
        self.load_tsconfig(true, path, &mut ctx)
    }

    fn load_tsconfig(
        &self,
        root: bool,
        path: &Path,
        ctx: &mut ExtendsContext,
    ) -> Result<Arc<Tsconfig>, ResolveError> {
        let path = self.canonical_tsconfig_file(path);
        self.cache().tsconfig(root, &path, self.sink(), |tsconfig| {
            tracing::trace!(tsconfig = ?tsconfig.path(), "load_tsconfig");
            let entries = tsconfig.extends_entries();
            if entries.is_empty() {
                return Ok(());
            }

            let directory = tsconfig.directory().to_path_buf();
            let mut base_paths = Vec::with_capacity(entries.len());
            for entry in &entries {
                match self.extends_target(&directory, entry) {
                    Ok(Some(base_path)) => base_paths.push(base_path),
                    Ok(None) => {}
                    Err(_) => {
                        self.sink().push_unordered(
                            Diagnostic::warning(format!(
                                "Cannot find base config file \"{entry}\""
                            ))
                            .with_path(tsconfig.path()),
                        );
                    }
                }
            }

            ctx.with_file(tsconfig.path().to_path_buf(), |ctx| {
                // Later entries override earlier ones, and the deriving
                // config overrides them all; since `extend_with` only
                // fills unset options, bases apply in reverse order.
                for base_path in base_paths.iter().rev() {
                    let base_file = self.canonical_tsconfig_file(base_path);
                    if ctx.is_cycle(&base_file) {
                        self.sink().push_unordered(
                            Diagnostic::warning(format!(
                                "Base config file {} forms a cycle",
                                base_file.display()
                            ))
                            .with_path(tsconfig.path()),
                        );
                        continue;
                    }
                    match self.load_tsconfig(false, &base_file, ctx) {
                        Ok(base) => tsconfig.extend_with(&base),
                        Err(ResolveError::TsconfigNotFound(_)) => {
                            self.sink().push_unordered(
                                Diagnostic::warning(format!(
                                    "Cannot find base config file {}",
                                    base_file.display()
                                ))
                                .with_path(tsconfig.path()),
                            );
                        }
                        Err(err) => return Err(err),
                    }
                }
                Ok(())
            })
        })
    }

    /// The actual file a tsconfig path denotes: the file itself, the
    /// `tsconfig.json` of a directory, or the path with `.json`
    /// appended. Performed eagerly so cycle detection compares real
    /// files.
    fn canonical_tsconfig_file(&self, path: &Path) -> PathBuf {
        let cached = self.cache().value(path);
        if cached.is_file(&self.cache().fs) {
            return path.to_path_buf();
        }
        if cached.is_dir(&self.cache().fs) {
            return path.join("tsconfig.json");
        }
        crate::path::append_extension(path, ".json")
    }

    /// Resolve one `extends` entry against the config's directory.
    ///
    /// Returns `Ok(None)` for entries rejected with their own warning
    /// (trailing-slash forms); `Err` means "not found", which the caller
    /// downgrades to a warning.
    fn extends_target(
        &self,
        directory: &Path,
        specifier: &str,
    ) -> Result<Option<PathBuf>, ResolveError> {
        match specifier.as_bytes().first() {
            None => Err(ResolveError::TsconfigNotFound(PathBuf::from(specifier))),
            Some(b'/') => Ok(Some(PathBuf::from(specifier))),
            Some(b'.') => {
                // `.` and `..` mean the tsconfig in that directory;
                // trailing-slash forms are rejected.
                if specifier.ends_with('/') || specifier.ends_with('\\') {
                    self.sink().push_unordered(Diagnostic::warning(format!(
                        "\"extends\" entry \"{specifier}\" must not end with a slash"
                    )));
                    return Ok(None);
                }
                Ok(Some(directory.normalize_with(specifier)))
            }
            Some(c) if c.is_ascii_alphabetic() && specifier.as_bytes().get(1) == Some(&b':') => {
                Ok(Some(PathBuf::from(specifier)))
            }
            _ => self.extends_package_target(directory, specifier).map(Some),
        }
    }

    /// Package-relative `extends`: `"extends": "@tsconfig/node18/tsconfig.json"`.
    fn extends_package_target(
        &self,
        directory: &Path,
        specifier: &str,
    ) -> Result<PathBuf, ResolveError> {
        let (package_name, subpath) = split_package_specifier(specifier);
        let mut dir = Some(self.cache().value(directory));
        while let Some(current) = dir {
            dir = current.parent().cloned();
            let Some(node_modules) = current.cached_node_modules(self.cache()) else {
                continue;
            };
            let package_dir = node_modules.path().normalize_with(package_name);
            let package_dir = self.cache().value(&package_dir);
            if !package_dir.is_dir(&self.cache().fs) {
                continue;
            }
            let package_json = package_dir.package_json(&self.cache().fs)?;
            if let Some(package_json) = &package_json {
                // `exports` governs when present; `require` wins over
                // `import` in this context.
                if !package_json.exports.is_none() {
                    if let Some(path) = self.resolve_extends_export(
                        package_dir.path(),
                        subpath,
                        &package_json.exports,
                    )? {
                        return Ok(path);
                    }
                    return Err(ResolveError::TsconfigNotFound(PathBuf::from(specifier)));
                }
                // A `tsconfig` field names the file for bare extends.
                if subpath.is_empty() {
                    if let Some(tsconfig_field) = &package_json.tsconfig {
                        return Ok(package_dir.path().normalize_with(tsconfig_field));
                    }
                }
            }
            // Literal, literal + ".json", directory/tsconfig.json: the
            // canonical-file probe performs exactly these steps.
            let literal = if subpath.is_empty() {
                package_dir.to_path_buf()
            } else {
                package_dir.path().normalize_with(&subpath[1..])
            };
            let probed = self.canonical_tsconfig_file(&literal);
            if self.cache().value(&probed).is_file(&self.cache().fs) {
                return Ok(probed);
            }
            return Err(ResolveError::TsconfigNotFound(PathBuf::from(specifier)));
        }
        Err(ResolveError::TsconfigNotFound(PathBuf::from(specifier)))
    }

    fn resolve_extends_export(
        &self,
        package_dir: &Path,
        subpath: &str,
        exports: &ExportsField,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let subpath = subpath.strip_prefix('/').unwrap_or(subpath);
        let resolved = self.package_exports_resolve_for_extends(
            package_dir,
            subpath,
            exports,
            ImportKind::CommonJsRequire,
        )?;
        Ok(resolved)
    }
}

// Returns (package_name, subpath) where subpath is "" or begins with '/'.
fn split_package_specifier(specifier: &str) -> (&str, &str) {
    let mut separator_index = specifier.find('/');
    if specifier.starts_with('@') {
        if let Some(index) = separator_index {
            separator_index = specifier[index + 1..].find('/').map(|i| i + index + 1);
        }
    }
    match separator_index {
        Some(index) => (&specifier[..index], &specifier[index..]),
        None => (specifier, ""),
    }
}
