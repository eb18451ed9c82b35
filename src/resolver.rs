//! Module resolution.
//!
//! Maps a specifier string written in a source file to a concrete file
//! path, a loader, and the `sideEffects` verdict for that file.
//!
//! The algorithm follows Node.js resolution ([CommonJS] and [ESM]),
//! augmented with tsconfig `paths`/`baseUrl`, the `browser` field, and
//! TypeScript-aware extension probing.
//!
//! [CommonJS]: https://nodejs.org/api/modules.html#all-together
//! [ESM]: https://nodejs.org/api/esm.html#resolution-algorithm-specification

use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    ast::ImportKind,
    builtins::is_builtin_module,
    cache::{Cache, CachedPath},
    data_url::DataUrl,
    diagnostics::DiagnosticSink,
    error::ResolveError,
    file_system::FileSystem,
    loader::Loader,
    options::{BuildOptions, TsconfigDiscovery},
    package_json::{ExportsField, ExportsKey, PackageJson},
    path::PathUtil,
    side_effects::{self, SideEffectVerdict},
    specifier::{Specifier, SpecifierKind},
    tsconfig::Tsconfig,
};

/// Which filesystem-like space a resolved module lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    File,
    DataUrl,
}

/// The outcome of resolving one specifier.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Absolute normalized path; for data URLs, the URL itself.
    pub path: PathBuf,
    pub namespace: Namespace,
    pub loader: Loader,
    pub side_effects: SideEffectVerdict,
    /// Nearest enclosing manifest of the resolved file.
    pub package_json: Option<Arc<PackageJson>>,
    /// Decoded contents for data URL modules.
    pub data: Option<Vec<u8>>,
    /// Specifier is external (Node builtin); emit the import untouched.
    pub external: bool,
}

impl Resolution {
    fn external(specifier: &str) -> Self {
        Self {
            path: PathBuf::from(specifier),
            namespace: Namespace::File,
            loader: Loader::Empty,
            side_effects: SideEffectVerdict::unknown(),
            package_json: None,
            data: None,
            external: true,
        }
    }
}

type ResolveResult = Result<Option<CachedPath>, ResolveError>;

/// Per-call state: recursion guard and alias loop detection.
#[derive(Debug, Default)]
struct Ctx {
    depth: u8,
    resolving_alias: Option<String>,
}

impl Ctx {
    fn test_for_infinite_recursion(&mut self) -> Result<(), ResolveError> {
        self.depth += 1;
        // 64 should be more than enough for detecting infinite recursion.
        if self.depth > 64 {
            return Err(ResolveError::Recursion);
        }
        Ok(())
    }
}

pub struct ResolverGeneric<Fs> {
    options: BuildOptions,
    cache: Arc<Cache<Fs>>,
    sink: Arc<DiagnosticSink>,
}

impl<Fs: FileSystem> ResolverGeneric<Fs> {
    pub fn new(options: BuildOptions, cache: Arc<Cache<Fs>>, sink: Arc<DiagnosticSink>) -> Self {
        Self { options, cache, sink }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Resolve `specifier` as imported from the file `importer`.
    ///
    /// # Errors
    ///
    /// * See [ResolveError]
    pub fn resolve(
        &self,
        importer: &Path,
        specifier: &str,
        kind: ImportKind,
    ) -> Result<Resolution, ResolveError> {
        let span = tracing::debug_span!("resolve", importer = ?importer, specifier = specifier);
        let _enter = span.enter();
        let r = self.resolve_impl(importer, specifier, kind);
        match &r {
            Ok(r) => tracing::debug!(specifier = specifier, ret = ?r.path),
            Err(err) => tracing::debug!(specifier = specifier, err = ?err),
        }
        r
    }

    fn resolve_impl(
        &self,
        importer: &Path,
        specifier: &str,
        kind: ImportKind,
    ) -> Result<Resolution, ResolveError> {
        let parsed = Specifier::parse(specifier).map_err(ResolveError::Specifier)?;

        if parsed.kind == SpecifierKind::DataUrl {
            let data_url = DataUrl::parse(specifier)?;
            return Ok(Resolution {
                path: PathBuf::from(specifier),
                namespace: Namespace::DataUrl,
                loader: data_url.loader,
                side_effects: SideEffectVerdict::unknown(),
                package_json: None,
                data: Some(data_url.contents),
                external: false,
            });
        }

        if parsed.kind == SpecifierKind::Bare
            && self.options.resolve.builtin_modules
            && is_builtin_module(parsed.path())
        {
            return Ok(Resolution::external(specifier));
        }

        let importer_dir = importer.parent().unwrap_or(importer);
        let importer_dir = self.cache.value(importer_dir);
        let importer_loader = self.options.loaders.for_path(importer);
        let tsconfig = self.tsconfig_for(&importer_dir)?;

        let mut ctx = Ctx::default();
        let cached_path = self.require(
            &importer_dir,
            parsed.path(),
            parsed.kind,
            kind,
            importer_loader,
            tsconfig.as_deref(),
            &mut ctx,
        );
        let cached_path = match cached_path {
            Ok(path) => path,
            Err(ResolveError::NotFound(_)) if parsed.kind == SpecifierKind::Bare => {
                // A leading `./` might have been forgotten; check so the
                // diagnostic can say so.
                let relative = format!("./{}", parsed.path());
                if self
                    .require_relative(&importer_dir, &relative, importer_loader, &mut Ctx::default())
                    .is_ok()
                {
                    return Err(ResolveError::NotFoundRelativeHint(
                        specifier.to_string(),
                        relative,
                    ));
                }
                return Err(ResolveError::NotFound(specifier.to_string()));
            }
            Err(err) => return Err(err),
        };

        let path = if self.options.resolve.symlinks {
            cached_path.realpath(&self.cache.fs)?
        } else {
            cached_path.to_path_buf()
        };

        let final_path = self.cache.value(&path);
        let package_json = final_path.find_package_json(&self.cache.fs)?;
        let side_effects = if self.options.ignore_annotations {
            SideEffectVerdict::unknown()
        } else {
            side_effects::classify(package_json.as_deref(), &path)
        };

        Ok(Resolution {
            loader: self.options.loaders.for_path(&path),
            path,
            namespace: Namespace::File,
            side_effects,
            package_json,
            data: None,
            external: false,
        })
    }

    /// require(X) from module at path Y.
    #[allow(clippy::too_many_arguments)]
    fn require(
        &self,
        importer_dir: &CachedPath,
        specifier: &str,
        specifier_kind: SpecifierKind,
        import_kind: ImportKind,
        importer_loader: Loader,
        tsconfig: Option<&Tsconfig>,
        ctx: &mut Ctx,
    ) -> Result<CachedPath, ResolveError> {
        ctx.test_for_infinite_recursion()?;
        match specifier_kind {
            SpecifierKind::Absolute => {
                let path = self.cache.value(Path::new(specifier));
                self.load_as_file_or_directory(&path, importer_loader, ctx)?
                    .ok_or_else(|| ResolveError::NotFound(specifier.to_string()))
            }
            SpecifierKind::Relative => {
                self.require_relative(importer_dir, specifier, importer_loader, ctx)
            }
            SpecifierKind::PackageInternal => {
                self.require_package_internal(importer_dir, specifier, import_kind, ctx)
            }
            SpecifierKind::Bare => self.require_bare(
                importer_dir,
                specifier,
                import_kind,
                importer_loader,
                tsconfig,
                ctx,
            ),
            SpecifierKind::DataUrl => unreachable!("data URLs take the fast path"),
        }
    }

    // 3. If X begins with './' or '/' or '../'
    fn require_relative(
        &self,
        importer_dir: &CachedPath,
        specifier: &str,
        importer_loader: Loader,
        ctx: &mut Ctx,
    ) -> Result<CachedPath, ResolveError> {
        let path = importer_dir.path().normalize_with(specifier);
        let cached_path = self.cache.value(&path);
        // a. LOAD_AS_FILE(Y + X)
        // b. LOAD_AS_DIRECTORY(Y + X)
        if let Some(path) = self.load_as_file_or_directory(&cached_path, importer_loader, ctx)? {
            return Ok(path);
        }
        // c. THROW "not found"
        Err(ResolveError::NotFound(specifier.to_string()))
    }

    // 4. If X begins with '#': LOAD_PACKAGE_IMPORTS(X, dirname(Y))
    fn require_package_internal(
        &self,
        importer_dir: &CachedPath,
        specifier: &str,
        import_kind: ImportKind,
        ctx: &mut Ctx,
    ) -> Result<CachedPath, ResolveError> {
        debug_assert_eq!(specifier.chars().next(), Some('#'));
        let Some(package_json) = importer_dir.find_package_json(&self.cache.fs)? else {
            return Err(ResolveError::PackageImportNotDefined(
                specifier.to_string(),
                importer_dir.to_path_buf(),
            ));
        };
        if specifier == "#" || specifier.starts_with("#/") {
            return Err(ResolveError::InvalidModuleSpecifier(
                specifier.to_string(),
                package_json.path.clone(),
            ));
        }
        let Some(imports) = &package_json.imports else {
            return Err(ResolveError::PackageImportNotDefined(
                specifier.to_string(),
                package_json.path.clone(),
            ));
        };
        let subpath = &specifier[1..];
        if let ExportsField::Map(map) = imports {
            if let Some(path) = self.package_imports_exports_resolve(
                subpath,
                map,
                package_json.directory(),
                import_kind,
                ctx,
            )? {
                return Ok(path);
            }
        }
        Err(ResolveError::PackageImportNotDefined(
            specifier.to_string(),
            package_json.path.clone(),
        ))
    }

    fn require_bare(
        &self,
        importer_dir: &CachedPath,
        specifier: &str,
        import_kind: ImportKind,
        importer_loader: Loader,
        tsconfig: Option<&Tsconfig>,
        ctx: &mut Ctx,
    ) -> Result<CachedPath, ResolveError> {
        // tsconfig `paths` wins over everything, then `baseUrl`.
        if let Some(tsconfig) = tsconfig {
            for candidate in tsconfig.paths_candidates(specifier) {
                let cached = self.cache.value(&candidate);
                if let Some(path) =
                    self.load_paths_candidate(&cached, importer_loader, ctx)?
                {
                    return Ok(path);
                }
            }
            if let Some(candidate) = tsconfig.base_url_candidate(specifier) {
                let cached = self.cache.value(&candidate);
                if let Some(path) =
                    self.load_as_file_or_directory(&cached, importer_loader, ctx)?
                {
                    return Ok(path);
                }
            }
        }

        // `browser` remaps bare specifiers of the importing package.
        if self.browser_field_enabled() {
            if let Some(package_json) = importer_dir.find_package_json(&self.cache.fs)? {
                if let Some(path) = self.load_browser_field(
                    importer_dir,
                    Some(specifier),
                    &package_json,
                    import_kind,
                    importer_loader,
                    ctx,
                )? {
                    return Ok(path);
                }
            }
        }

        if let Some(path) =
            self.load_node_modules(importer_dir, specifier, import_kind, importer_loader, ctx)?
        {
            return Ok(path);
        }
        Err(ResolveError::NotFound(specifier.to_string()))
    }

    /// A tsconfig `paths` candidate: the requested path, TS-aware
    /// sibling extensions (`.ts`, `.tsx`, `.d.ts`), then the general
    /// file-or-directory lookup.
    fn load_paths_candidate(
        &self,
        cached_path: &CachedPath,
        importer_loader: Loader,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        if importer_loader.is_typescript() {
            if let Some(requested) = cached_path.path().extension().and_then(|e| e.to_str()) {
                if requested == "js" || requested == "jsx" {
                    for ext in [".ts", ".tsx", ".d.ts"] {
                        if let Some(mapped) = crate::path::with_extension(cached_path.path(), ext)
                        {
                            let mapped = self.cache.value(&mapped);
                            if mapped.is_file(&self.cache.fs) {
                                return Ok(Some(mapped));
                            }
                        }
                    }
                }
            }
        }
        self.load_as_file_or_directory(cached_path, importer_loader, ctx)
    }

    fn load_as_file_or_directory(
        &self,
        cached_path: &CachedPath,
        importer_loader: Loader,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        if let Some(path) = self.load_as_file(cached_path, importer_loader, ctx)? {
            return Ok(Some(path));
        }
        if cached_path.is_dir(&self.cache.fs) {
            if let Some(path) = self.load_as_directory(cached_path, importer_loader, ctx)? {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    fn load_as_file(
        &self,
        cached_path: &CachedPath,
        importer_loader: Loader,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        // 1. If X is a file, load X. STOP
        if let Some(path) = self.load_alias_or_file(cached_path, importer_loader, ctx)? {
            return Ok(Some(path));
        }
        // TypeScript sources import `./file.js` while `./file.ts` is on
        // disk; map the requested extension before probing the
        // configured list.
        if importer_loader.is_typescript() {
            if let Some(requested) = cached_path.path().extension().and_then(|e| e.to_str()) {
                if requested == "js" || requested == "jsx" {
                    for ext in [".ts", ".tsx"] {
                        if let Some(mapped) = crate::path::with_extension(cached_path.path(), ext)
                        {
                            let mapped = self.cache.value(&mapped);
                            if let Some(path) =
                                self.load_alias_or_file(&mapped, importer_loader, ctx)?
                            {
                                return Ok(Some(path));
                            }
                        }
                    }
                }
            }
        }
        // 2. If X.<ext> is a file for each configured extension, load it. STOP
        self.load_extensions(cached_path, importer_loader, ctx)
    }

    /// Probe `path` + each configured extension, consulting the parent
    /// directory's cached listing so a miss costs no metadata call.
    fn load_extensions(
        &self,
        cached_path: &CachedPath,
        importer_loader: Loader,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        let Some(file_name) = cached_path.path().file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };
        let listing = cached_path
            .parent()
            .and_then(|parent| parent.dir_listing(&self.cache.fs));
        for extension in &self.options.resolve.extensions {
            let mut candidate_name = String::with_capacity(file_name.len() + extension.len());
            candidate_name.push_str(file_name);
            candidate_name.push_str(extension);
            if let Some(listing) = &listing {
                if listing.binary_search(&candidate_name).is_err() {
                    continue;
                }
            }
            let candidate = crate::path::append_extension(cached_path.path(), extension);
            let candidate = self.cache.value(&candidate);
            if let Some(path) = self.load_alias_or_file(&candidate, importer_loader, ctx)? {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// A file hit, unless the `browser` map redirects it first.
    fn load_alias_or_file(
        &self,
        cached_path: &CachedPath,
        importer_loader: Loader,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        if self.browser_field_enabled() {
            if let Some(package_json) = cached_path.find_package_json(&self.cache.fs)? {
                if let Some(path) = self.load_browser_field(
                    cached_path,
                    None,
                    &package_json,
                    ImportKind::EsmNamed,
                    importer_loader,
                    ctx,
                )? {
                    return Ok(Some(path));
                }
            }
        }
        if cached_path.is_file(&self.cache.fs) {
            return Ok(Some(cached_path.clone()));
        }
        Ok(None)
    }

    fn load_as_directory(
        &self,
        cached_path: &CachedPath,
        importer_loader: Loader,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        // 1. If X/package.json is a file, use its main fields.
        if let Some(package_json) = cached_path.package_json(&self.cache.fs)? {
            for main_field in package_json.main_fields(&self.options.resolve.main_fields) {
                let main_path = cached_path.path().normalize_with(main_field);
                let main_cached = self.cache.value(&main_path);
                if let Some(path) = self.load_as_file(&main_cached, importer_loader, ctx)? {
                    return Ok(Some(path));
                }
                if main_cached.is_dir(&self.cache.fs) {
                    if let Some(path) = self.load_index(&main_cached, importer_loader, ctx)? {
                        return Ok(Some(path));
                    }
                }
            }
        }
        // 2. LOAD_INDEX(X)
        self.load_index(cached_path, importer_loader, ctx)
    }

    fn load_index(
        &self,
        cached_path: &CachedPath,
        importer_loader: Loader,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        let index = cached_path.path().normalize_with("index");
        let index = self.cache.value(&index);
        self.load_extensions(&index, importer_loader, ctx)
    }

    fn load_node_modules(
        &self,
        importer_dir: &CachedPath,
        specifier: &str,
        import_kind: ImportKind,
        importer_loader: Loader,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        let (package_name, subpath) = parse_package_specifier(specifier);
        // 1. let DIRS = NODE_MODULES_PATHS(START)
        // 2. for each DIR in DIRS:
        for dir in std::iter::successors(Some(importer_dir), |p| p.parent()) {
            if !dir.is_dir(&self.cache.fs) {
                continue;
            }
            let Some(node_modules) = dir.cached_node_modules(&self.cache) else {
                continue;
            };
            let package_path = node_modules.path().normalize_with(package_name);
            let package_dir = self.cache.value(&package_path);
            if package_dir.is_dir(&self.cache.fs) {
                // a. LOAD_PACKAGE_EXPORTS(X, DIR)
                if let Some(package_json) = package_dir.package_json(&self.cache.fs)? {
                    if !package_json.exports.is_none() {
                        return self
                            .package_exports_resolve(
                                package_dir.path(),
                                subpath.strip_prefix('/').unwrap_or(subpath),
                                &package_json.exports,
                                import_kind,
                                ctx,
                            )?
                            .map_or_else(
                                || {
                                    Err(ResolveError::PackagePathNotExported(
                                        format!(".{subpath}"),
                                        package_json.path.clone(),
                                    ))
                                },
                                |path| self.finish_esm_match(&path, importer_loader, ctx),
                            );
                    }
                }
                // b. LOAD_AS_FILE / LOAD_AS_DIRECTORY on the subpath.
                let target = if subpath.is_empty() {
                    package_dir
                } else {
                    self.cache.value(&package_dir.path().normalize_with(&subpath[1..]))
                };
                if let Some(path) =
                    self.load_as_file_or_directory(&target, importer_loader, ctx)?
                {
                    return Ok(Some(path));
                }
            }
        }
        Ok(None)
    }

    /// RESOLVE_ESM_MATCH: an `exports` target resolved to a path that
    /// must exist (directories tolerated for non-compliant packages).
    fn finish_esm_match(
        &self,
        cached_path: &CachedPath,
        importer_loader: Loader,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        self.load_as_file_or_directory(cached_path, importer_loader, ctx)
    }

    fn browser_field_enabled(&self) -> bool {
        self.options.resolve.main_fields.iter().any(|f| f == "browser")
    }

    /// `browser` map redirection for a resolved file or a bare
    /// specifier.
    fn load_browser_field(
        &self,
        cached_path: &CachedPath,
        module_specifier: Option<&str>,
        package_json: &PackageJson,
        import_kind: ImportKind,
        importer_loader: Loader,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        let Some(new_specifier) =
            package_json.resolve_browser_field(cached_path.path(), module_specifier)?
        else {
            return Ok(None);
        };
        // Abort when resolving the recursive module.
        if module_specifier.is_some_and(|s| s == new_specifier) {
            return Ok(None);
        }
        if ctx.resolving_alias.as_deref().is_some_and(|s| s == new_specifier) {
            return Err(ResolveError::Recursion);
        }
        ctx.resolving_alias = Some(new_specifier.to_string());
        let parsed = Specifier::parse(new_specifier).map_err(ResolveError::Specifier)?;
        let package_dir = self.cache.value(package_json.directory());
        self.require(
            &package_dir,
            parsed.path(),
            parsed.kind,
            import_kind,
            importer_loader,
            None,
            ctx,
        )
        .map(Some)
    }

    /// PACKAGE_EXPORTS_RESOLVE(packageURL, subpath, exports, conditions)
    fn package_exports_resolve(
        &self,
        package_url: &Path,
        subpath: &str,
        exports: &ExportsField,
        import_kind: ImportKind,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        // 1. Mixing "." keys and condition keys is an invalid config.
        if let ExportsField::Map(map) = exports {
            let mut has_dot = false;
            let mut without_dot = false;
            for (key, _) in map {
                has_dot = has_dot || matches!(key, ExportsKey::Main | ExportsKey::Pattern(_));
                without_dot = without_dot || matches!(key, ExportsKey::Condition(_));
                if has_dot && without_dot {
                    return Err(ResolveError::InvalidPackageConfig(
                        package_url.join("package.json"),
                    ));
                }
            }
        }
        // 2. If subpath is ".", resolve the main export.
        if subpath.is_empty() {
            let main_export = match exports {
                ExportsField::None | ExportsField::Null => None,
                ExportsField::String(_) | ExportsField::Array(_) => Some(exports),
                ExportsField::Map(map) => map
                    .iter()
                    .find(|(key, _)| matches!(key, ExportsKey::Main))
                    .map(|(_, value)| value)
                    .or_else(|| {
                        // An all-conditions object is itself the main export.
                        if map.iter().any(|(key, _)| matches!(key, ExportsKey::Pattern(_))) {
                            None
                        } else {
                            Some(exports)
                        }
                    }),
            };
            if let Some(main_export) = main_export {
                if let Some(path) = self.package_target_resolve(
                    package_url,
                    ".",
                    main_export,
                    None,
                    import_kind,
                    ctx,
                )? {
                    return Ok(Some(path));
                }
            }
            return Ok(None);
        }
        // 3. Pattern keys.
        if let ExportsField::Map(map) = exports {
            return self.package_imports_exports_resolve(
                subpath,
                map,
                package_url,
                import_kind,
                ctx,
            );
        }
        Ok(None)
    }

    /// PACKAGE_IMPORTS_EXPORTS_RESOLVE(matchKey, matchObj, packageURL, …)
    fn package_imports_exports_resolve(
        &self,
        match_key: &str,
        match_obj: &[(ExportsKey, ExportsField)],
        package_url: &Path,
        import_kind: ImportKind,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        if match_key.ends_with('/') {
            return Ok(None);
        }
        // 1. Exact key, no "*".
        if !match_key.contains('*') {
            if let Some((_, target)) = match_obj.iter().find(
                |(key, _)| matches!(key, ExportsKey::Pattern(pattern) if pattern == match_key),
            ) {
                return self.package_target_resolve(
                    package_url,
                    match_key,
                    target,
                    None,
                    import_kind,
                    ctx,
                );
            }
        }
        // 2. Pattern keys, ordered by PATTERN_KEY_COMPARE.
        let mut best_target = None;
        let mut best_match = "";
        let mut best_key = "";
        for (expansion_key, target) in match_obj {
            let ExportsKey::Pattern(expansion_key) = expansion_key else { continue };
            if let Some((pattern_base, pattern_trailer)) = expansion_key.split_once('*') {
                if match_key.starts_with(pattern_base)
                    && !pattern_trailer.contains('*')
                    && (pattern_trailer.is_empty()
                        || (match_key.len() >= expansion_key.len()
                            && match_key.ends_with(pattern_trailer)))
                    && pattern_key_compare(best_key, expansion_key).is_gt()
                {
                    best_target = Some(target);
                    best_match =
                        &match_key[pattern_base.len()..match_key.len() - pattern_trailer.len()];
                    best_key = expansion_key;
                }
            }
        }
        if let Some(best_target) = best_target {
            return self.package_target_resolve(
                package_url,
                best_key,
                best_target,
                Some(best_match),
                import_kind,
                ctx,
            );
        }
        Ok(None)
    }

    /// PACKAGE_TARGET_RESOLVE(packageURL, target, patternMatch, …)
    fn package_target_resolve(
        &self,
        package_url: &Path,
        target_key: &str,
        target: &ExportsField,
        pattern_match: Option<&str>,
        import_kind: ImportKind,
        ctx: &mut Ctx,
    ) -> ResolveResult {
        match target {
            ExportsField::None | ExportsField::Null => Ok(None),
            ExportsField::String(target_str) => {
                if !target_str.starts_with("./") {
                    return Err(ResolveError::InvalidPackageTarget(
                        target_str.clone(),
                        target_key.to_string(),
                        package_url.join("package.json"),
                    ));
                }
                let substituted = match pattern_match {
                    Some(pattern_match) => target_str.replace('*', pattern_match),
                    None => target_str.clone(),
                };
                if is_invalid_exports_target(Path::new(&substituted)) {
                    return Err(ResolveError::InvalidPackageTarget(
                        substituted,
                        target_key.to_string(),
                        package_url.join("package.json"),
                    ));
                }
                let resolved = package_url.normalize_with(&substituted);
                Ok(Some(self.cache.value(&resolved)))
            }
            ExportsField::Map(conditions) => {
                let kind_condition = match import_kind {
                    ImportKind::CommonJsRequire => "require",
                    _ => "import",
                };
                for (i, (key, target_value)) in conditions.iter().enumerate() {
                    let ExportsKey::Condition(condition) = key else {
                        // Nested subpath keys inside a target are invalid;
                        // skipped like an unmatched condition.
                        continue;
                    };
                    let is_default = condition == "default";
                    if is_default && i < conditions.len() - 1 {
                        return Err(ResolveError::InvalidPackageConfigDefault(
                            package_url.join("package.json"),
                        ));
                    }
                    if is_default
                        || condition == kind_condition
                        || self.options.resolve.condition_names.iter().any(|c| c == condition)
                    {
                        if let Some(path) = self.package_target_resolve(
                            package_url,
                            target_key,
                            target_value,
                            pattern_match,
                            import_kind,
                            ctx,
                        )? {
                            return Ok(Some(path));
                        }
                    }
                }
                Ok(None)
            }
            ExportsField::Array(targets) => {
                for (i, target_value) in targets.iter().enumerate() {
                    let resolved = self.package_target_resolve(
                        package_url,
                        target_key,
                        target_value,
                        pattern_match,
                        import_kind,
                        ctx,
                    );
                    match resolved {
                        Ok(Some(path)) => return Ok(Some(path)),
                        Ok(None) => {}
                        // Fallback arrays continue past invalid targets,
                        // rethrowing only the last.
                        Err(err) if i == targets.len() - 1 => return Err(err),
                        Err(_) => {}
                    }
                }
                Ok(None)
            }
        }
    }

    /// The tsconfig governing files in `importer_dir`, per the
    /// configured discovery mode. Discovery never applies to files
    /// inside `node_modules`.
    fn tsconfig_for(
        &self,
        importer_dir: &CachedPath,
    ) -> Result<Option<Arc<Tsconfig>>, ResolveError> {
        match &self.options.resolve.tsconfig {
            TsconfigDiscovery::Disabled => Ok(None),
            TsconfigDiscovery::Manual(path) => self.load_extended_tsconfig(path).map(Some),
            TsconfigDiscovery::Auto => {
                if importer_dir.inside_node_modules() {
                    return Ok(None);
                }
                self.discover_tsconfig(importer_dir)
            }
        }
    }

    /// `exports` resolution for package-relative `extends` entries,
    /// where `require` wins over `import`.
    pub(crate) fn package_exports_resolve_for_extends(
        &self,
        package_dir: &Path,
        subpath: &str,
        exports: &ExportsField,
        import_kind: ImportKind,
    ) -> Result<Option<PathBuf>, ResolveError> {
        let mut ctx = Ctx::default();
        self.package_exports_resolve(package_dir, subpath, exports, import_kind, &mut ctx)
            .map(|opt| opt.map(|p| p.to_path_buf()))
    }

    /// The tsconfig projected onto `file`, for per-file emit behavior
    /// (strictness, jsx) outside of resolution proper.
    pub(crate) fn tsconfig_for_file(
        &self,
        file: &Path,
    ) -> Result<Option<Arc<Tsconfig>>, ResolveError> {
        let dir = file.parent().unwrap_or(file);
        let dir = self.cache.value(dir);
        self.tsconfig_for(&dir)
    }

    pub(crate) fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    pub(crate) fn cache(&self) -> &Cache<Fs> {
        &self.cache
    }
}

// Returns (package_name, subpath) where subpath is "" or begins with '/'.
fn parse_package_specifier(specifier: &str) -> (&str, &str) {
    let mut separator_index = specifier.as_bytes().iter().position(|b| *b == b'/');
    if specifier.starts_with('@') {
        if let Some(index) = &separator_index {
            separator_index = specifier[*index + 1..]
                .as_bytes()
                .iter()
                .position(|b| *b == b'/')
                .map(|i| i + *index + 1);
        }
    }
    let package_name =
        separator_index.map_or(specifier, |separator_index| &specifier[..separator_index]);
    let package_subpath =
        separator_index.map_or("", |separator_index| &specifier[separator_index..]);
    (package_name, package_subpath)
}

/// PATTERN_KEY_COMPARE(keyA, keyB): descending specificity.
fn pattern_key_compare(key_a: &str, key_b: &str) -> Ordering {
    if key_a.is_empty() {
        return Ordering::Greater;
    }
    let a_pos = key_a.chars().position(|c| c == '*');
    let base_length_a = a_pos.map_or(key_a.len(), |p| p + 1);
    let b_pos = key_b.chars().position(|c| c == '*');
    let base_length_b = b_pos.map_or(key_b.len(), |p| p + 1);
    if base_length_a > base_length_b {
        return Ordering::Less;
    }
    if base_length_b > base_length_a {
        return Ordering::Greater;
    }
    if a_pos.is_none() {
        return Ordering::Greater;
    }
    if b_pos.is_none() {
        return Ordering::Less;
    }
    if key_a.len() > key_b.len() {
        return Ordering::Less;
    }
    if key_b.len() > key_a.len() {
        return Ordering::Greater;
    }
    Ordering::Equal
}

/// ESM PACKAGE_TARGET_RESOLVE forbids `..`, `.` after the first segment,
/// and `node_modules` segments in targets.
fn is_invalid_exports_target(path: &Path) -> bool {
    use std::path::Component;
    path.components().enumerate().any(|(index, c)| match c {
        Component::ParentDir => true,
        Component::CurDir => index > 0,
        Component::Normal(c) => c.eq_ignore_ascii_case("node_modules"),
        _ => false,
    })
}
