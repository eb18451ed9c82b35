//! Per-build caches.
//!
//! All lookups the build performs are memoized here: interned paths with
//! per-path metadata, `package.json` and tsconfig parses, directory
//! listings and realpaths. The cache is an explicit context object owned
//! by the bundler, never a process-wide singleton, so multiple builds
//! can run concurrently in one process. Every entry is write-once.

use once_cell::sync::OnceCell as OnceLock;
use std::{
    borrow::Borrow,
    convert::AsRef,
    hash::{BuildHasherDefault, Hash, Hasher},
    io,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use dashmap::{DashMap, DashSet};
use rustc_hash::FxHasher;

use crate::{
    diagnostics::DiagnosticSink,
    error::ResolveError,
    file_system::{FileMetadata, FileSystem},
    package_json::PackageJson,
    path::PathUtil,
    tsconfig::Tsconfig,
};

#[derive(Default)]
pub struct Cache<Fs> {
    pub(crate) fs: Fs,
    paths: DashSet<CachedPath, BuildHasherDefault<IdentityHasher>>,
    tsconfigs: DashMap<PathBuf, Arc<Tsconfig>, BuildHasherDefault<FxHasher>>,
}

impl<Fs: FileSystem> Cache<Fs> {
    pub fn new(fs: Fs) -> Self {
        Self { fs, paths: DashSet::default(), tsconfigs: DashMap::default() }
    }

    pub fn clear(&self) {
        self.paths.clear();
        self.tsconfigs.clear();
    }

    /// Intern `path`, linking it to its (interned) parent.
    pub fn value(&self, path: &Path) -> CachedPath {
        let hash = {
            let mut hasher = FxHasher::default();
            path.hash(&mut hasher);
            hasher.finish()
        };
        if let Some(cache_entry) = self.paths.get((hash, path).borrow() as &dyn CacheKey) {
            return cache_entry.clone();
        }
        let parent = path.parent().map(|p| self.value(p));
        let data = CachedPath(Arc::new(CachedPathImpl::new(
            hash,
            path.to_path_buf().into_boxed_path(),
            parent,
        )));
        self.paths.insert(data.clone());
        data
    }

    /// Load and memoize a tsconfig by path, running `callback` (the
    /// `extends` resolution) exactly once before the entry is published.
    ///
    /// The path may name a file, a file without its `.json` extension,
    /// or a directory containing `tsconfig.json`.
    ///
    /// # Errors
    ///
    /// * [ResolveError::TsconfigNotFound]
    /// * [ResolveError::Json]
    pub fn tsconfig<F: FnOnce(&mut Tsconfig) -> Result<(), ResolveError>>(
        &self,
        root: bool,
        path: &Path,
        sink: &DiagnosticSink,
        callback: F,
    ) -> Result<Arc<Tsconfig>, ResolveError> {
        if let Some(tsconfig_ref) = self.tsconfigs.get(path) {
            return Ok(Arc::clone(tsconfig_ref.value()));
        }
        let meta = self.fs.metadata(path).ok();
        let tsconfig_path = if meta.is_some_and(|m| m.is_file) {
            path.to_path_buf()
        } else if meta.is_some_and(|m| m.is_dir) {
            path.join("tsconfig.json")
        } else {
            crate::path::append_extension(path, ".json")
        };
        let tsconfig_string = self
            .fs
            .read_to_string(&tsconfig_path)
            .map_err(|_| ResolveError::TsconfigNotFound(path.to_path_buf()))?;
        let mut tsconfig =
            Tsconfig::parse(root, &tsconfig_path, &tsconfig_string).map_err(|error| {
                ResolveError::from_serde_json_error(tsconfig_path.clone(), &error)
            })?;
        callback(&mut tsconfig)?;
        tsconfig.validate();
        for warning in std::mem::take(&mut tsconfig.warnings) {
            sink.push_unordered(warning);
        }
        let tsconfig = Arc::new(tsconfig);
        self.tsconfigs.insert(path.to_path_buf(), Arc::clone(&tsconfig));
        Ok(tsconfig)
    }
}

#[derive(Clone)]
pub struct CachedPath(Arc<CachedPathImpl>);

impl Hash for CachedPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state);
    }
}

impl PartialEq for CachedPath {
    fn eq(&self, other: &Self) -> bool {
        self.0.path == other.0.path
    }
}
impl Eq for CachedPath {}

impl std::fmt::Debug for CachedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.path.fmt(f)
    }
}

impl Deref for CachedPath {
    type Target = CachedPathImpl;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl<'a> Borrow<dyn CacheKey + 'a> for CachedPath {
    fn borrow(&self) -> &(dyn CacheKey + 'a) {
        self
    }
}

impl AsRef<CachedPathImpl> for CachedPath {
    fn as_ref(&self) -> &CachedPathImpl {
        self.0.as_ref()
    }
}

impl CacheKey for CachedPath {
    fn tuple(&self) -> (u64, &Path) {
        (self.hash, &self.path)
    }
}

pub struct CachedPathImpl {
    hash: u64,
    path: Box<Path>,
    parent: Option<CachedPath>,
    meta: OnceLock<Option<FileMetadata>>,
    canonicalized: OnceLock<Option<PathBuf>>,
    node_modules: OnceLock<Option<CachedPath>>,
    package_json: OnceLock<Option<Arc<PackageJson>>>,
    /// Sorted directory listing, for extension probing.
    listing: OnceLock<Option<Arc<[String]>>>,
    /// Discovered tsconfig for files in this directory.
    pub(crate) discovered_tsconfig: OnceLock<Option<Arc<Tsconfig>>>,
}

impl CachedPathImpl {
    fn new(hash: u64, path: Box<Path>, parent: Option<CachedPath>) -> Self {
        Self {
            hash,
            path,
            parent,
            meta: OnceLock::new(),
            canonicalized: OnceLock::new(),
            node_modules: OnceLock::new(),
            package_json: OnceLock::new(),
            listing: OnceLock::new(),
            discovered_tsconfig: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.path.to_path_buf()
    }

    pub fn parent(&self) -> Option<&CachedPath> {
        self.parent.as_ref()
    }

    fn meta<Fs: FileSystem>(&self, fs: &Fs) -> Option<FileMetadata> {
        *self.meta.get_or_init(|| fs.metadata(&self.path).ok())
    }

    pub fn is_file<Fs: FileSystem>(&self, fs: &Fs) -> bool {
        self.meta(fs).is_some_and(|meta| meta.is_file)
    }

    pub fn is_dir<Fs: FileSystem>(&self, fs: &Fs) -> bool {
        self.meta(fs).is_some_and(|meta| meta.is_dir)
    }

    /// Sorted entry names of this directory, when it is one.
    pub fn dir_listing<Fs: FileSystem>(&self, fs: &Fs) -> Option<Arc<[String]>> {
        self.listing
            .get_or_init(|| fs.read_dir(&self.path).ok().map(Arc::from))
            .clone()
    }

    /// Realpath with symlinks resolved, memoized per path node so deep
    /// trees only canonicalize each prefix once.
    pub fn realpath<Fs: FileSystem>(&self, fs: &Fs) -> io::Result<PathBuf> {
        self.canonicalized
            .get_or_try_init(|| {
                if fs.symlink_metadata(&self.path).is_ok_and(|m| m.is_symlink) {
                    return fs.canonicalize(&self.path).map(Some);
                }
                if let Some(parent) = self.parent() {
                    let parent_path = parent.realpath(fs)?;
                    return Ok(Some(
                        parent_path.normalize_with(self.path.strip_prefix(&parent.path).unwrap()),
                    ));
                }
                Ok(None)
            })
            .cloned()
            .map(|r| r.unwrap_or_else(|| self.path.clone().to_path_buf()))
    }

    pub fn module_directory<Fs: FileSystem>(
        &self,
        module_name: &str,
        cache: &Cache<Fs>,
    ) -> Option<CachedPath> {
        let cached_path = cache.value(&self.path.join(module_name));
        cached_path.is_dir(&cache.fs).then_some(cached_path)
    }

    pub fn cached_node_modules<Fs: FileSystem>(&self, cache: &Cache<Fs>) -> Option<CachedPath> {
        self.node_modules.get_or_init(|| self.module_directory("node_modules", cache)).clone()
    }

    /// Find package.json of a path by traversing parent directories.
    ///
    /// # Errors
    ///
    /// * [ResolveError::Json]
    pub fn find_package_json<Fs: FileSystem>(
        &self,
        fs: &Fs,
    ) -> Result<Option<Arc<PackageJson>>, ResolveError> {
        let mut cache_value = self;
        // Go up directories when the querying path is not a directory.
        while !cache_value.is_dir(fs) {
            if let Some(cv) = &cache_value.parent {
                cache_value = cv.as_ref();
            } else {
                break;
            }
        }
        let mut cache_value = Some(cache_value);
        while let Some(cv) = cache_value {
            if let Some(package_json) = cv.package_json(fs)? {
                return Ok(Some(Arc::clone(&package_json)));
            }
            cache_value = cv.parent.as_deref();
        }
        Ok(None)
    }

    /// Get package.json of the given directory.
    ///
    /// # Errors
    ///
    /// * [ResolveError::Json]
    pub fn package_json<Fs: FileSystem>(
        &self,
        fs: &Fs,
    ) -> Result<Option<Arc<PackageJson>>, ResolveError> {
        // Change to `std::sync::OnceLock::get_or_try_init` when it is stable.
        self.package_json
            .get_or_try_init(|| {
                let package_json_path = self.path.join("package.json");
                let Ok(package_json_string) = fs.read_to_string(&package_json_path) else {
                    return Ok(None);
                };
                let real_path = self.realpath(fs)?.join("package.json");
                PackageJson::parse(package_json_path.clone(), real_path, &package_json_string)
                    .map(Arc::new)
                    .map(Some)
                    .map_err(|error| {
                        ResolveError::from_serde_json_error(package_json_path, &error)
                    })
            })
            .cloned()
    }

    pub fn inside_node_modules(&self) -> bool {
        self.path.inside_node_modules()
    }
}

/// Memoized cache key, code adapted from <https://stackoverflow.com/a/50478038>.
trait CacheKey {
    fn tuple(&self) -> (u64, &Path);
}

impl Hash for dyn CacheKey + '_ {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tuple().0.hash(state);
    }
}

impl PartialEq for dyn CacheKey + '_ {
    fn eq(&self, other: &Self) -> bool {
        self.tuple().1 == other.tuple().1
    }
}

impl Eq for dyn CacheKey + '_ {}

impl CacheKey for (u64, &Path) {
    fn tuple(&self) -> (u64, &Path) {
        (self.0, self.1)
    }
}

impl<'a> Borrow<dyn CacheKey + 'a> for (u64, &'a Path) {
    fn borrow(&self) -> &(dyn CacheKey + 'a) {
        self
    }
}

/// Since the cache key is memoized, use an identity hasher
/// to avoid double cache.
#[derive(Default)]
struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
    fn write(&mut self, _: &[u8]) {
        unreachable!("Invalid use of IdentityHasher")
    }
    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }
    fn finish(&self) -> u64 {
        self.0
    }
}
