//! Path utilities.
//!
//! Pure-lexical path manipulation. Nothing in here touches the
//! filesystem; `.` and `..` segments are collapsed without resolving
//! links.

use std::path::{Component, Path, PathBuf};

pub const SLASH_START: &[char; 2] = &['/', '\\'];

/// Extension trait adding lexical normalization to std's [`Path`].
pub trait PathUtil {
    /// Normalize this path without performing I/O.
    ///
    /// All redundant separators and up-level references are collapsed.
    fn normalize(&self) -> PathBuf;

    /// Normalize with a subpath, assuming this path is already normalized,
    /// without performing I/O.
    fn normalize_with<P: AsRef<Path>>(&self, subpath: P) -> PathBuf;

    /// The path relative to `base`, with separators normalized to `/`.
    ///
    /// Used for matching `sideEffects` globs, which are declared relative
    /// to the package root. Returns `None` when the path is not inside
    /// `base`.
    fn relative_forward_slashed(&self, base: &Path) -> Option<String>;

    /// Whether any ancestor component is a `node_modules` directory.
    fn inside_node_modules(&self) -> bool;
}

impl PathUtil for Path {
    fn normalize(&self) -> PathBuf {
        let mut components = self.components().peekable();
        let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek() {
            let buf = PathBuf::from(c.as_os_str());
            components.next();
            buf
        } else {
            PathBuf::new()
        };

        for component in components {
            match component {
                Component::Prefix(..) => unreachable!("Path {:?}", self),
                Component::RootDir => {
                    ret.push(component.as_os_str());
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    ret.pop();
                }
                Component::Normal(c) => {
                    ret.push(c);
                }
            }
        }

        ret
    }

    fn normalize_with<B: AsRef<Self>>(&self, subpath: B) -> PathBuf {
        let subpath = subpath.as_ref();
        let mut components = subpath.components();
        let Some(head) = components.next() else { return subpath.to_path_buf() };
        if matches!(head, Component::Prefix(..) | Component::RootDir) {
            return subpath.to_path_buf();
        }
        let mut ret = self.to_path_buf();
        for component in std::iter::once(head).chain(components) {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    ret.pop();
                }
                Component::Normal(c) => {
                    ret.push(c);
                }
                Component::Prefix(..) | Component::RootDir => {
                    unreachable!("Path {:?} Subpath {:?}", self, subpath)
                }
            }
        }
        ret
    }

    fn relative_forward_slashed(&self, base: &Path) -> Option<String> {
        let rel = self.strip_prefix(base).ok()?;
        let s = rel.to_string_lossy();
        Some(if s.contains('\\') { s.replace('\\', "/") } else { s.into_owned() })
    }

    fn inside_node_modules(&self) -> bool {
        self.components().any(|c| c.as_os_str() == "node_modules")
    }
}

/// Replace the final extension of `path` with `extension` (which carries a
/// leading dot). Returns `None` when the path has no extension.
pub fn with_extension(path: &Path, extension: &str) -> Option<PathBuf> {
    debug_assert!(extension.starts_with('.'));
    let file_name = path.file_name()?.to_str()?;
    let stem_len = file_name.rfind('.')?;
    let mut name = String::with_capacity(stem_len + extension.len());
    name.push_str(&file_name[..stem_len]);
    name.push_str(extension);
    Some(path.with_file_name(name))
}

/// Append `extension` (with its leading dot) to the full file name, keeping
/// any existing extension: `./mod.worker` + `.js` -> `./mod.worker.js`.
pub fn append_extension(path: &Path, extension: &str) -> PathBuf {
    debug_assert!(extension.starts_with('.'));
    let mut os_string = path.to_path_buf().into_os_string();
    os_string.push(extension);
    PathBuf::from(os_string)
}
