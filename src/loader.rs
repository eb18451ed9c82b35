//! Content loaders.

use std::path::Path;

use indexmap::IndexMap;

/// How the contents of a resolved file enter the module graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Loader {
    Js,
    Jsx,
    Ts,
    Tsx,
    Json,
    Text,
    Base64,
    DataUrl,
    File,
    Copy,
    Css,
    Empty,
}

impl Loader {
    /// Whether the parser contract applies: JS-family sources produce
    /// statement lists; everything else enters the graph as a synthetic
    /// single-export module.
    pub const fn is_script(self) -> bool {
        matches!(self, Self::Js | Self::Jsx | Self::Ts | Self::Tsx)
    }

    pub const fn is_typescript(self) -> bool {
        matches!(self, Self::Ts | Self::Tsx)
    }

    pub const fn is_css(self) -> bool {
        matches!(self, Self::Css)
    }
}

/// Extension-to-loader table. Starts from the default table and is
/// overridden per extension by the host.
#[derive(Debug, Clone)]
pub struct LoaderRegistry {
    by_extension: IndexMap<String, Loader>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        let mut by_extension = IndexMap::default();
        for (ext, loader) in [
            (".js", Loader::Js),
            (".mjs", Loader::Js),
            (".cjs", Loader::Js),
            (".jsx", Loader::Jsx),
            (".ts", Loader::Ts),
            (".mts", Loader::Ts),
            (".cts", Loader::Ts),
            (".tsx", Loader::Tsx),
            (".json", Loader::Json),
            (".css", Loader::Css),
            (".txt", Loader::Text),
        ] {
            by_extension.insert(ext.to_string(), loader);
        }
        Self { by_extension }
    }
}

impl LoaderRegistry {
    /// Install or replace the loader for `extension` (leading dot
    /// included).
    pub fn insert(&mut self, extension: impl Into<String>, loader: Loader) {
        let extension = extension.into();
        debug_assert!(extension.starts_with('.'));
        self.by_extension.insert(extension, loader);
    }

    /// Select the loader for `path`: the longest configured extension
    /// that suffixes the file name wins, so `.module.css` takes
    /// precedence over `.css` when both are configured. Files with no
    /// matching extension fall back to [`Loader::Js`].
    pub fn for_path(&self, path: &Path) -> Loader {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Loader::Js;
        };
        let mut best: Option<(usize, Loader)> = None;
        for (ext, loader) in &self.by_extension {
            if file_name.len() > ext.len()
                && file_name.ends_with(ext.as_str())
                && best.is_none_or(|(len, _)| ext.len() > len)
            {
                best = Some((ext.len(), *loader));
            }
        }
        best.map_or(Loader::Js, |(_, loader)| loader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table() {
        let registry = LoaderRegistry::default();
        assert_eq!(registry.for_path(Path::new("/a/x.ts")), Loader::Ts);
        assert_eq!(registry.for_path(Path::new("/a/x.css")), Loader::Css);
        assert_eq!(registry.for_path(Path::new("/a/x.unknown")), Loader::Js);
        assert_eq!(registry.for_path(Path::new("/a/extensionless")), Loader::Js);
    }

    #[test]
    fn longest_extension_wins() {
        let mut registry = LoaderRegistry::default();
        registry.insert(".module.css", Loader::Json);
        assert_eq!(registry.for_path(Path::new("/a/x.module.css")), Loader::Json);
        assert_eq!(registry.for_path(Path::new("/a/x.css")), Loader::Css);
    }

    #[test]
    fn override_replaces() {
        let mut registry = LoaderRegistry::default();
        registry.insert(".txt", Loader::Base64);
        assert_eq!(registry.for_path(Path::new("/a/notes.txt")), Loader::Base64);
    }
}
