//! Import specifier parsing and classification.

use crate::error::SpecifierError;

/// The class of an import specifier, decided purely from its spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierKind {
    /// Begins with `./` or `../`.
    Relative,
    /// Begins with `/` or a Windows drive prefix.
    Absolute,
    /// `data:` URL.
    DataUrl,
    /// `#`-prefixed package-internal import.
    PackageInternal,
    /// Anything else; resolved via tsconfig `paths`, `baseUrl` and
    /// `node_modules`.
    Bare,
}

/// A parsed specifier. Query and fragment are split off so `./a.js?x#y`
/// can resolve the underlying path while keeping the suffix for the
/// emitted URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier<'a> {
    path: &'a str,
    pub kind: SpecifierKind,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

impl<'a> Specifier<'a> {
    /// # Errors
    ///
    /// * [SpecifierError::Empty]
    pub fn parse(specifier: &'a str) -> Result<Self, SpecifierError> {
        if specifier.is_empty() {
            return Err(SpecifierError::Empty(specifier.to_string()));
        }
        let kind = Self::classify(specifier);
        // data: URLs may legitimately contain `?` and `#` in the payload.
        if kind == SpecifierKind::DataUrl {
            return Ok(Self { path: specifier, kind, query: None, fragment: None });
        }
        let (path, query, fragment) = Self::split_query_fragment(specifier);
        if path.is_empty() {
            return Err(SpecifierError::Empty(specifier.to_string()));
        }
        Ok(Self { path, kind, query, fragment })
    }

    fn classify(specifier: &str) -> SpecifierKind {
        let bytes = specifier.as_bytes();
        match bytes[0] {
            b'.' => {
                if specifier == "." || specifier == ".." {
                    return SpecifierKind::Relative;
                }
                match bytes.get(1) {
                    Some(b'/') => SpecifierKind::Relative,
                    Some(b'.') if matches!(bytes.get(2), Some(b'/')) => SpecifierKind::Relative,
                    _ => SpecifierKind::Bare,
                }
            }
            b'/' | b'\\' => SpecifierKind::Absolute,
            b'#' => SpecifierKind::PackageInternal,
            c if c.is_ascii_alphabetic()
                && matches!(bytes.get(1), Some(b':'))
                && matches!(bytes.get(2), Some(b'/' | b'\\')) =>
            {
                SpecifierKind::Absolute
            }
            _ => {
                if specifier.starts_with("data:") {
                    SpecifierKind::DataUrl
                } else {
                    SpecifierKind::Bare
                }
            }
        }
    }

    fn split_query_fragment(specifier: &str) -> (&str, Option<&str>, Option<&str>) {
        let hash = specifier.find('#');
        let question = match hash {
            Some(h) => specifier[..h].find('?'),
            None => specifier.find('?'),
        };
        match (question, hash) {
            (Some(q), Some(h)) => {
                (&specifier[..q], Some(&specifier[q..h]), Some(&specifier[h..]))
            }
            (Some(q), None) => (&specifier[..q], Some(&specifier[q..]), None),
            (None, Some(h)) => (&specifier[..h], None, Some(&specifier[h..])),
            (None, None) => (specifier, None, None),
        }
    }

    pub fn path(&self) -> &'a str {
        self.path
    }
}
