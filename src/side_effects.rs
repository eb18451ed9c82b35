//! `sideEffects` classification of resolved files.

use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use crate::{
    glob,
    package_json::{PackageJson, SideEffectsField},
    path::PathUtil,
};

/// Whether evaluating a module at load time can be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SideEffectClass {
    /// No enclosing `package.json` declares `sideEffects`.
    #[default]
    Unknown,
    HasSideEffects,
    /// The module may be dropped entirely when none of its exports are
    /// reachable.
    NoSideEffects,
}

/// A classification plus the manifest that produced it, for diagnostic
/// notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffectVerdict {
    pub class: SideEffectClass,
    /// The `package.json` that declared `sideEffects`, when one did.
    pub declared_in: Option<PathBuf>,
}

impl SideEffectVerdict {
    pub const fn unknown() -> Self {
        Self { class: SideEffectClass::Unknown, declared_in: None }
    }
}

/// Classify `file` against the nearest enclosing `package.json`.
///
/// Glob patterns match the file path relative to the package root;
/// patterns without a leading `/` match any suffix (see [`glob`]). A
/// glob array with no matching pattern means the file is side-effect
/// free.
pub fn classify(package_json: Option<&PackageJson>, file: &Path) -> SideEffectVerdict {
    let Some(package_json) = package_json else {
        return SideEffectVerdict::unknown();
    };
    let class = match &package_json.side_effects {
        SideEffectsField::Unspecified => return SideEffectVerdict::unknown(),
        SideEffectsField::Always => SideEffectClass::HasSideEffects,
        SideEffectsField::Never => SideEffectClass::NoSideEffects,
        SideEffectsField::Globs(patterns) => {
            let Some(relative) = file.relative_forward_slashed(package_json.directory()) else {
                return SideEffectVerdict::unknown();
            };
            if patterns.iter().any(|pattern| {
                // `./`-prefixed patterns are root-anchored, same as `/`.
                let pattern = match pattern.strip_prefix("./") {
                    Some(rest) => Cow::Owned(format!("/{rest}")),
                    None => Cow::Borrowed(pattern.as_str()),
                };
                glob::side_effects_match(&pattern, &relative)
            }) {
                SideEffectClass::HasSideEffects
            } else {
                SideEffectClass::NoSideEffects
            }
        }
    };
    SideEffectVerdict { class, declared_in: Some(package_json.path.clone()) }
}
