//! Resolver scenarios: relative and bare specifiers, extension probing,
//! package entry fields, `exports` conditions, side-effect verdicts and
//! data URLs.

use std::path::PathBuf;

use crate::{
    ast::ImportKind, BuildOptions, Loader, Namespace, ResolveError, SideEffectClass,
};

use super::support::{entry_options, resolver_with};

fn resolve_ok(
    files: &[(&str, &str)],
    importer: &str,
    specifier: &str,
) -> crate::Resolution {
    let resolver = resolver_with(files, BuildOptions::default());
    resolver
        .resolve(std::path::Path::new(importer), specifier, ImportKind::EsmNamed)
        .unwrap_or_else(|err| panic!("{specifier} from {importer}: {err}"))
}

#[test]
fn relative_with_extension_probing() {
    let files = [("/app/index.js", ""), ("/app/util.js", "")];
    let resolution = resolve_ok(&files, "/app/index.js", "./util");
    assert_eq!(resolution.path, PathBuf::from("/app/util.js"));
    assert_eq!(resolution.loader, Loader::Js);
    assert_eq!(resolution.namespace, Namespace::File);
}

#[test]
fn extension_order_is_configured_order() {
    let files = [("/app/index.ts", ""), ("/app/util.ts", ""), ("/app/util.js", "")];
    // Default extension order tries `.tsx`/`.ts` before `.js`.
    let resolution = resolve_ok(&files, "/app/index.ts", "./util");
    assert_eq!(resolution.path, PathBuf::from("/app/util.ts"));
}

#[test]
fn ts_sources_resolve_js_specifiers_to_ts_files() {
    let files = [("/app/index.ts", ""), ("/app/util.ts", "")];
    let resolution = resolve_ok(&files, "/app/index.ts", "./util.js");
    assert_eq!(resolution.path, PathBuf::from("/app/util.ts"));

    // A JS importer gets no such mapping.
    let files = [("/app/index.js", ""), ("/app/util.ts", "")];
    let resolver = resolver_with(&files, BuildOptions::default());
    let err = resolver
        .resolve(std::path::Path::new("/app/index.js"), "./util.js", ImportKind::EsmNamed)
        .unwrap_err();
    assert!(matches!(err, ResolveError::NotFound(_)));
}

#[test]
fn directory_resolves_through_main_fields() {
    let files = [
        ("/app/index.js", ""),
        ("/app/node_modules/dep/package.json", r#"{"main": "./lib/entry.js"}"#),
        ("/app/node_modules/dep/lib/entry.js", ""),
    ];
    let resolution = resolve_ok(&files, "/app/index.js", "dep");
    assert_eq!(resolution.path, PathBuf::from("/app/node_modules/dep/lib/entry.js"));
}

#[test]
fn module_field_wins_over_main_by_default() {
    let files = [
        ("/app/index.js", ""),
        (
            "/app/node_modules/dep/package.json",
            r#"{"main": "./index.cjs", "module": "./index.mjs"}"#,
        ),
        ("/app/node_modules/dep/index.cjs", ""),
        ("/app/node_modules/dep/index.mjs", ""),
    ];
    let resolution = resolve_ok(&files, "/app/index.js", "dep");
    assert_eq!(resolution.path, PathBuf::from("/app/node_modules/dep/index.mjs"));
}

#[test]
fn directory_falls_back_to_index() {
    let files = [("/app/index.js", ""), ("/app/lib/index.js", "")];
    let resolution = resolve_ok(&files, "/app/index.js", "./lib");
    assert_eq!(resolution.path, PathBuf::from("/app/lib/index.js"));
}

#[test]
fn node_modules_walk_goes_upward() {
    let files = [
        ("/repo/node_modules/dep/index.js", ""),
        ("/repo/packages/app/index.js", ""),
    ];
    let resolution = resolve_ok(&files, "/repo/packages/app/index.js", "dep");
    assert_eq!(resolution.path, PathBuf::from("/repo/node_modules/dep/index.js"));
}

#[test]
fn exports_conditions_select_by_import_kind() {
    let files = [
        ("/app/index.js", ""),
        (
            "/app/node_modules/dep/package.json",
            r#"{"exports": {".": {"require": "./main.cjs", "import": "./main.mjs", "default": "./main.js"}}}"#,
        ),
        ("/app/node_modules/dep/main.cjs", ""),
        ("/app/node_modules/dep/main.mjs", ""),
        ("/app/node_modules/dep/main.js", ""),
    ];
    let resolver = resolver_with(&files, BuildOptions::default());
    let import = resolver
        .resolve(std::path::Path::new("/app/index.js"), "dep", ImportKind::EsmNamed)
        .unwrap();
    assert_eq!(import.path, PathBuf::from("/app/node_modules/dep/main.mjs"));
    let require = resolver
        .resolve(std::path::Path::new("/app/index.js"), "dep", ImportKind::CommonJsRequire)
        .unwrap();
    assert_eq!(require.path, PathBuf::from("/app/node_modules/dep/main.cjs"));
}

#[test]
fn exports_subpath_patterns() {
    let files = [
        ("/app/index.js", ""),
        (
            "/app/node_modules/dep/package.json",
            r#"{"exports": {"./*": "./src/*.js", "./helper": "./src/helper/index.js"}}"#,
        ),
        ("/app/node_modules/dep/src/feature.js", ""),
        ("/app/node_modules/dep/src/helper/index.js", ""),
    ];
    let feature = resolve_ok(&files, "/app/index.js", "dep/feature");
    assert_eq!(feature.path, PathBuf::from("/app/node_modules/dep/src/feature.js"));
    // The exact key beats the pattern.
    let helper = resolve_ok(&files, "/app/index.js", "dep/helper");
    assert_eq!(helper.path, PathBuf::from("/app/node_modules/dep/src/helper/index.js"));
}

#[test]
fn exports_hide_unlisted_subpaths() {
    let files = [
        ("/app/index.js", ""),
        ("/app/node_modules/dep/package.json", r#"{"exports": {".": "./index.js"}}"#),
        ("/app/node_modules/dep/index.js", ""),
        ("/app/node_modules/dep/secret.js", ""),
    ];
    let resolver = resolver_with(&files, BuildOptions::default());
    let err = resolver
        .resolve(std::path::Path::new("/app/index.js"), "dep/secret", ImportKind::EsmNamed)
        .unwrap_err();
    assert!(matches!(err, ResolveError::PackagePathNotExported(..)), "{err:?}");
}

#[test]
fn extra_conditions_from_options() {
    let files = [
        ("/app/index.js", ""),
        (
            "/app/node_modules/dep/package.json",
            r#"{"exports": {".": {"worker": "./worker.js", "default": "./main.js"}}}"#,
        ),
        ("/app/node_modules/dep/worker.js", ""),
        ("/app/node_modules/dep/main.js", ""),
    ];
    let mut options = BuildOptions::default();
    options.resolve.condition_names = vec!["worker".to_string()];
    let resolver = resolver_with(&files, options);
    let resolution = resolver
        .resolve(std::path::Path::new("/app/index.js"), "dep", ImportKind::EsmNamed)
        .unwrap();
    assert_eq!(resolution.path, PathBuf::from("/app/node_modules/dep/worker.js"));
}

#[test]
fn package_internal_imports() {
    let files = [
        ("/app/package.json", r##"{"imports": {"#shared/*": "./src/shared/*.js"}}"##),
        ("/app/src/index.js", ""),
        ("/app/src/shared/util.js", ""),
    ];
    let resolution = resolve_ok(&files, "/app/src/index.js", "#shared/util");
    assert_eq!(resolution.path, PathBuf::from("/app/src/shared/util.js"));
}

#[test]
fn builtins_are_external() {
    let files = [("/app/index.js", "")];
    let resolution = resolve_ok(&files, "/app/index.js", "node:path");
    assert!(resolution.external);
    let resolution = resolve_ok(&files, "/app/index.js", "fs");
    assert!(resolution.external);
}

#[test]
fn missing_bare_specifier_hints_at_relative_path() {
    let files = [("/app/index.js", ""), ("/app/util/index.js", "")];
    let resolver = resolver_with(&files, BuildOptions::default());
    let err = resolver
        .resolve(std::path::Path::new("/app/index.js"), "util", ImportKind::EsmNamed)
        .unwrap_err();
    assert!(
        matches!(&err, ResolveError::NotFoundRelativeHint(_, hint) if hint == "./util"),
        "{err:?}"
    );
}

#[test]
fn side_effect_classification_travels_with_resolution() {
    let files = [
        ("/app/index.js", ""),
        ("/app/node_modules/pure/package.json", r#"{"sideEffects": false}"#),
        ("/app/node_modules/pure/index.js", ""),
        (
            "/app/node_modules/mixed/package.json",
            r#"{"sideEffects": ["./setup.js"]}"#,
        ),
        ("/app/node_modules/mixed/index.js", ""),
        ("/app/node_modules/mixed/setup.js", ""),
        ("/app/node_modules/plain/index.js", ""),
    ];
    let pure = resolve_ok(&files, "/app/index.js", "pure");
    assert_eq!(pure.side_effects.class, SideEffectClass::NoSideEffects);
    assert_eq!(
        pure.side_effects.declared_in,
        Some(PathBuf::from("/app/node_modules/pure/package.json"))
    );

    let mixed_index = resolve_ok(&files, "/app/index.js", "mixed");
    assert_eq!(mixed_index.side_effects.class, SideEffectClass::NoSideEffects);
    let mixed_setup = resolve_ok(&files, "/app/index.js", "mixed/setup.js");
    assert_eq!(mixed_setup.side_effects.class, SideEffectClass::HasSideEffects);

    let plain = resolve_ok(&files, "/app/index.js", "plain");
    assert_eq!(plain.side_effects.class, SideEffectClass::Unknown);
}

#[test]
fn data_url_fast_path() {
    let files = [("/app/index.js", "")];
    let resolution = resolve_ok(&files, "/app/index.js", "data:text/javascript,export%20{}");
    assert_eq!(resolution.namespace, Namespace::DataUrl);
    assert_eq!(resolution.loader, Loader::Js);
    assert_eq!(resolution.data.as_deref(), Some(b"export {}".as_slice()));
}

#[test]
fn symlinked_files_resolve_to_their_realpath() {
    let mut files = super::memory_fs::MemoryFS::new(&[
        ("/app/index.js", ""),
        ("/app/real/util.js", ""),
    ]);
    files.add_symlink(
        std::path::Path::new("/app/link.js"),
        std::path::Path::new("/app/real/util.js"),
    );
    let resolver = crate::ResolverGeneric::new(
        BuildOptions::default(),
        std::sync::Arc::new(crate::cache::Cache::new(files)),
        std::sync::Arc::new(crate::DiagnosticSink::default()),
    );
    let resolution = resolver
        .resolve(std::path::Path::new("/app/index.js"), "./link.js", ImportKind::EsmNamed)
        .unwrap();
    assert_eq!(resolution.path, PathBuf::from("/app/real/util.js"));
}

#[test]
fn browser_map_remaps_bare_specifiers() {
    let files = [
        ("/app/package.json", r#"{"browser": {"native-dep": "./shims/native.js"}}"#),
        ("/app/src/index.js", ""),
        ("/app/shims/native.js", ""),
    ];
    let mut options = entry_options(&[]);
    options.resolve.main_fields =
        vec!["browser".to_string(), "module".to_string(), "main".to_string()];
    let resolver = resolver_with(&files, options);
    let resolution = resolver
        .resolve(std::path::Path::new("/app/src/index.js"), "native-dep", ImportKind::EsmNamed)
        .unwrap();
    assert_eq!(resolution.path, PathBuf::from("/app/shims/native.js"));
}
