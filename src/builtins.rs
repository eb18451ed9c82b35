//! Node.js builtin module names.

/// Sorted for binary search.
pub const NODEJS_BUILTINS: &[&str] = &[
    "assert",
    "assert/strict",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "dns/promises",
    "domain",
    "events",
    "fs",
    "fs/promises",
    "http",
    "http2",
    "https",
    "inspector",
    "inspector/promises",
    "module",
    "net",
    "os",
    "path",
    "path/posix",
    "path/win32",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "readline/promises",
    "repl",
    "stream",
    "stream/consumers",
    "stream/promises",
    "stream/web",
    "string_decoder",
    "timers",
    "timers/promises",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "util/types",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// Whether `specifier` names a Node builtin, with or without the `node:`
/// scheme.
pub fn is_builtin_module(specifier: &str) -> bool {
    specifier.starts_with("node:")
        || NODEJS_BUILTINS.binary_search(&specifier).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_is_sorted() {
        assert!(NODEJS_BUILTINS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn detection() {
        assert!(is_builtin_module("fs"));
        assert!(is_builtin_module("fs/promises"));
        assert!(is_builtin_module("node:anything"));
        assert!(!is_builtin_module("lodash"));
    }
}
