//! Node.js core module names.
//!
//! Package identifiers whose name collides with a core module (`fs`,
//! `path`, ...) can never be registry packages and are rejected up front.
//! The check is on the bare name only: `fs/promises` parses to name `fs`
//! with a sub-path, so it rejects as `fs`.

/// Top-level Node.js core module names, sorted for binary search.
pub const NODE_BUILTINS: &[&str] = &[
    "assert",
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
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

/// Check whether `name` is a Node.js core module.
#[must_use]
pub fn is_builtin(name: &str) -> bool {
    NODE_BUILTINS.binary_search(&name).is_ok()
}
