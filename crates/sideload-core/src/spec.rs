//! Package spec parsing.
//!
//! Parses package identifiers like:
//! - `left-pad`
//! - `react@18.2.0`
//! - `@types/node@^20`
//! - `@scope/pkg@beta/sub/path.js`
//!
//! The grammar is `[@scope/]name[@version][/sub/path]`. Strings starting
//! with `.` or `/` are filesystem paths, never package identifiers.

use crate::builtins::is_builtin;
use crate::error::Error;
use regex_lite::Regex;
use std::sync::OnceLock;

/// npm's registry limit on package name length.
const MAX_NAME_LEN: usize = 214;

/// Names the registry reserves and will never serve.
const RESERVED_NAMES: &[&str] = &["favicon.ico", "node_modules"];

/// Characters in a version token that the shell would interpret.
const SHELL_META: &[char] = &['<', '>', '*'];

fn spec_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^((?:(?:@([a-z0-9-][a-z0-9-_.]*))/)?([a-z0-9-][a-z0-9-_.]+))(?:@([^/]+))?(/.*)?$")
            .expect("spec grammar is a valid regex")
    })
}

/// A parsed package specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// The original string, untouched.
    pub raw: String,
    /// Scope without the @ prefix, if scoped.
    pub scope: Option<String>,
    /// Package name without the scope.
    pub package_name: String,
    /// Full package name (e.g. `@scope/name` or `name`). The canonical
    /// identity key: unique within one import batch.
    pub name: String,
    /// Requested version or tag. `latest` when omitted, which is a request
    /// for the latest tag, not an exact version.
    pub version: String,
    /// Sub-path suffix including its leading `/`, empty when absent.
    pub path: String,
    /// Name plus sub-path; the specifier actually handed to the loader.
    pub name_with_path: String,
    /// `name@version` for the npx command line, single-quoted when the
    /// version contains shell-meaningful characters.
    pub cli_token: String,
}

impl PackageSpec {
    /// Parse a package identifier string.
    ///
    /// # Errors
    /// Fails with `RelativePathRejected` for strings starting with `.` or
    /// `/`, `CoreModuleRejected` when the name is a Node core module, and
    /// `InvalidIdentifier` for anything else outside the grammar.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        if raw.starts_with('.') || raw.starts_with('/') {
            return Err(Error::RelativePathRejected {
                raw: raw.to_string(),
            });
        }

        let Some(caps) = spec_regex().captures(raw) else {
            return Err(Error::invalid_identifier(raw, raw));
        };

        let name = caps.get(1).map_or("", |m| m.as_str());
        let scope = caps.get(2).map(|m| m.as_str().to_string());
        let package_name = caps.get(3).map_or("", |m| m.as_str());
        let version = caps.get(4).map_or("latest", |m| m.as_str());
        let path = caps.get(5).map_or("", |m| m.as_str());

        if name.is_empty() || name.len() > MAX_NAME_LEN || RESERVED_NAMES.contains(&name) {
            return Err(Error::invalid_identifier(name, raw));
        }

        if is_builtin(name) {
            return Err(Error::CoreModuleRejected {
                module: name.to_string(),
                raw: raw.to_string(),
            });
        }

        let cli_token = if version.contains(SHELL_META) {
            format!("'{name}@{version}'")
        } else {
            format!("{name}@{version}")
        };

        Ok(Self {
            raw: raw.to_string(),
            scope,
            package_name: package_name.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            path: path.to_string(),
            name_with_path: format!("{name}{path}"),
            cli_token,
        })
    }

    /// Check if this is a scoped package.
    #[must_use]
    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }
}
