//! Capability boundary for module loading, path resolution and shell
//! execution.
//!
//! The importer only talks to the outside world through the [`Host`] and
//! [`Logger`] traits, so tests can substitute recording doubles for all
//! I/O. [`NodeHost`] is the production implementation: it resolves bare
//! specifiers against `node_modules` directories on disk, the way Node's
//! `require.resolve` does for the common cases, and shells out for
//! subprocess work.

use crate::error::Error;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable npm and bun set on children of `npx`/`bunx`.
const LIFECYCLE_EVENT_ENV: &str = "npm_lifecycle_event";

/// Lifecycle events that mean "running under a package runner".
const PACKAGE_RUNNER_EVENTS: &[&str] = &["npx", "bunx"];

/// Extensions probed when a specifier does not name a file directly.
const PROBE_EXTENSIONS: &[&str] = &[".js", ".json"];

/// A module located on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModule {
    /// The specifier that was asked for (name plus optional sub-path).
    pub specifier: String,
    /// Absolute path of the resolved entry file.
    pub entry: PathBuf,
    /// Parsed `package.json` of the owning package, `Null` if it has none.
    pub manifest: Value,
}

/// The injectable capabilities the importer needs from its environment.
pub trait Host {
    /// Load a module by bare specifier from the ambient installation.
    fn load_module(&self, specifier: &str) -> Result<LoadedModule, Error>;

    /// Load a module by bare specifier relative to an install root.
    fn load_module_relative(&self, base: &Path, specifier: &str) -> Result<LoadedModule, Error>;

    /// Resolve a bare specifier to an absolute path.
    fn resolve_path(&self, specifier: &str) -> Result<PathBuf, Error>;

    /// Resolve a bare specifier relative to an install root.
    fn resolve_path_relative(&self, base: &Path, specifier: &str) -> Result<PathBuf, Error>;

    /// Run a shell command, returning trimmed stdout.
    fn run_command(&self, command: &str) -> Result<String, Error>;

    /// Whether this process was itself launched by a package runner.
    fn in_package_runner(&self) -> bool;
}

/// Sink for human-readable progress lines. Failures never travel through
/// here; they surface as [`Error`]s.
pub trait Logger {
    fn log(&self, message: &str);
}

/// Default logger: forwards progress lines to the `tracing` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        tracing::info!("{message}");
    }
}

/// Production [`Host`] backed by the filesystem and the system shell.
#[derive(Debug, Clone)]
pub struct NodeHost {
    /// Directory bare-specifier resolution starts from.
    cwd: PathBuf,
}

impl NodeHost {
    /// Create a host rooted at the current working directory.
    pub fn new() -> Result<Self, Error> {
        Ok(Self {
            cwd: std::env::current_dir()?,
        })
    }

    /// Create a host rooted at an explicit directory.
    #[must_use]
    pub fn with_cwd(cwd: &Path) -> Self {
        Self {
            cwd: cwd.to_path_buf(),
        }
    }

    /// Find `node_modules/<name>` by walking up from `start`.
    fn find_package_dir(start: &Path, name: &str) -> Option<PathBuf> {
        let mut current = start.to_path_buf();

        loop {
            let candidate = current.join("node_modules").join(name);
            if candidate.is_dir() {
                return Some(candidate);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    fn package_dir(&self, specifier: &str) -> Result<PathBuf, Error> {
        let (name, _) = split_specifier(specifier);
        Self::find_package_dir(&self.cwd, name).ok_or_else(|| {
            Error::module_not_found(
                specifier,
                format!("no node_modules/{name} found from {}", self.cwd.display()),
            )
        })
    }

    fn package_dir_relative(&self, base: &Path, specifier: &str) -> Result<PathBuf, Error> {
        let (name, _) = split_specifier(specifier);
        let in_node_modules = base.file_name().is_some_and(|n| n == "node_modules");
        let dir = if in_node_modules {
            base.join(name)
        } else {
            base.join("node_modules").join(name)
        };

        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(Error::module_not_found(
                specifier,
                format!("'{name}' is not installed under {}", base.display()),
            ))
        }
    }

    fn load_from(&self, pkg_dir: &Path, specifier: &str) -> Result<LoadedModule, Error> {
        let (_, sub_path) = split_specifier(specifier);
        let entry = resolve_entry(pkg_dir, specifier, sub_path)?;
        let manifest = read_manifest(pkg_dir, specifier)?;
        Ok(LoadedModule {
            specifier: specifier.to_string(),
            entry,
            manifest,
        })
    }
}

impl Host for NodeHost {
    fn load_module(&self, specifier: &str) -> Result<LoadedModule, Error> {
        let pkg_dir = self.package_dir(specifier)?;
        self.load_from(&pkg_dir, specifier)
    }

    fn load_module_relative(&self, base: &Path, specifier: &str) -> Result<LoadedModule, Error> {
        let pkg_dir = self.package_dir_relative(base, specifier)?;
        self.load_from(&pkg_dir, specifier)
    }

    fn resolve_path(&self, specifier: &str) -> Result<PathBuf, Error> {
        let pkg_dir = self.package_dir(specifier)?;
        let (_, sub_path) = split_specifier(specifier);
        resolve_entry(&pkg_dir, specifier, sub_path)
    }

    fn resolve_path_relative(&self, base: &Path, specifier: &str) -> Result<PathBuf, Error> {
        let pkg_dir = self.package_dir_relative(base, specifier)?;
        let (_, sub_path) = split_specifier(specifier);
        resolve_entry(&pkg_dir, specifier, sub_path)
    }

    fn run_command(&self, command: &str) -> Result<String, Error> {
        let output = shell_command(command)
            .output()
            .map_err(|e| Error::CommandFailed {
                command: command.to_string(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("exit status {}", output.status)
            } else {
                stderr
            };
            return Err(Error::CommandFailed {
                command: command.to_string(),
                detail,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn in_package_runner(&self) -> bool {
        std::env::var(LIFECYCLE_EVENT_ENV)
            .is_ok_and(|v| PACKAGE_RUNNER_EVENTS.contains(&v.as_str()))
    }
}

/// Split a specifier into package name and optional sub-path.
///
/// For `@scope/name/sub/file.js` the name spans the first two components.
fn split_specifier(specifier: &str) -> (&str, Option<&str>) {
    let name_end = if specifier.starts_with('@') {
        specifier
            .find('/')
            .and_then(|first| specifier[first + 1..].find('/').map(|i| first + 1 + i))
    } else {
        specifier.find('/')
    };

    match name_end {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..])),
        None => (specifier, None),
    }
}

/// Resolve the entry file inside an already-located package directory.
fn resolve_entry(pkg_dir: &Path, specifier: &str, sub_path: Option<&str>) -> Result<PathBuf, Error> {
    if let Some(sub) = sub_path {
        let direct = pkg_dir.join(sub);
        if direct.is_file() {
            return Ok(normalize(direct));
        }
        for ext in PROBE_EXTENSIONS {
            let candidate = pkg_dir.join(format!("{sub}{ext}"));
            if candidate.is_file() {
                return Ok(normalize(candidate));
            }
        }
        let index = direct.join("index.js");
        if index.is_file() {
            return Ok(normalize(index));
        }
        return Err(Error::module_not_found(
            specifier,
            format!("no file for sub-path '{sub}' in {}", pkg_dir.display()),
        ));
    }

    let manifest = read_manifest(pkg_dir, specifier)?;
    if let Some(main) = manifest.get("main").and_then(Value::as_str) {
        let main_path = pkg_dir.join(main);
        if main_path.is_file() {
            return Ok(normalize(main_path));
        }
        for ext in PROBE_EXTENSIONS {
            let candidate = pkg_dir.join(format!("{main}{ext}"));
            if candidate.is_file() {
                return Ok(normalize(candidate));
            }
        }
        let index = main_path.join("index.js");
        if index.is_file() {
            return Ok(normalize(index));
        }
    }

    let index = pkg_dir.join("index.js");
    if index.is_file() {
        return Ok(normalize(index));
    }

    Err(Error::module_not_found(
        specifier,
        format!("no entry point in {}", pkg_dir.display()),
    ))
}

/// Read and parse a package's `package.json`, `Null` when absent.
fn read_manifest(pkg_dir: &Path, specifier: &str) -> Result<Value, Error> {
    let manifest_path = pkg_dir.join("package.json");
    if !manifest_path.is_file() {
        return Ok(Value::Null);
    }

    let text = std::fs::read_to_string(&manifest_path)?;
    serde_json::from_str(&text)
        .map_err(|e| Error::module_not_found(specifier, format!("invalid package.json: {e}")))
}

/// Canonicalize without Windows UNC verbosity; fall back to the input.
fn normalize(path: PathBuf) -> PathBuf {
    dunce::canonicalize(&path).unwrap_or(path)
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    use std::os::windows::process::CommandExt;

    // Keep transient console windows from flashing up.
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;

    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd.creation_flags(CREATE_NO_WINDOW);
    cmd
}
