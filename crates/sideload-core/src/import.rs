//! Import orchestration: try local, install what is missing, stitch the
//! results back together in input order.
//!
//! The [`Importer`] is the explicit context object for one session: it owns
//! the capability handles and the [`InstallCache`] recording where every
//! package came from. All capability calls are strictly sequential, so call
//! counts and ordering are observable by test doubles.

use crate::cache::{InstallCache, InstallLocation};
use crate::error::Error;
use crate::host::{Host, LoadedModule, Logger, NodeHost, TracingLogger};
use crate::pathscan;
use crate::spec::PackageSpec;
use crate::version::install_preference;
use std::path::PathBuf;

/// Minimum npm major version; earlier npx lacks the `-p`/`--prefer-*`
/// behavior this protocol depends on.
const MIN_NPM_MAJOR: u64 = 7;

/// The command used to probe the package runner.
const VERSION_COMMAND: &str = "npx --version";

/// Options controlling one import session.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// If true, the install fallback only runs when the process itself was
    /// launched by a package runner; otherwise plain local loading is used
    /// with no caching. Defaults to true.
    pub only_package_runner: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            only_package_runner: true,
        }
    }
}

/// Imports packages, installing missing ones into a temporary npx
/// directory, and answers where previous imports came from.
pub struct Importer {
    host: Box<dyn Host>,
    logger: Box<dyn Logger>,
    options: ImportOptions,
    cache: InstallCache,
}

impl Importer {
    /// Create an importer with the production host and logger.
    pub fn new() -> Result<Self, Error> {
        Ok(Self::with_host(Box::new(NodeHost::new()?)))
    }

    /// Create an importer around an explicit host (tests inject doubles
    /// here).
    #[must_use]
    pub fn with_host(host: Box<dyn Host>) -> Self {
        Self {
            host,
            logger: Box::new(TracingLogger),
            options: ImportOptions::default(),
            cache: InstallCache::new(),
        }
    }

    /// Replace the progress logger.
    #[must_use]
    pub fn logger(mut self, logger: Box<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    /// Set whether imports outside a package-runner context skip the
    /// install fallback.
    #[must_use]
    pub fn only_package_runner(mut self, only: bool) -> Self {
        self.options.only_package_runner = only;
        self
    }

    /// Where previously imported packages were resolved from.
    #[must_use]
    pub fn cache(&self) -> &InstallCache {
        &self.cache
    }

    /// Import a single package.
    pub fn import(&mut self, raw: &str) -> Result<LoadedModule, Error> {
        let mut results = self.import_all(&[raw])?;
        Ok(results.remove(0))
    }

    /// Import a batch of packages, returning results in input order.
    ///
    /// Parse errors and duplicate names surface before any I/O. A package
    /// that fails to load locally is not an error; it joins the missing set
    /// and one runner invocation installs the whole set.
    pub fn import_all(&mut self, raws: &[&str]) -> Result<Vec<LoadedModule>, Error> {
        let specs = parse_batch(raws)?;

        if self.options.only_package_runner && !self.host.in_package_runner() {
            // Not under npx/bunx: the ambient installation is expected to
            // have everything already. No fallback, no caching.
            let mut loaded = Vec::with_capacity(specs.len());
            for spec in &specs {
                loaded.push(self.host.load_module(&spec.name_with_path)?);
            }
            return Ok(loaded);
        }

        let mut slots: Vec<Option<LoadedModule>> = vec![None; specs.len()];
        let mut missing: Vec<usize> = Vec::new();

        for (i, spec) in specs.iter().enumerate() {
            match self.host.load_module(&spec.name_with_path) {
                Ok(module) => {
                    self.cache.mark_local(&spec.name);
                    slots[i] = Some(module);
                }
                // Absence locally is the "try remote" signal, not an error.
                Err(_) => missing.push(i),
            }
        }

        if !missing.is_empty() {
            let missing_specs: Vec<&PackageSpec> = missing.iter().map(|&i| &specs[i]).collect();
            let root = self.install_missing(&missing_specs)?;

            for &i in &missing {
                let spec = &specs[i];
                match self.host.load_module_relative(&root, &spec.name_with_path) {
                    Ok(module) => {
                        self.cache.mark_installed(&spec.name, &root);
                        slots[i] = Some(module);
                    }
                    Err(e) => {
                        return Err(Error::ImportAfterInstallFailed {
                            packages: join_load_specifiers(&missing_specs),
                            install_command: install_hint(&missing_specs),
                            source: Box::new(e),
                        });
                    }
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }

    /// Resolve the absolute location of a previously imported package.
    ///
    /// # Errors
    /// Fails with `NotYetResolved` when the package has not gone through a
    /// successful import in this session; parse errors apply as in
    /// [`PackageSpec::parse`].
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, Error> {
        let spec = PackageSpec::parse(raw)?;

        match self.cache.get(&spec.name) {
            None => Err(Error::NotYetResolved { name: spec.name }),
            Some(InstallLocation::Local) => self.host.resolve_path(&spec.name_with_path),
            Some(InstallLocation::TempDir(root)) => {
                self.host.resolve_path_relative(root, &spec.name_with_path)
            }
        }
    }

    /// Check the runner, install the missing set in one invocation, and
    /// return the temporary install root.
    fn install_missing(&mut self, missing: &[&PackageSpec]) -> Result<PathBuf, Error> {
        self.check_runner()?;

        let plural = if missing.len() == 1 { "" } else { "s" };
        self.logger.log(&format!(
            "Package{plural} {} not available locally. Attempting to use npx to install temporarily.",
            join_load_specifiers(missing),
        ));

        let preference = install_preference(missing.iter().copied());
        let tokens = missing
            .iter()
            .map(|s| format!("-p {}", s.cli_token))
            .collect::<Vec<_>>()
            .join(" ");
        let install_command = format!("npx --prefer-{} -y {tokens}", preference.as_str());
        self.logger.log(&format!("Installing... ({install_command})"));

        let stdout = self
            .host
            .run_command(&format!(
                "{install_command} {}",
                pathscan::emit_path_command()
            ))
            .map_err(|e| Error::InstallFailed {
                packages: missing
                    .iter()
                    .map(|s| format!("'{}'", s.name))
                    .collect::<Vec<_>>()
                    .join(", "),
                command: install_command.clone(),
                source: Box::new(e),
            })?;

        let root = pathscan::find_install_root(&stdout)?;

        self.logger.log(&format!(
            "Installed into {}. To skip this step in future, run: {}",
            root.display(),
            install_hint(missing),
        ));

        Ok(root)
    }

    fn check_runner(&mut self) -> Result<(), Error> {
        let reported = self
            .host
            .run_command(VERSION_COMMAND)
            .map_err(|e| Error::RunnerUnavailable {
                command: VERSION_COMMAND.to_string(),
                source: Box::new(e),
            })?;

        let major = semver::Version::parse(reported.trim()).map_or(0, |v| v.major);
        if major < MIN_NPM_MAJOR {
            return Err(Error::RunnerTooOld {
                found: reported,
                required: MIN_NPM_MAJOR,
            });
        }

        Ok(())
    }
}

/// Parse every raw spec and reject duplicate canonical names, before any
/// capability is touched.
fn parse_batch(raws: &[&str]) -> Result<Vec<PackageSpec>, Error> {
    if raws.is_empty() {
        return Err(Error::invalid_identifier("", ""));
    }

    let mut specs = Vec::with_capacity(raws.len());
    let mut seen: Vec<String> = Vec::new();

    for raw in raws {
        let spec = PackageSpec::parse(raw)?;
        if seen.contains(&spec.name) {
            return Err(Error::DuplicatePackage {
                name: spec.name,
                raw: (*raw).to_string(),
            });
        }
        seen.push(spec.name.clone());
        specs.push(spec);
    }

    Ok(specs)
}

fn join_load_specifiers(specs: &[&PackageSpec]) -> String {
    specs
        .iter()
        .map(|s| s.name_with_path.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The literal command a user can run to make the install permanent.
fn install_hint(specs: &[&PackageSpec]) -> String {
    format!(
        "npm install {}",
        specs
            .iter()
            .map(|s| s.cli_token.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use serde_json::json;
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    /// PATH dump the fake runner emits, and the install root it encodes.
    fn fake_runner_env() -> (String, PathBuf) {
        if cfg!(windows) {
            let root =
                PathBuf::from(r"C:\Users\u\AppData\Local\npm-cache\_npx\a1b2c3\node_modules");
            let dump = format!(r"PATH=C:\Windows\system32;{}\.bin;C:\Windows", root.display());
            (dump, root)
        } else {
            let root = PathBuf::from("/home/u/.npm/_npx/a1b2c3/node_modules");
            let dump = format!("/usr/local/bin:{}/.bin:/usr/bin", root.display());
            (dump, root)
        }
    }

    fn module(specifier: &str, origin: &str) -> LoadedModule {
        LoadedModule {
            specifier: specifier.to_string(),
            entry: PathBuf::from(format!("/{origin}/{specifier}")),
            manifest: json!({ "name": specifier, "origin": origin }),
        }
    }

    /// Recording host double. Every capability call is appended to `calls`.
    struct MockHost {
        in_runner: bool,
        local: Vec<&'static str>,
        installed: Vec<&'static str>,
        npx_version: Option<&'static str>,
        install_ok: bool,
        calls: Rc<RefCell<Vec<String>>>,
    }

    impl Default for MockHost {
        fn default() -> Self {
            Self {
                in_runner: true,
                local: Vec::new(),
                installed: Vec::new(),
                npx_version: Some("8.1.2"),
                install_ok: true,
                calls: Rc::new(RefCell::new(Vec::new())),
            }
        }
    }

    impl MockHost {
        fn record(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }
    }

    impl Host for MockHost {
        fn load_module(&self, specifier: &str) -> Result<LoadedModule, Error> {
            self.record(format!("load:{specifier}"));
            if self.local.contains(&specifier) {
                Ok(module(specifier, "local"))
            } else {
                Err(Error::module_not_found(specifier, "not found"))
            }
        }

        fn load_module_relative(
            &self,
            base: &Path,
            specifier: &str,
        ) -> Result<LoadedModule, Error> {
            self.record(format!("load_rel:{}:{specifier}", base.display()));
            if self.installed.contains(&specifier) {
                Ok(module(specifier, "installed"))
            } else {
                Err(Error::module_not_found(specifier, "not in install dir"))
            }
        }

        fn resolve_path(&self, specifier: &str) -> Result<PathBuf, Error> {
            self.record(format!("resolve:{specifier}"));
            Ok(PathBuf::from(format!("/ambient/{specifier}")))
        }

        fn resolve_path_relative(&self, base: &Path, specifier: &str) -> Result<PathBuf, Error> {
            self.record(format!("resolve_rel:{}:{specifier}", base.display()));
            Ok(base.join(specifier))
        }

        fn run_command(&self, command: &str) -> Result<String, Error> {
            self.record(format!("run:{command}"));
            if command == VERSION_COMMAND {
                return self.npx_version.map(str::to_string).ok_or_else(|| {
                    Error::CommandFailed {
                        command: command.to_string(),
                        detail: "command not found".to_string(),
                    }
                });
            }
            if self.install_ok {
                Ok(fake_runner_env().0)
            } else {
                Err(Error::CommandFailed {
                    command: command.to_string(),
                    detail: "EXPLODED TRYING TO INSTALL".to_string(),
                })
            }
        }

        fn in_package_runner(&self) -> bool {
            self.in_runner
        }
    }

    struct NullLogger;

    impl Logger for NullLogger {
        fn log(&self, _message: &str) {}
    }

    #[derive(Clone, Default)]
    struct TestLogger {
        lines: Rc<RefCell<Vec<String>>>,
    }

    impl Logger for TestLogger {
        fn log(&self, message: &str) {
            self.lines.borrow_mut().push(message.to_string());
        }
    }

    fn importer(mock: MockHost) -> Importer {
        Importer::with_host(Box::new(mock))
            .only_package_runner(false)
            .logger(Box::new(NullLogger))
    }

    #[test]
    fn test_single_local_import() {
        let mock = MockHost {
            local: vec!["left-pad"],
            ..MockHost::default()
        };
        let mut imp = importer(mock);

        let module = imp.import("left-pad").unwrap();
        assert_eq!(module.entry, PathBuf::from("/local/left-pad"));
        assert_eq!(imp.cache().get("left-pad"), Some(&InstallLocation::Local));
    }

    #[test]
    fn test_duplicate_package_fails_before_any_load() {
        for raws in [
            ["pkg-a", "pkg-a"],
            ["pkg-a@latest", "pkg-a"],
            ["pkg-a", "pkg-a@2.0.0"],
            // Differing sub-paths still collide on the canonical name
            ["pkg-a/path.js", "pkg-a/other.js"],
        ] {
            let mock = MockHost::default();
            let calls = mock.calls.clone();
            let mut imp = importer(mock);

            let err = imp.import_all(&raws).unwrap_err();
            assert_eq!(err.code(), codes::DUPLICATE_PACKAGE, "raws: {raws:?}");
            assert!(calls.borrow().is_empty(), "no capability calls expected");
        }
    }

    #[test]
    fn test_parse_errors_fail_fast() {
        for (raw, code) in [
            ("./relative", codes::RELATIVE_PATH_REJECTED),
            ("fs", codes::CORE_MODULE_REJECTED),
            ("not valid", codes::INVALID_IDENTIFIER),
        ] {
            let mock = MockHost::default();
            let calls = mock.calls.clone();
            let mut imp = importer(mock);

            let err = imp.import_all(&["pkg-ok", raw]).unwrap_err();
            assert_eq!(err.code(), code, "raw: {raw}");
            assert!(calls.borrow().is_empty());
        }
    }

    #[test]
    fn test_empty_batch_rejected() {
        let mut imp = importer(MockHost::default());
        let err = imp.import_all(&[]).unwrap_err();
        assert_eq!(err.code(), codes::INVALID_IDENTIFIER);
    }

    #[test]
    fn test_mixed_local_and_installed() {
        let (_, root) = fake_runner_env();
        let mock = MockHost {
            local: vec!["pkg-a"],
            installed: vec!["pkg-b"],
            ..MockHost::default()
        };
        let calls = mock.calls.clone();
        let mut imp = importer(mock);

        let results = imp.import_all(&["pkg-a", "pkg-b@1.2.3"]).unwrap();
        assert_eq!(results[0].entry, PathBuf::from("/local/pkg-a"));
        assert_eq!(results[1].entry, PathBuf::from("/installed/pkg-b"));

        // Exactly one runner invocation, naming only the missing package,
        // preferring offline because 1.2.3 is an exact version.
        let runs: Vec<String> = calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with("run:"))
            .cloned()
            .collect();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], format!("run:{VERSION_COMMAND}"));
        assert_eq!(
            runs[1],
            format!(
                "run:npx --prefer-offline -y -p pkg-b@1.2.3 {}",
                pathscan::emit_path_command()
            )
        );

        assert_eq!(imp.cache().get("pkg-a"), Some(&InstallLocation::Local));
        assert_eq!(
            imp.cache().get("pkg-b"),
            Some(&InstallLocation::TempDir(root))
        );
    }

    #[test]
    fn test_ranges_force_online_and_are_quoted() {
        let mock = MockHost {
            installed: vec!["pkg-a", "pkg-b"],
            ..MockHost::default()
        };
        let calls = mock.calls.clone();
        let mut imp = importer(mock);

        imp.import_all(&["pkg-a@>1.0.0", "pkg-b@*"]).unwrap();

        let install = calls
            .borrow()
            .iter()
            .find(|c| c.contains("--prefer-"))
            .cloned()
            .unwrap();
        assert!(install.contains("--prefer-online"), "got {install}");
        assert!(install.contains("-p 'pkg-a@>1.0.0' -p 'pkg-b@*'"), "got {install}");
    }

    #[test]
    fn test_capability_calls_are_sequential_in_input_order() {
        let (_, root) = fake_runner_env();
        let mock = MockHost {
            installed: vec!["pkg-a", "pkg-b"],
            ..MockHost::default()
        };
        let calls = mock.calls.clone();
        let mut imp = importer(mock);

        imp.import_all(&["pkg-a", "pkg-b"]).unwrap();

        let expected = vec![
            "load:pkg-a".to_string(),
            "load:pkg-b".to_string(),
            format!("run:{VERSION_COMMAND}"),
            format!(
                "run:npx --prefer-online -y -p pkg-a@latest -p pkg-b@latest {}",
                pathscan::emit_path_command()
            ),
            format!("load_rel:{}:pkg-a", root.display()),
            format!("load_rel:{}:pkg-b", root.display()),
        ];
        assert_eq!(*calls.borrow(), expected);
    }

    #[test]
    fn test_results_keep_input_order_regardless_of_origin() {
        let mock = MockHost {
            local: vec!["pkg-a"],
            installed: vec!["pkg-b"],
            ..MockHost::default()
        };
        let mut imp = importer(mock);

        let results = imp.import_all(&["pkg-b", "pkg-a"]).unwrap();
        assert_eq!(results[0].entry, PathBuf::from("/installed/pkg-b"));
        assert_eq!(results[1].entry, PathBuf::from("/local/pkg-a"));
    }

    #[test]
    fn test_runner_too_old_blocks_install() {
        let mock = MockHost {
            npx_version: Some("6.1.2"),
            ..MockHost::default()
        };
        let calls = mock.calls.clone();
        let mut imp = importer(mock);

        let err = imp.import("pkg-missing").unwrap_err();
        assert_eq!(err.code(), codes::RUNNER_TOO_OLD);
        assert!(err.to_string().contains("6.1.2"));

        // Version probe only; zero install attempts, zero relative loads.
        let runs: Vec<String> = calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with("run:") || c.starts_with("load_rel:"))
            .cloned()
            .collect();
        assert_eq!(runs, vec![format!("run:{VERSION_COMMAND}")]);
    }

    #[test]
    fn test_runner_unavailable() {
        let mock = MockHost {
            npx_version: None,
            ..MockHost::default()
        };
        let mut imp = importer(mock);

        let err = imp.import("pkg-missing").unwrap_err();
        assert_eq!(err.code(), codes::RUNNER_UNAVAILABLE);
    }

    #[test]
    fn test_install_failure_names_packages_and_command() {
        let mock = MockHost {
            install_ok: false,
            ..MockHost::default()
        };
        let mut imp = importer(mock);

        let err = imp.import("broken-install@^2.0.0").unwrap_err();
        assert_eq!(err.code(), codes::INSTALL_FAILED);
        let msg = err.to_string();
        assert!(msg.contains("'broken-install'"), "got {msg}");
        assert!(
            msg.contains("npx --prefer-online -y -p broken-install@^2.0.0"),
            "got {msg}"
        );
    }

    #[test]
    fn test_import_after_install_failure_carries_npm_install_hint() {
        // Install "succeeds" but the package never becomes loadable.
        let mock = MockHost::default();
        let mut imp = importer(mock);

        let err = imp.import("pkg-b@1.2.3").unwrap_err();
        assert_eq!(err.code(), codes::IMPORT_AFTER_INSTALL_FAILED);
        assert!(err.to_string().contains("npm install pkg-b@1.2.3"));
    }

    #[test]
    fn test_one_bad_relative_load_aborts_the_batch() {
        let mock = MockHost {
            installed: vec!["pkg-a"],
            ..MockHost::default()
        };
        let mut imp = importer(mock);

        let err = imp.import_all(&["pkg-a", "pkg-b"]).unwrap_err();
        assert_eq!(err.code(), codes::IMPORT_AFTER_INSTALL_FAILED);
        // The remediation covers the whole missing set
        assert!(err.to_string().contains("npm install pkg-a@latest pkg-b@latest"));
    }

    #[test]
    fn test_bypass_outside_package_runner() {
        let mock = MockHost {
            in_runner: false,
            local: vec!["pkg-a"],
            ..MockHost::default()
        };
        let calls = mock.calls.clone();
        let mut imp = Importer::with_host(Box::new(mock)).logger(Box::new(NullLogger));

        let module = imp.import("pkg-a").unwrap();
        assert_eq!(module.entry, PathBuf::from("/local/pkg-a"));
        // Plain load only: no caching, no runner machinery.
        assert!(imp.cache().is_empty());
        assert_eq!(*calls.borrow(), vec!["load:pkg-a".to_string()]);
    }

    #[test]
    fn test_bypass_propagates_load_failure() {
        let mock = MockHost {
            in_runner: false,
            ..MockHost::default()
        };
        let mut imp = Importer::with_host(Box::new(mock)).logger(Box::new(NullLogger));

        let err = imp.import("pkg-missing").unwrap_err();
        assert_eq!(err.code(), codes::MODULE_NOT_FOUND);
    }

    #[test]
    fn test_resolve_requires_prior_import() {
        let imp = importer(MockHost::default());
        let err = imp.resolve("never-imported").unwrap_err();
        assert_eq!(err.code(), codes::NOT_YET_RESOLVED);
    }

    #[test]
    fn test_resolve_reruns_the_parser() {
        let imp = importer(MockHost::default());
        assert_eq!(
            imp.resolve("./nope").unwrap_err().code(),
            codes::RELATIVE_PATH_REJECTED
        );
        assert_eq!(
            imp.resolve("fs").unwrap_err().code(),
            codes::CORE_MODULE_REJECTED
        );
    }

    #[test]
    fn test_resolve_local_and_installed() {
        let (_, root) = fake_runner_env();
        let mock = MockHost {
            local: vec!["pkg-a"],
            installed: vec!["pkg-b"],
            ..MockHost::default()
        };
        let mut imp = importer(mock);
        imp.import_all(&["pkg-a", "pkg-b"]).unwrap();

        assert_eq!(imp.resolve("pkg-a").unwrap(), PathBuf::from("/ambient/pkg-a"));
        assert_eq!(imp.resolve("pkg-b").unwrap(), root.join("pkg-b"));
        // Version and sub-path are ignored for the cache key
        assert_eq!(
            imp.resolve("pkg-b@9.9.9").unwrap(),
            root.join("pkg-b")
        );
    }

    #[test]
    fn test_progress_lines_pluralize() {
        let logger = TestLogger::default();
        let lines = logger.lines.clone();
        let mock = MockHost {
            installed: vec!["pkg-a", "pkg-b"],
            ..MockHost::default()
        };
        let mut imp = Importer::with_host(Box::new(mock))
            .only_package_runner(false)
            .logger(Box::new(logger));

        imp.import_all(&["pkg-a", "pkg-b"]).unwrap();
        {
            let lines = lines.borrow();
            assert!(lines[0].starts_with("Packages pkg-a, pkg-b not available locally"));
            assert!(lines[1].starts_with("Installing... (npx --prefer-online"));
            assert!(lines[2].starts_with("Installed into"));
        }

        // Single missing package logs the singular form
        let logger = TestLogger::default();
        let lines = logger.lines.clone();
        let mock = MockHost {
            installed: vec!["pkg-a"],
            ..MockHost::default()
        };
        let mut imp = Importer::with_host(Box::new(mock))
            .only_package_runner(false)
            .logger(Box::new(logger));

        imp.import("pkg-a").unwrap();
        assert!(lines.borrow()[0].starts_with("Package pkg-a not available locally"));
    }
}
