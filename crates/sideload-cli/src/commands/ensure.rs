use crate::commands::fail;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use serde_json::Value;
use sideload_core::{Importer, InstallLocation, NodeHost, PackageSpec};
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct EnsureReport {
    packages: Vec<EnsurePackage>,
}

#[derive(Serialize)]
struct EnsurePackage {
    specifier: String,
    entry: PathBuf,
    /// "local" or "temporary"
    location: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    install_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

/// Run the ensure command.
///
/// When `json` is true, outputs a single JSON object to stdout.
/// Otherwise, outputs one human-readable line per package.
pub fn run(cwd: &Path, packages: &[String], standalone: bool, json: bool) -> Result<()> {
    let mut importer = Importer::with_host(Box::new(NodeHost::with_cwd(cwd)))
        .only_package_runner(!standalone);

    let raws: Vec<&str> = packages.iter().map(String::as_str).collect();
    let modules = match importer.import_all(&raws) {
        Ok(modules) => modules,
        Err(e) => return fail(e, json),
    };

    let mut report = EnsureReport {
        packages: Vec::with_capacity(modules.len()),
    };
    for (raw, module) in raws.iter().zip(&modules) {
        // Already validated by the import; re-parse for the canonical name.
        let spec = PackageSpec::parse(raw).into_diagnostic()?;
        let (location, install_root) = match importer.cache().get(&spec.name) {
            Some(InstallLocation::TempDir(root)) => ("temporary", Some(root.clone())),
            // No cache entry means the package-runner bypass loaded it
            // directly from the ambient installation.
            Some(InstallLocation::Local) | None => ("local", None),
        };
        report.packages.push(EnsurePackage {
            specifier: module.specifier.clone(),
            entry: module.entry.clone(),
            location,
            install_root,
            version: module
                .manifest
                .get("version")
                .and_then(Value::as_str)
                .map(str::to_string),
        });
    }

    if json {
        let body = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{body}");
    } else {
        for pkg in &report.packages {
            match &pkg.install_root {
                Some(root) => println!(
                    "ok {} -> {} (temporary install at {})",
                    pkg.specifier,
                    pkg.entry.display(),
                    root.display()
                ),
                None => println!("ok {} -> {} (local)", pkg.specifier, pkg.entry.display()),
            }
        }
    }

    Ok(())
}
