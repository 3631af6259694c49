use crate::commands::fail;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use sideload_core::{is_exact_version, PackageSpec};

#[derive(Serialize)]
struct InspectReport {
    raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    package_name: String,
    name: String,
    version: String,
    exact_version: bool,
    path: String,
    name_with_path: String,
    cli_token: String,
}

/// Run the inspect command: parse a spec and show its derived fields.
pub fn run(spec: &str, json: bool) -> Result<()> {
    let parsed = match PackageSpec::parse(spec) {
        Ok(parsed) => parsed,
        Err(e) => return fail(e, json),
    };

    let report = InspectReport {
        raw: parsed.raw,
        scope: parsed.scope,
        package_name: parsed.package_name,
        name: parsed.name,
        exact_version: is_exact_version(&parsed.version),
        version: parsed.version,
        path: parsed.path,
        name_with_path: parsed.name_with_path,
        cli_token: parsed.cli_token,
    };

    if json {
        let body = serde_json::to_string_pretty(&report).into_diagnostic()?;
        println!("{body}");
    } else {
        println!("Name:            {}", report.name);
        println!(
            "Scope:           {}",
            report.scope.as_deref().unwrap_or("-")
        );
        println!(
            "Version:         {}{}",
            report.version,
            if report.exact_version { " (exact)" } else { "" }
        );
        println!(
            "Sub-path:        {}",
            if report.path.is_empty() {
                "-"
            } else {
                report.path.as_str()
            }
        );
        println!("Load specifier:  {}", report.name_with_path);
        println!("Install token:   {}", report.cli_token);
    }

    Ok(())
}
