pub mod ensure;
pub mod inspect;

use miette::{IntoDiagnostic, Result};
use sideload_core::Error;

/// Report a core error and bail out.
///
/// In JSON mode the error object goes to stdout as the command's single
/// output, with a stable `code`, and the process exits non-zero. Otherwise
/// the error surfaces as a diagnostic.
pub(crate) fn fail<T>(error: Error, json: bool) -> Result<T> {
    if json {
        let body = serde_json::json!({
            "error": {
                "code": error.code(),
                "message": error.to_string(),
            }
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&body).into_diagnostic()?
        );
        std::process::exit(1);
    }
    Err(error).into_diagnostic()
}
