//! npx temporary install directory discovery.
//!
//! A package-runner invocation installs into a fresh temp directory and
//! prepends `<temp>/node_modules/.bin` to the child's PATH. We append a
//! "print PATH" command to the install invocation and scan the captured
//! output for that segment to recover the install root.
//!
//! The internals take an explicit `windows` flag so both platform parsers
//! are unit tested on any host; the public entry point picks the host
//! platform.

use crate::error::Error;
use std::path::PathBuf;

/// Marker inside npx's temp cache path on POSIX platforms.
const UNIX_MARKER: &str = "/.npm/_npx/";

/// Markers on Windows; npm has used both layouts.
const WINDOWS_MARKERS: &[&str] = &["\\npm-cache\\_npx\\", "\\npm\\cache\\_npx\\"];

/// The shell command that dumps the PATH variable.
#[must_use]
pub fn emit_path_command() -> &'static str {
    if cfg!(windows) {
        "set PATH"
    } else {
        "printenv PATH"
    }
}

/// Recover the `node_modules` install root from a PATH variable dump.
///
/// # Errors
/// Fails with `InstallDirNotFound` when no segment looks like an npx temp
/// directory, and `UnexpectedInstallLayout` when the matched segment is not
/// a `.../node_modules/.bin` leaf.
pub fn find_install_root(dump: &str) -> Result<PathBuf, Error> {
    find_install_root_for(dump, cfg!(windows))
}

fn find_install_root_for(dump: &str, windows: bool) -> Result<PathBuf, Error> {
    let bin_dir = find_temp_segment(dump, windows)?;

    let layout_err = || Error::UnexpectedInstallLayout {
        path: bin_dir.clone(),
    };

    // The segment is expected to end in node_modules/.bin: strip the final
    // component and check the one above it.
    let (root, _bin) = strip_last_component(&bin_dir, windows).ok_or_else(&layout_err)?;
    let (_, root_leaf) = strip_last_component(root, windows).ok_or_else(&layout_err)?;
    if root_leaf != "node_modules" {
        return Err(layout_err());
    }

    Ok(PathBuf::from(root))
}

fn find_temp_segment(dump: &str, windows: bool) -> Result<String, Error> {
    let segments = split_path_list(dump, windows);

    segments
        .iter()
        .find(|s| is_temp_segment(s, windows))
        .cloned()
        .ok_or_else(|| Error::InstallDirNotFound {
            segments: segments.join("\n"),
        })
}

/// Split a PATH dump into its segments.
///
/// On Windows the dump comes from `set PATH`, so it carries a `PATH=`
/// prefix and CRLF line endings; the list separator is `;` instead of `:`.
fn split_path_list(dump: &str, windows: bool) -> Vec<String> {
    if windows {
        let trimmed = dump.trim();
        let body = if trimmed.len() >= 5 && trimmed[..5].eq_ignore_ascii_case("PATH=") {
            &trimmed[5..]
        } else {
            trimmed
        };
        body.replace("\r\n", ";")
            .split(';')
            .map(str::to_string)
            .collect()
    } else {
        dump.trim().split(':').map(str::to_string).collect()
    }
}

fn is_temp_segment(segment: &str, windows: bool) -> bool {
    if windows {
        WINDOWS_MARKERS.iter().any(|m| segment.contains(m))
    } else {
        segment.contains(UNIX_MARKER)
    }
}

/// Split off the last path component, tolerating a trailing separator.
fn strip_last_component(path: &str, windows: bool) -> Option<(&str, &str)> {
    let sep = if windows { '\\' } else { '/' };
    let trimmed = path.trim_end_matches(sep);
    let idx = trimmed.rfind(sep)?;
    Some((&trimmed[..idx], &trimmed[idx + 1..]))
}
