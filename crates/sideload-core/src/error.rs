//! Error types for the import surface.

use thiserror::Error;

/// Stable error codes for machine-readable output.
pub mod codes {
    pub const INVALID_IDENTIFIER: &str = "INVALID_IDENTIFIER";
    pub const RELATIVE_PATH_REJECTED: &str = "RELATIVE_PATH_REJECTED";
    pub const CORE_MODULE_REJECTED: &str = "CORE_MODULE_REJECTED";
    pub const DUPLICATE_PACKAGE: &str = "DUPLICATE_PACKAGE";
    pub const RUNNER_UNAVAILABLE: &str = "RUNNER_UNAVAILABLE";
    pub const RUNNER_TOO_OLD: &str = "RUNNER_TOO_OLD";
    pub const INSTALL_FAILED: &str = "INSTALL_FAILED";
    pub const INSTALL_DIR_NOT_FOUND: &str = "INSTALL_DIR_NOT_FOUND";
    pub const UNEXPECTED_INSTALL_LAYOUT: &str = "UNEXPECTED_INSTALL_LAYOUT";
    pub const IMPORT_AFTER_INSTALL_FAILED: &str = "IMPORT_AFTER_INSTALL_FAILED";
    pub const NOT_YET_RESOLVED: &str = "NOT_YET_RESOLVED";
    pub const COMMAND_FAILED: &str = "COMMAND_FAILED";
    pub const MODULE_NOT_FOUND: &str = "MODULE_NOT_FOUND";
    pub const IO_ERROR: &str = "IO_ERROR";
}

/// Errors raised while parsing, importing or resolving packages.
///
/// Every variant is terminal for the call that produced it; nothing is
/// retried internally. A failed local load of an individual package is not
/// an error at all -- it is the signal to fall back to a temporary install.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid package identifier: parsed name '{name}' from '{raw}'")]
    InvalidIdentifier { name: String, raw: String },

    #[error("cannot import relative paths: got '{raw}'")]
    RelativePathRejected { raw: String },

    #[error("can only import registry packages, got core module '{module}' from '{raw}'")]
    CoreModuleRejected { module: String, raw: String },

    #[error("cannot import the same package twice: got '{raw}' but already saw '{name}' earlier")]
    DuplicatePackage { name: String, raw: String },

    #[error("couldn't execute '{command}', is npm installed and up-to-date?")]
    RunnerUnavailable {
        command: String,
        #[source]
        source: Box<Error>,
    },

    #[error("npm version {required}+ is required, got '{found}' when running 'npx --version'")]
    RunnerTooOld { found: String, required: u64 },

    #[error("failed installing {packages} using: {command}")]
    InstallFailed {
        packages: String,
        command: String,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to find a temporary install directory in:\n{segments}")]
    InstallDirNotFound { segments: String },

    #[error("found temporary path '{path}' but expected a node_modules directory above it")]
    UnexpectedInstallLayout { path: String },

    #[error("import failed for {packages}\n\nYou should install {packages} locally:\n    {install_command}")]
    ImportAfterInstallFailed {
        packages: String,
        install_command: String,
        #[source]
        source: Box<Error>,
    },

    #[error("package '{name}' must be imported before it can be resolved")]
    NotYetResolved { name: String },

    #[error("failed executing '{command}': {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("cannot find module '{specifier}': {detail}")]
    ModuleNotFound { specifier: String, detail: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid identifier error.
    pub fn invalid_identifier(name: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            name: name.into(),
            raw: raw.into(),
        }
    }

    /// Create a module not found error.
    pub fn module_not_found(specifier: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ModuleNotFound {
            specifier: specifier.into(),
            detail: detail.into(),
        }
    }

    /// The stable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier { .. } => codes::INVALID_IDENTIFIER,
            Self::RelativePathRejected { .. } => codes::RELATIVE_PATH_REJECTED,
            Self::CoreModuleRejected { .. } => codes::CORE_MODULE_REJECTED,
            Self::DuplicatePackage { .. } => codes::DUPLICATE_PACKAGE,
            Self::RunnerUnavailable { .. } => codes::RUNNER_UNAVAILABLE,
            Self::RunnerTooOld { .. } => codes::RUNNER_TOO_OLD,
            Self::InstallFailed { .. } => codes::INSTALL_FAILED,
            Self::InstallDirNotFound { .. } => codes::INSTALL_DIR_NOT_FOUND,
            Self::UnexpectedInstallLayout { .. } => codes::UNEXPECTED_INSTALL_LAYOUT,
            Self::ImportAfterInstallFailed { .. } => codes::IMPORT_AFTER_INSTALL_FAILED,
            Self::NotYetResolved { .. } => codes::NOT_YET_RESOLVED,
            Self::CommandFailed { .. } => codes::COMMAND_FAILED,
            Self::ModuleNotFound { .. } => codes::MODULE_NOT_FOUND,
            Self::Io(_) => codes::IO_ERROR,
        }
    }
}
