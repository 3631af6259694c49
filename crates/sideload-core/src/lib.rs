#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

//! On-demand acquisition and loading of npm packages.
//!
//! Given one or more package identifiers, the [`Importer`] loads them from
//! a pre-existing local installation and, failing that, shells out to `npx`
//! to install them into a temporary session-scoped directory and loads them
//! from there. Intended for command-line tools that want optional or heavy
//! dependencies without forcing every user to install them up front.
//!
//! All contact with the outside world (module resolution, subprocess
//! execution, logging) goes through the [`Host`] and [`Logger`] traits, so
//! the whole resolution protocol is testable without touching the network
//! or a real npm installation.

pub mod builtins;
pub mod cache;
pub mod error;
pub mod host;
pub mod import;
pub mod pathscan;
pub mod spec;
pub mod version;

pub use cache::{InstallCache, InstallLocation};
pub use error::{codes as error_codes, Error};
pub use host::{Host, LoadedModule, Logger, NodeHost, TracingLogger};
pub use import::{ImportOptions, Importer};
pub use spec::PackageSpec;
pub use version::{install_preference, is_exact_version, Preference};
