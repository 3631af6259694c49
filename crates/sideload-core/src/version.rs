//! Install preference selection.
//!
//! Exact versions are safe to satisfy from npx's local cache without a
//! network round-trip; tags (`latest`, `beta`) and ranges (`^2.0.0`, `*`)
//! require asking the registry what they currently mean.

use crate::spec::PackageSpec;
use semver::Version;

/// Whether an install may be satisfied offline or must hit the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    Offline,
    Online,
}

impl Preference {
    /// The token used in `npx --prefer-<token>`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
        }
    }
}

/// Check whether `version` is an exact semantic version.
///
/// The `semver` crate enforces the strict grammar: numeric
/// major.minor.patch, optional pre-release and build metadata, no leading
/// zeros except the literal `0`.
#[must_use]
pub fn is_exact_version(version: &str) -> bool {
    Version::parse(version).is_ok()
}

/// Decide the install preference for a set of specs.
///
/// Offline only when every requested version is exact; any tag or range in
/// the set forces an online install.
pub fn install_preference<'a, I>(specs: I) -> Preference
where
    I: IntoIterator<Item = &'a PackageSpec>,
{
    if specs.into_iter().all(|s| is_exact_version(&s.version)) {
        Preference::Offline
    } else {
        Preference::Online
    }
}
