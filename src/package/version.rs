//! Version resolution for packages.
//!
//! Pure functions over a snapshot of published version strings. Strings that
//! do not parse as semantic versions are ignored rather than failing the
//! whole resolution.

use semver::Version;
use std::fmt;

/// The sentinel users pass to mean "whatever is newest".
pub const LATEST: &str = "latest";

/// Version constraint for selecting a published version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Highest published version, pre-releases included.
    Latest,
    /// Highest version with the same major as the base and not below it.
    Compatible(Version),
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Latest => write!(f, "{}", LATEST),
            VersionConstraint::Compatible(base) => write!(f, "^{}", base),
        }
    }
}

pub struct VersionResolver;

impl VersionResolver {
    /// Parse a version string, tolerating a leading `v`.
    pub fn parse(version: &str) -> Option<Version> {
        let trimmed = version.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        Version::parse(trimmed).ok()
    }

    pub fn is_latest(requested: &str) -> bool {
        requested.trim().eq_ignore_ascii_case(LATEST)
    }

    /// Resolve a constraint against a version list.
    ///
    /// Returns the matching entry exactly as it appears in `versions`.
    pub fn resolve<S: AsRef<str>>(
        versions: &[S],
        constraint: &VersionConstraint,
    ) -> Option<String> {
        match constraint {
            VersionConstraint::Latest => Self::resolve_latest(versions),
            VersionConstraint::Compatible(base) => Self::max_matching(versions, |v| {
                v.major == base.major && v >= base
            }),
        }
    }

    /// Highest version by semver precedence.
    pub fn resolve_latest<S: AsRef<str>>(versions: &[S]) -> Option<String> {
        Self::max_matching(versions, |_| true)
    }

    /// Highest version compatible with `base` (same major, not lower).
    ///
    /// Returns `None` if `base` itself is not a valid version.
    pub fn resolve_compatible<S: AsRef<str>>(base: &str, versions: &[S]) -> Option<String> {
        let base = Self::parse(base)?;
        Self::resolve(versions, &VersionConstraint::Compatible(base))
    }

    fn max_matching<S, F>(versions: &[S], accept: F) -> Option<String>
    where
        S: AsRef<str>,
        F: Fn(&Version) -> bool,
    {
        versions
            .iter()
            .filter_map(|raw| {
                let raw = raw.as_ref();
                match Self::parse(raw) {
                    Some(parsed) => Some((parsed, raw)),
                    None => {
                        log::debug!("Ignoring malformed version '{}'", raw);
                        None
                    }
                }
            })
            .filter(|(parsed, _)| accept(parsed))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, raw)| raw.to_string())
    }
}
