use crate::ecosystem::Ecosystem;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable, fully-resolved `(ecosystem, name, version)` triple.
///
/// Identity for deduplication purposes is `(ecosystem, normalized_name, version)` — see
/// [`PackageVersion::fingerprint`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageVersion {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub version: String,
}

impl PackageVersion {
    pub fn new(ecosystem: Ecosystem, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            ecosystem,
            name: name.into(),
            version: version.into(),
        }
    }

    /// The cache/dedup key: `(ecosystem, normalized_name, version)`.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            ecosystem: self.ecosystem,
            normalized_name: self.ecosystem.normalize_name(&self.name),
            version: self.version.clone(),
        }
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// The `(ecosystem, normalized_name, version)` identity used by the resolver's visited
/// set, the analyzer cache, and the trust filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub ecosystem: Ecosystem,
    pub normalized_name: String,
    pub version: String,
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.ecosystem, self.normalized_name, self.version)
    }
}

/// A single install target parsed off the command line, e.g. `lodash@^4` or
/// `requests[security]>=2.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInstallTarget {
    pub pkg_version: PackageVersion,
    pub extras: Vec<String>,
}

impl PackageInstallTarget {
    pub fn new(pkg_version: PackageVersion) -> Self {
        Self {
            pkg_version,
            extras: Vec::new(),
        }
    }

    pub fn with_extras(mut self, extras: Vec<String>) -> Self {
        self.extras = extras;
        self
    }

    /// True when no concrete version was given and a latest-version lookup is required.
    pub fn needs_latest_version(&self) -> bool {
        self.pkg_version.version.is_empty() || self.pkg_version.version == "latest"
    }
}

/// Output of the command parser (C1): argv normalized into install targets and manifest
/// install flags, regardless of which package manager issued it.
#[derive(Debug, Clone, Default)]
pub struct ParsedCommand {
    pub exe: String,
    pub args: Vec<String>,
    pub install_targets: Vec<PackageInstallTarget>,
    pub is_manifest_install: bool,
    pub manifest_files: Vec<String>,
}

impl ParsedCommand {
    pub fn is_installation_command(&self) -> bool {
        !self.install_targets.is_empty() || self.is_manifest_install
    }
}
