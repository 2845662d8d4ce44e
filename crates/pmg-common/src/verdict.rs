use crate::package::PackageVersion;
use serde::{Deserialize, Serialize};

/// The malware-analysis verdict for a single package version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerdictKind {
    Safe,
    Suspicious,
    Malicious,
    Unknown,
    Error,
}

impl VerdictKind {
    /// Resolve an `Unknown` verdict per the analyzer's mode (§3, AnalysisVerdict).
    ///
    /// Default mode treats unknown as safe; paranoid/active-scan mode treats it as
    /// suspicious because the user opted into active scanning.
    pub fn resolve_unknown(self, paranoid: bool) -> Self {
        match self {
            VerdictKind::Unknown if paranoid => VerdictKind::Suspicious,
            VerdictKind::Unknown => VerdictKind::Safe,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisVerdict {
    pub pkg_version: PackageVersion,
    pub kind: VerdictKind,
    pub summary: Option<String>,
    pub reference_url: Option<String>,
}

impl AnalysisVerdict {
    pub fn new(pkg_version: PackageVersion, kind: VerdictKind) -> Self {
        Self {
            pkg_version,
            kind,
            summary: None,
            reference_url: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_reference_url(mut self, url: impl Into<String>) -> Self {
        self.reference_url = Some(url.into());
        self
    }
}

/// Aggregate result of a guard-mode run (C6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardResult {
    pub total_analyzed: usize,
    pub trusted_skipped: usize,
    pub allowed_count: usize,
    pub confirmed_count: usize,
    pub blocked_count: usize,
    pub blocked_packages: Vec<AnalysisVerdict>,
    pub confirmed_packages: Vec<AnalysisVerdict>,
    pub was_user_cancelled: bool,
}
