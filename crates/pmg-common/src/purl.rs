use crate::ecosystem::Ecosystem;
use std::fmt;

/// A parsed Package URL, e.g. `pkg:npm/lodash@4.17.21` or `pkg:pypi/requests`.
///
/// Only the subset PMG needs is modeled: ecosystem (`type`), `name`, and an optional
/// `version`. Namespaces/qualifiers are not round-tripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purl {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub version: Option<String>,
}

impl Purl {
    pub fn parse(s: &str) -> Result<Self, crate::error::PmgError> {
        let rest = s
            .strip_prefix("pkg:")
            .ok_or_else(|| crate::error::PmgError::invalid_argument(format!("not a purl: {s}")))?;
        let (type_and_name, version) = match rest.split_once('@') {
            Some((head, v)) => (head, Some(v.to_string())),
            None => (rest, None),
        };
        let (ecosystem_str, name) = type_and_name
            .split_once('/')
            .ok_or_else(|| crate::error::PmgError::invalid_argument(format!("malformed purl: {s}")))?;
        let ecosystem: Ecosystem = ecosystem_str.parse()?;
        if name.is_empty() {
            return Err(crate::error::PmgError::invalid_argument(format!(
                "purl missing package name: {s}"
            )));
        }
        Ok(Self {
            ecosystem,
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for Purl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "pkg:{}/{}@{}", self.ecosystem, self.name, v),
            None => write!(f, "pkg:{}/{}", self.ecosystem, self.name),
        }
    }
}

/// A pre-parsed entry from `trusted_packages` (§3, TrustedPackage). Parse failures at
/// config-load time downgrade the entry to inert rather than aborting the run.
#[derive(Debug, Clone)]
pub struct TrustedPackage {
    pub ecosystem: Ecosystem,
    pub name: String,
    /// Empty means "all versions of this package are trusted".
    pub version_or_empty: String,
}

impl TrustedPackage {
    /// Parse the configured PURL list, logging and dropping (never failing on) any
    /// entry that doesn't parse.
    pub fn parse_all(purls: &[String]) -> Vec<TrustedPackage> {
        purls
            .iter()
            .filter_map(|raw| match Purl::parse(raw) {
                Ok(purl) => Some(TrustedPackage {
                    ecosystem: purl.ecosystem,
                    name: purl.name,
                    version_or_empty: purl.version.unwrap_or_default(),
                }),
                Err(e) => {
                    tracing::warn!(purl = raw, error = %e, "disabling malformed trusted-package entry");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_version() {
        let p = Purl::parse("pkg:npm/lodash@4.17.21").unwrap();
        assert_eq!(p.to_string(), "pkg:npm/lodash@4.17.21");
    }

    #[test]
    fn round_trip_without_version() {
        let p = Purl::parse("pkg:pypi/requests").unwrap();
        assert_eq!(p.to_string(), "pkg:pypi/requests");
    }

    #[test]
    fn malformed_purl_is_rejected() {
        assert!(Purl::parse("not-a-purl").is_err());
        assert!(Purl::parse("pkg:npm/").is_err());
    }

    #[test]
    fn parse_all_skips_bad_entries_without_failing() {
        let entries = vec![
            "pkg:npm/lodash".to_string(),
            "garbage".to_string(),
            "pkg:pypi/requests@2.31.0".to_string(),
        ];
        let trusted = TrustedPackage::parse_all(&entries);
        assert_eq!(trusted.len(), 2);
    }
}
