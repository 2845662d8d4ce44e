//! PyPI registry client: dependency lookups against pypi.org's JSON API.

use crate::client::{EcosystemClient, RawDependency};
use crate::error::{RegistryError, RegistryResult};
use crate::http::HttpBackend;
use crate::semver_lite;
use async_trait::async_trait;
use pmg_common::{Ecosystem, PackageVersion};

const DEFAULT_INDEX: &str = "https://pypi.org/pypi";

pub struct PyPiClient {
    http: HttpBackend,
    index_url: String,
}

impl PyPiClient {
    pub fn new() -> RegistryResult<Self> {
        Self::with_index_url(DEFAULT_INDEX.to_string())
    }

    pub fn with_index_url(index_url: String) -> RegistryResult<Self> {
        Ok(Self {
            http: HttpBackend::new("pmg/0.1 (+https://github.com/safedep/pmg)")?,
            index_url,
        })
    }

    async fn fetch_project(&self, name: &str) -> RegistryResult<serde_json::Value> {
        let url = format!("{}/{}/json", self.index_url, name);
        self.http.get_json(&url).await
    }

    async fn fetch_release(&self, name: &str, version: &str) -> RegistryResult<serde_json::Value> {
        let url = format!("{}/{}/{}/json", self.index_url, name, version);
        self.http.get_json(&url).await
    }
}

/// PyPI's `pip_get_matching_version`: pick the highest known version satisfying a
/// single comparator constraint from `{==, >=, <=, !=, >, <, ~=}`.
pub fn pip_get_matching_version<'a>(
    versions: impl Iterator<Item = &'a str>,
    spec: &str,
) -> Option<&'a str> {
    let spec = spec.trim();
    if spec.is_empty() {
        return semver_lite::highest_satisfying(versions, None, "");
    }
    for op in ["==", ">=", "<=", "!=", "~=", ">", "<"] {
        if let Some(rest) = spec.strip_prefix(op) {
            return semver_lite::highest_satisfying(versions, Some(op), rest.trim());
        }
    }
    // Bare version with no operator: treat as exact.
    semver_lite::highest_satisfying(versions, Some("=="), spec)
}

#[async_trait]
impl EcosystemClient for PyPiClient {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::PyPi
    }

    async fn resolve_latest_version(&self, name: &str) -> RegistryResult<String> {
        let doc = self.fetch_project(name).await?;
        doc.get("info")
            .and_then(|info| info.get("version"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| RegistryError::InvalidResponse {
                message: format!("no info.version for {name}"),
            })
    }

    async fn resolve_dependencies(
        &self,
        pkg: &PackageVersion,
        include_dev: bool,
    ) -> RegistryResult<Vec<RawDependency>> {
        let doc = self.fetch_release(&pkg.name, &pkg.version).await?;
        let requires_dist = doc
            .get("info")
            .and_then(|info| info.get("requires_dist"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let mut deps = Vec::new();
        for entry in requires_dist {
            let Some(raw) = entry.as_str() else { continue };
            // Extras-gated requirements look like `pytest ; extra == "dev"` — PyPI has
            // no first-class dev-dependency concept, so this is our approximation of one.
            let is_extra_gated = raw.contains("extra ==");
            if is_extra_gated && !include_dev {
                continue;
            }
            if let Some(dep) = parse_requires_dist_entry(raw) {
                deps.push(RawDependency {
                    name: dep.0,
                    version_spec: dep.1,
                    dev: is_extra_gated,
                });
            }
        }
        Ok(deps)
    }

    async fn resolve_version_spec(&self, name: &str, spec: &str) -> RegistryResult<String> {
        let cleaned = spec.trim();
        if cleaned.is_empty() || cleaned == "*" {
            return self.resolve_latest_version(name).await;
        }
        let doc = self.fetch_project(name).await?;
        let versions: Vec<&str> = doc
            .get("releases")
            .and_then(|v| v.as_object())
            .map(|obj| obj.keys().map(String::as_str).collect())
            .unwrap_or_default();
        pip_get_matching_version(versions.into_iter(), cleaned)
            .map(str::to_string)
            .ok_or_else(|| RegistryError::NoMatchingVersion {
                name: name.to_string(),
                constraint: spec.to_string(),
            })
    }
}

/// Parse one `requires_dist` entry: `name[extra1,extra2] (>=1.0,<2.0) ; marker`.
/// Only the first comparator is kept — good enough for "what name+constraint should we
/// resolve", which is all the resolver needs.
fn parse_requires_dist_entry(raw: &str) -> Option<(String, String)> {
    let without_marker = raw.split(';').next().unwrap_or(raw).trim();
    let name_end = without_marker
        .find(|c: char| c == '[' || c == '(' || c.is_whitespace())
        .unwrap_or(without_marker.len());
    let name = without_marker[..name_end].trim().to_string();
    if name.is_empty() {
        return None;
    }
    let constraint_start = without_marker.find('(');
    let spec = if let Some(start) = constraint_start {
        without_marker[start..]
            .trim_start_matches('(')
            .trim_end_matches(')')
            .split(',')
            .next()
            .unwrap_or("")
            .trim()
            .to_string()
    } else {
        without_marker[name_end..].trim().to_string()
    };
    Some((name, spec))
}
