//! npm registry client: dependency lookups against registry.npmjs.org.

use crate::client::{EcosystemClient, RawDependency};
use crate::error::{RegistryError, RegistryResult};
use crate::http::HttpBackend;
use crate::semver_lite;
use async_trait::async_trait;
use pmg_common::{Ecosystem, PackageVersion};

const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

pub struct NpmClient {
    http: HttpBackend,
    registry_url: String,
}

impl NpmClient {
    pub fn new() -> RegistryResult<Self> {
        Self::with_registry_url(DEFAULT_REGISTRY.to_string())
    }

    pub fn with_registry_url(registry_url: String) -> RegistryResult<Self> {
        Ok(Self {
            http: HttpBackend::new("pmg/0.1 (+https://github.com/safedep/pmg)")?,
            registry_url,
        })
    }

    async fn fetch_package_doc(&self, name: &str) -> RegistryResult<serde_json::Value> {
        let encoded = encode_package_name(name);
        let url = format!("{}/{}", self.registry_url, encoded);
        self.http.get_json(&url).await
    }
}

/// Scoped package names (`@scope/name`) must have their `/` percent-encoded for the
/// npm registry's flat package-document path.
fn encode_package_name(name: &str) -> String {
    name.replace('/', "%2f")
}

/// npm's version-spec cleaner (§4.1): strip a single leading `^` or `~`; `*` or empty
/// becomes `latest`.
pub fn npm_clean_version(spec: &str) -> String {
    let trimmed = spec.trim();
    if trimmed.is_empty() || trimmed == "*" {
        return "latest".to_string();
    }
    if let Some(rest) = trimmed.strip_prefix('^').or_else(|| trimmed.strip_prefix('~')) {
        rest.to_string()
    } else {
        trimmed.to_string()
    }
}

#[async_trait]
impl EcosystemClient for NpmClient {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    async fn resolve_latest_version(&self, name: &str) -> RegistryResult<String> {
        let doc = self.fetch_package_doc(name).await?;
        doc.get("dist-tags")
            .and_then(|tags| tags.get("latest"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| RegistryError::InvalidResponse {
                message: format!("no dist-tags.latest for {name}"),
            })
    }

    async fn resolve_dependencies(
        &self,
        pkg: &PackageVersion,
        include_dev: bool,
    ) -> RegistryResult<Vec<RawDependency>> {
        let doc = self.fetch_package_doc(&pkg.name).await?;
        let version_doc = doc
            .get("versions")
            .and_then(|v| v.get(&pkg.version))
            .ok_or_else(|| RegistryError::NotFound {
                name: pkg.name.clone(),
                version: pkg.version.clone(),
            })?;

        let mut deps = Vec::new();
        collect_deps(version_doc, "dependencies", false, &mut deps);
        if include_dev {
            collect_deps(version_doc, "devDependencies", true, &mut deps);
        }
        Ok(deps)
    }

    async fn resolve_version_spec(&self, name: &str, spec: &str) -> RegistryResult<String> {
        let cleaned = npm_clean_version(spec);
        if cleaned == "latest" {
            return self.resolve_latest_version(name).await;
        }
        // Exact pin already.
        let doc = self.fetch_package_doc(name).await?;
        if doc
            .get("versions")
            .and_then(|v| v.get(&cleaned))
            .is_some()
        {
            return Ok(cleaned);
        }
        // Range: pick the highest known version satisfying it (approximate; §4.2).
        let versions: Vec<&str> = doc
            .get("versions")
            .and_then(|v| v.as_object())
            .map(|obj| obj.keys().map(String::as_str).collect())
            .unwrap_or_default();
        let (operator, constraint_version) = split_operator(&cleaned);
        semver_lite::highest_satisfying(versions.into_iter(), operator, constraint_version)
            .map(str::to_string)
            .ok_or_else(|| RegistryError::NoMatchingVersion {
                name: name.to_string(),
                constraint: spec.to_string(),
            })
    }
}

fn collect_deps(version_doc: &serde_json::Value, key: &str, dev: bool, out: &mut Vec<RawDependency>) {
    if let Some(map) = version_doc.get(key).and_then(|v| v.as_object()) {
        for (name, spec) in map {
            if let Some(spec) = spec.as_str() {
                out.push(RawDependency {
                    name: name.clone(),
                    version_spec: spec.to_string(),
                    dev,
                });
            }
        }
    }
}

fn split_operator(spec: &str) -> (Option<&str>, &str) {
    for op in [">=", "<=", "==", "!=", ">", "<"] {
        if let Some(rest) = spec.strip_prefix(op) {
            return (Some(op), rest.trim());
        }
    }
    (Some(">="), spec)
}
