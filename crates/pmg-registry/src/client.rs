use crate::error::RegistryResult;
use async_trait::async_trait;
use pmg_common::{Ecosystem, PackageVersion};

/// A direct dependency as reported by a registry: the raw name and its (possibly
/// range-shaped) version spec, before resolution.
#[derive(Debug, Clone)]
pub struct RawDependency {
    pub name: String,
    pub version_spec: String,
    pub dev: bool,
}

/// Capability set for talking to a single ecosystem's package registry (§9,
/// `PackageResolver`). One implementation per ecosystem; the resolver (C2) is generic
/// over this trait.
#[async_trait]
pub trait EcosystemClient: Send + Sync {
    fn ecosystem(&self) -> Ecosystem;

    /// Resolve the latest published version of a package (I1: fills missing versions
    /// before a `PackageVersion` is forwarded to analysis).
    async fn resolve_latest_version(&self, name: &str) -> RegistryResult<String>;

    /// Direct dependencies of a concrete package version, optionally including dev
    /// dependencies.
    async fn resolve_dependencies(
        &self,
        pkg: &PackageVersion,
        include_dev: bool,
    ) -> RegistryResult<Vec<RawDependency>>;

    /// The ecosystem's version-spec resolver: pick the concrete version this spec
    /// (exact version, range, or empty/`*`) resolves to. Approximate by design (§4.2,
    /// "Approximation note") — PMG may analyze a version the real package manager would
    /// not install.
    async fn resolve_version_spec(&self, name: &str, spec: &str) -> RegistryResult<String>;

    /// Normalize a package identifier for the resolver's visited/result sets (I2).
    fn package_identifier(&self, name: &str, version: &str) -> String {
        format!("{}:{}@{}", self.ecosystem(), self.ecosystem().normalize_name(name), version)
    }
}
