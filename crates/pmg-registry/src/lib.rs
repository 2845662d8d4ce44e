//! Ecosystem registry clients, the concurrent transitive dependency resolver (C2), and
//! the lockfile/manifest extractor (C3).

pub mod client;
pub mod error;
pub mod http;
pub mod manifest;
pub mod npm;
pub mod pypi;
pub mod resolver;
pub mod semver_lite;

pub use client::{EcosystemClient, RawDependency};
pub use error::{RegistryError, RegistryResult};
pub use manifest::{extract_all, extract_file, default_npm_family_probes, default_python_family_probes, LockfileKind};
pub use npm::NpmClient;
pub use pypi::PyPiClient;
pub use resolver::{resolve_transitive, ResolvedDependency, ResolverConfig};
