//! Shared data model, error taxonomy and configuration for PMG.
//!
//! This crate has no I/O of its own; it is the vocabulary every other PMG crate builds
//! on (`pmg_registry`, `pmg_analyzer`, `pmg_core`, `pmg_sandbox`, `pmg_proxy`).

pub mod config;
pub mod ecosystem;
pub mod error;
pub mod outcome;
pub mod package;
pub mod purl;
pub mod verdict;

pub use config::{Configuration, SafeDepCredentials, SandboxConfig};
pub use ecosystem::Ecosystem;
pub use error::{ErrorKind, PmgError, PmgResult};
pub use outcome::{infer_outcome, Outcome, OutcomeInputs};
pub use package::{Fingerprint, PackageInstallTarget, PackageVersion, ParsedCommand};
pub use purl::{Purl, TrustedPackage};
pub use verdict::{AnalysisVerdict, GuardResult, VerdictKind};
