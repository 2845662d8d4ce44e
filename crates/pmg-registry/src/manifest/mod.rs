//! Manifest extractor (C3): turn a package-manager lockfile into a flat
//! `PackageVersion` list without resolving anything over the network.
//!
//! File-to-parser table (§4.3): `package-lock.json → npm`, `pnpm-lock.yaml → pnpm`,
//! `bun.lock → bun`, `requirements.txt → requirements`, `uv.lock → uv_lock`,
//! `poetry.lock → poetry`. A missing file is silently skipped — a manifest install may
//! legitimately probe several candidate files. A parse failure for one file logs a
//! warning and the remaining probes still run.

mod bun;
mod npm_lockfile;
mod pnpm;
mod poetry;
mod requirements;
mod uv_lock;

use pmg_common::PackageVersion;
use std::path::Path;
use tracing::warn;

/// One lockfile probe: its path and the parser that understands its format.
#[derive(Debug, Clone, Copy)]
pub enum LockfileKind {
    NpmLockfile,
    Pnpm,
    Bun,
    Requirements,
    UvLock,
    Poetry,
}

impl LockfileKind {
    pub fn file_name(self) -> &'static str {
        match self {
            LockfileKind::NpmLockfile => "package-lock.json",
            LockfileKind::Pnpm => "pnpm-lock.yaml",
            LockfileKind::Bun => "bun.lock",
            LockfileKind::Requirements => "requirements.txt",
            LockfileKind::UvLock => "uv.lock",
            LockfileKind::Poetry => "poetry.lock",
        }
    }

    fn parse(self, content: &str) -> Result<Vec<PackageVersion>, String> {
        match self {
            LockfileKind::NpmLockfile => npm_lockfile::parse(content),
            LockfileKind::Pnpm => pnpm::parse(content),
            LockfileKind::Bun => bun::parse(content),
            LockfileKind::Requirements => requirements::parse(content),
            LockfileKind::UvLock => uv_lock::parse(content),
            LockfileKind::Poetry => poetry::parse(content),
        }
    }
}

/// Extract package versions from every named manifest file under `dir`. Files that
/// don't exist are skipped; files that fail to parse are logged and skipped. The
/// ecosystem on each returned `PackageVersion` comes from the parser, never inferred
/// from the file path.
pub fn extract_all(dir: &Path, probes: &[(LockfileKind, &str)]) -> Vec<PackageVersion> {
    let mut out = Vec::new();
    for (kind, file_name) in probes {
        let path = dir.join(file_name);
        if !path.exists() {
            continue;
        }
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to read manifest file");
                continue;
            }
        };
        match kind.parse(&content) {
            Ok(mut pkgs) => out.append(&mut pkgs),
            Err(e) => warn!(file = %path.display(), error = %e, "failed to parse manifest file"),
        }
    }
    out
}

/// Extract a single named lockfile path directly (used when the command parser (C1)
/// already pinned an explicit `-r FILE` / `uv.lock` / `poetry.lock` target).
pub fn extract_file(kind: LockfileKind, path: &Path) -> Result<Vec<PackageVersion>, String> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    kind.parse(&content)
}

/// The default probe list for a manifest-install with no explicit targets, per
/// ecosystem family.
pub fn default_npm_family_probes() -> Vec<(LockfileKind, &'static str)> {
    vec![
        (LockfileKind::NpmLockfile, "package-lock.json"),
        (LockfileKind::Pnpm, "pnpm-lock.yaml"),
        (LockfileKind::Bun, "bun.lock"),
    ]
}

pub fn default_python_family_probes() -> Vec<(LockfileKind, &'static str)> {
    vec![
        (LockfileKind::Requirements, "requirements.txt"),
        (LockfileKind::UvLock, "uv.lock"),
        (LockfileKind::Poetry, "poetry.lock"),
    ]
}
