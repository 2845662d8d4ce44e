//! `pnpm-lock.yaml` parser. Keys under `packages:` look like `/lodash@4.17.21` (lockfile
//! v5) or `lodash@4.17.21` / `lodash@4.17.21(peer@1.0.0)` (v6+); scoped names carry an
//! extra leading slash: `/@babel/core@7.20.0`.

use pmg_common::{Ecosystem, PackageVersion};

pub fn parse(content: &str) -> Result<Vec<PackageVersion>, String> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| format!("invalid YAML: {e}"))?;

    let Some(packages) = doc.get("packages").and_then(|v| v.as_mapping()) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for (key, _entry) in packages {
        let Some(key) = key.as_str() else { continue };
        if let Some(pkg) = parse_key(key) {
            out.push(pkg);
        }
    }
    Ok(out)
}

fn parse_key(key: &str) -> Option<PackageVersion> {
    let trimmed = key.strip_prefix('/').unwrap_or(key);
    // Strip a trailing peer-dependency annotation: `name@1.0.0(peer@2.0.0)`.
    let trimmed = trimmed.split('(').next().unwrap_or(trimmed);

    let at_index = if let Some(rest) = trimmed.strip_prefix('@') {
        rest.find('@').map(|i| i + 1)
    } else {
        trimmed.find('@')
    }?;

    let name = &trimmed[..at_index];
    let version = &trimmed[at_index + 1..];
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some(PackageVersion::new(Ecosystem::Npm, name, version))
}
