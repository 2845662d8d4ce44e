//! `package-lock.json` parser. Supports both the lockfile v2/v3 flat `packages` map
//! (keyed by `node_modules/...` path) and the older v1 nested `dependencies` tree.

use pmg_common::{Ecosystem, PackageVersion};
use std::collections::HashMap;

pub fn parse(content: &str) -> Result<Vec<PackageVersion>, String> {
    let doc: serde_json::Value =
        serde_json::from_str(content).map_err(|e| format!("invalid JSON: {e}"))?;

    if let Some(packages) = doc.get("packages").and_then(|v| v.as_object()) {
        return Ok(parse_v2_packages(packages));
    }
    if let Some(deps) = doc.get("dependencies").and_then(|v| v.as_object()) {
        let mut out = Vec::new();
        collect_v1(deps, &mut out);
        return Ok(out);
    }
    Ok(Vec::new())
}

fn parse_v2_packages(packages: &serde_json::Map<String, serde_json::Value>) -> Vec<PackageVersion> {
    let mut seen: HashMap<String, ()> = HashMap::new();
    let mut out = Vec::new();
    for (key, entry) in packages {
        if key.is_empty() {
            continue; // the root project entry
        }
        let Some(name) = key.rsplit("node_modules/").next() else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        let Some(version) = entry.get("version").and_then(|v| v.as_str()) else {
            continue;
        };
        if seen.insert(format!("{name}@{version}"), ()).is_some() {
            continue;
        }
        out.push(PackageVersion::new(Ecosystem::Npm, name, version));
    }
    out
}

fn collect_v1(deps: &serde_json::Map<String, serde_json::Value>, out: &mut Vec<PackageVersion>) {
    for (name, entry) in deps {
        if let Some(version) = entry.get("version").and_then(|v| v.as_str()) {
            out.push(PackageVersion::new(Ecosystem::Npm, name.clone(), version));
        }
        if let Some(nested) = entry.get("dependencies").and_then(|v| v.as_object()) {
            collect_v1(nested, out);
        }
    }
}
