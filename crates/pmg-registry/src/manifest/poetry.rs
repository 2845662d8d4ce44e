//! `poetry.lock` parser. A TOML document with an array of `[[package]]` tables, each
//! carrying `name` and `version`, same shape as `uv.lock`'s package array.

use pmg_common::{Ecosystem, PackageVersion};

pub fn parse(content: &str) -> Result<Vec<PackageVersion>, String> {
    let doc: toml::Value = toml::from_str(content).map_err(|e| format!("invalid TOML: {e}"))?;

    let Some(packages) = doc.get("package").and_then(|v| v.as_array()) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for entry in packages {
        let (Some(name), Some(version)) = (
            entry.get("name").and_then(|v| v.as_str()),
            entry.get("version").and_then(|v| v.as_str()),
        ) else {
            continue;
        };
        out.push(PackageVersion::new(Ecosystem::PyPi, name, version));
    }
    Ok(out)
}
