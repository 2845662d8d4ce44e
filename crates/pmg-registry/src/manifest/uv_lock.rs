//! `uv.lock` parser. A TOML document with an array of `[[package]]` tables, each
//! carrying `name` and `version`.

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_package_array() {
        let content = r#"
version = 1
requires-python = ">=3.9"

[[package]]
name = "requests"
version = "2.31.0"

[[package]]
name = "urllib3"
version = "2.0.7"
"#;
        let pkgs = parse(content).unwrap();
        assert_eq!(pkgs.len(), 2);
        assert!(pkgs.iter().any(|p| p.name == "requests" && p.version == "2.31.0"));
    }
}
