//! `bun.lock` parser. Bun's text lockfile keys `packages` by bare package name, each
//! mapping to a tuple-shaped array whose first element is `"name@version"`.

use pmg_common::{Ecosystem, PackageVersion};

pub fn parse(content: &str) -> Result<Vec<PackageVersion>, String> {
    let doc: serde_json::Value =
        serde_json::from_str(content).map_err(|e| format!("invalid JSON: {e}"))?;

    let Some(packages) = doc.get("packages").and_then(|v| v.as_object()) else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for (_key, entry) in packages {
        let Some(spec) = entry.as_array().and_then(|arr| arr.first()).and_then(|v| v.as_str())
        else {
            continue;
        };
        if let Some(pkg) = parse_spec(spec) {
            out.push(pkg);
        }
    }
    Ok(out)
}

fn parse_spec(spec: &str) -> Option<PackageVersion> {
    let at_index = if let Some(rest) = spec.strip_prefix('@') {
        rest.find('@').map(|i| i + 1)
    } else {
        spec.find('@')
    }?;
    let name = &spec[..at_index];
    let version = &spec[at_index + 1..];
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some(PackageVersion::new(Ecosystem::Npm, name, version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_packages_map() {
        let content = r#"{
            "lockfileVersion": 0,
            "packages": {
                "lodash": ["lodash@4.17.21", "", {}, "sha512-abc"]
            }
        }"#;
        let pkgs = parse(content).unwrap();
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "lodash");
        assert_eq!(pkgs[0].version, "4.17.21");
    }

    #[test]
    fn parses_scoped_spec() {
        assert_eq!(parse_spec("@babel/core@7.20.0").unwrap().name, "@babel/core");
    }
}
