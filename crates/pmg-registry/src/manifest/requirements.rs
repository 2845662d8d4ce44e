//! `requirements.txt` parser. Not a true lockfile — lines may carry version ranges
//! rather than exact pins. An exact `==` pin becomes the `PackageVersion`'s version
//! directly; any other comparator (or none) is left as the raw spec string so the
//! caller can resolve it through the registry the same way C1/C2 resolve ranges.

use pmg_common::{Ecosystem, PackageVersion};

pub fn parse(content: &str) -> Result<Vec<PackageVersion>, String> {
    let mut out = Vec::new();
    for raw_line in content.lines() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('-') {
            // `-r other.txt`, `-e .`, `--hash=...` and friends: not a direct requirement.
            continue;
        }
        if let Some(pkg) = parse_line(line) {
            out.push(pkg);
        }
    }
    Ok(out)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn parse_line(line: &str) -> Option<PackageVersion> {
    // Drop an extras block: `requests[security]==2.0`.
    let without_extras = match line.find('[') {
        Some(start) => {
            let end = line.find(']')?;
            format!("{}{}", &line[..start], &line[end + 1..])
        }
        None => line.to_string(),
    };
    let without_extras = without_extras.trim();

    for op in ["==", ">=", "<=", "!=", "~=", ">", "<"] {
        if let Some(idx) = without_extras.find(op) {
            let name = without_extras[..idx].trim();
            let version = without_extras[idx + op.len()..].trim();
            if name.is_empty() {
                return None;
            }
            let version = if op == "==" { version } else { "" };
            return Some(PackageVersion::new(Ecosystem::PyPi, name, version));
        }
    }

    let name = without_extras.trim();
    if name.is_empty() {
        return None;
    }
    Some(PackageVersion::new(Ecosystem::PyPi, name, ""))
}
