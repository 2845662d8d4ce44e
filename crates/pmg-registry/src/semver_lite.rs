//! A deliberately approximate dotted-version comparator.
//!
//! PMG does not embed a full semver/PEP 440 implementation; it compares versions
//! component-by-component as integers, falling back to lexical ordering for any
//! non-numeric component. This is documented as lossy (§4.2, "Approximation note"):
//! the version PMG selects to analyze may not be the exact one the real package
//! manager installs.

use std::cmp::Ordering;

pub fn compare(a: &str, b: &str) -> Ordering {
    let a_parts = split(a);
    let b_parts = split(b);
    for (pa, pb) in a_parts.iter().zip(b_parts.iter()) {
        let ord = match (pa.parse::<u64>(), pb.parse::<u64>()) {
            (Ok(na), Ok(nb)) => na.cmp(&nb),
            _ => pa.cmp(pb),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a_parts.len().cmp(&b_parts.len())
}

fn split(v: &str) -> Vec<&str> {
    v.trim_start_matches(['v', 'V'])
        .split(|c| c == '.' || c == '-' || c == '+')
        .collect()
}

/// Highest version in `candidates` satisfying a single comparator constraint like
/// `>=2.0`, `==1.2.3`, `~=1.4`. An empty/absent constraint matches everything.
pub fn highest_satisfying<'a>(
    candidates: impl Iterator<Item = &'a str>,
    operator: Option<&str>,
    constraint_version: &str,
) -> Option<&'a str> {
    let mut best: Option<&str> = None;
    for candidate in candidates {
        if satisfies(candidate, operator, constraint_version) {
            best = match best {
                Some(current) if compare(current, candidate) == Ordering::Greater => Some(current),
                _ => Some(candidate),
            };
        }
    }
    best
}

fn satisfies(candidate: &str, operator: Option<&str>, constraint_version: &str) -> bool {
    let Some(op) = operator else { return true };
    match op {
        "==" => compare(candidate, constraint_version) == Ordering::Equal,
        "!=" => compare(candidate, constraint_version) != Ordering::Equal,
        ">=" | "~=" => compare(candidate, constraint_version) != Ordering::Less,
        "<=" => compare(candidate, constraint_version) != Ordering::Greater,
        ">" => compare(candidate, constraint_version) == Ordering::Greater,
        "<" => compare(candidate, constraint_version) == Ordering::Less,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_components_compare_numerically() {
        assert_eq!(compare("2.9.0", "2.10.0"), Ordering::Less);
    }

    #[test]
    fn picks_highest_satisfying_gte() {
        let versions = vec!["1.0.0", "1.2.0", "2.0.0", "1.5.0"];
        let highest = highest_satisfying(versions.into_iter(), Some(">="), "1.2.0");
        assert_eq!(highest, Some("2.0.0"));
    }

    #[test]
    fn exact_match_only() {
        let versions = vec!["1.0.0", "1.2.0", "2.0.0"];
        let highest = highest_satisfying(versions.into_iter(), Some("=="), "1.2.0");
        assert_eq!(highest, Some("1.2.0"));
    }

    #[test]
    fn no_operator_matches_highest_overall() {
        let versions = vec!["1.0.0", "1.2.0", "2.0.0"];
        let highest = highest_satisfying(versions.into_iter(), None, "");
        assert_eq!(highest, Some("2.0.0"));
    }
}
