//! Trust Filter (C4): remove packages matching the configured trusted-packages list.

use pmg_common::{PackageVersion, TrustedPackage};

/// True iff `pkg` matches an entry in `trusted`: same ecosystem, same name, and either
/// an empty trusted version (all versions trusted) or an exact version match (P2: a
/// trusted package is never forwarded to the analyzer).
pub fn is_trusted(trusted: &[TrustedPackage], pkg: &PackageVersion) -> bool {
    trusted.iter().any(|entry| {
        entry.ecosystem == pkg.ecosystem
            && entry.name == pkg.name
            && (entry.version_or_empty.is_empty() || entry.version_or_empty == pkg.version)
    })
}

/// Partition `packages` into (untrusted, trusted_count) — the count feeds
/// `GuardResult::trusted_skipped`.
pub fn filter_trusted(
    trusted: &[TrustedPackage],
    packages: Vec<PackageVersion>,
) -> (Vec<PackageVersion>, usize) {
    let mut kept = Vec::with_capacity(packages.len());
    let mut skipped = 0;
    for pkg in packages {
        if is_trusted(trusted, &pkg) {
            skipped += 1;
        } else {
            kept.push(pkg);
        }
    }
    (kept, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmg_common::Ecosystem;

    fn trusted_entry(ecosystem: Ecosystem, name: &str, version: &str) -> TrustedPackage {
        TrustedPackage {
            ecosystem,
            name: name.to_string(),
            version_or_empty: version.to_string(),
        }
    }

    #[test]
    fn empty_version_trusts_all_versions() {
        let trusted = vec![trusted_entry(Ecosystem::Npm, "lodash", "")];
        let pkg = PackageVersion::new(Ecosystem::Npm, "lodash", "4.17.21");
        assert!(is_trusted(&trusted, &pkg));
    }

    #[test]
    fn exact_version_match_required_when_specified() {
        let trusted = vec![trusted_entry(Ecosystem::Npm, "lodash", "4.17.20")];
        let pkg = PackageVersion::new(Ecosystem::Npm, "lodash", "4.17.21");
        assert!(!is_trusted(&trusted, &pkg));
    }

    #[test]
    fn empty_trusted_list_never_matches() {
        let pkg = PackageVersion::new(Ecosystem::Npm, "lodash", "4.17.21");
        assert!(!is_trusted(&[], &pkg));
    }

    #[test]
    fn different_ecosystem_does_not_match() {
        let trusted = vec![trusted_entry(Ecosystem::PyPi, "lodash", "")];
        let pkg = PackageVersion::new(Ecosystem::Npm, "lodash", "4.17.21");
        assert!(!is_trusted(&trusted, &pkg));
    }

    #[test]
    fn filter_trusted_partitions_and_counts() {
        let trusted = vec![trusted_entry(Ecosystem::Npm, "lodash", "")];
        let packages = vec![
            PackageVersion::new(Ecosystem::Npm, "lodash", "4.17.21"),
            PackageVersion::new(Ecosystem::Npm, "left-pad", "1.0.0"),
        ];
        let (kept, skipped) = filter_trusted(&trusted, packages);
        assert_eq!(skipped, 1);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "left-pad");
    }
}
