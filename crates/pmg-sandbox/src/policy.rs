//! `SandboxPolicy` (C11): a per-package-manager capability set, loaded from an embedded
//! built-in or a user-supplied YAML file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FsPolicy {
    pub allow_read: Vec<String>,
    pub allow_write: Vec<String>,
    pub deny_read: Vec<String>,
    pub deny_write: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetPolicy {
    pub allow_outbound: Vec<String>,
    pub deny_outbound: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecPolicy {
    pub allow_exec: Vec<String>,
    pub deny_exec: Vec<String>,
}

/// A named sandbox policy bound to the set of package managers it covers. Applying it
/// to a PM outside that set is a warning, not an error (§4.11).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxPolicy {
    pub name: String,
    pub package_managers: Vec<String>,
    pub fs: FsPolicy,
    pub net: NetPolicy,
    pub exec: ExecPolicy,
}

impl SandboxPolicy {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    }

    pub fn covers(&self, pm_name: &str) -> bool {
        self.package_managers.is_empty() || self.package_managers.iter().any(|p| p == pm_name)
    }

    /// Deny-wins union of this policy with `other` — mirrors the merge semantics the
    /// CLI's landlock-compat layer uses for stacking multiple policy sources.
    pub fn merge(&self, other: &SandboxPolicy) -> SandboxPolicy {
        SandboxPolicy {
            name: format!("{}+{}", self.name, other.name),
            package_managers: union(&self.package_managers, &other.package_managers),
            fs: FsPolicy {
                allow_read: union(&self.fs.allow_read, &other.fs.allow_read),
                allow_write: union(&self.fs.allow_write, &other.fs.allow_write),
                deny_read: union(&self.fs.deny_read, &other.fs.deny_read),
                deny_write: union(&self.fs.deny_write, &other.fs.deny_write),
            },
            net: NetPolicy {
                allow_outbound: union(&self.net.allow_outbound, &other.net.allow_outbound),
                deny_outbound: union(&self.net.deny_outbound, &other.net.deny_outbound),
            },
            exec: ExecPolicy {
                allow_exec: union(&self.exec.allow_exec, &other.exec.allow_exec),
                deny_exec: union(&self.exec.deny_exec, &other.exec.deny_exec),
            },
        }
    }

    pub fn rule_counts(&self) -> usize {
        self.fs.allow_read.len()
            + self.fs.allow_write.len()
            + self.fs.deny_read.len()
            + self.fs.deny_write.len()
            + self.net.allow_outbound.len()
            + self.net.deny_outbound.len()
            + self.exec.allow_exec.len()
            + self.exec.deny_exec.len()
    }

    /// A minimal built-in policy covering every recognized package manager: read/write
    /// the project directory and package-manager caches, outbound to the registries,
    /// exec the package manager's own toolchain only.
    pub fn builtin_default() -> Self {
        SandboxPolicy {
            name: "pmg-default".to_string(),
            package_managers: Vec::new(),
            fs: FsPolicy {
                allow_read: vec![".".to_string()],
                allow_write: vec![".".to_string(), "/tmp".to_string()],
                deny_read: vec!["~/.ssh".to_string(), "~/.aws".to_string()],
                deny_write: vec!["~/.ssh".to_string(), "~/.aws".to_string()],
            },
            net: NetPolicy {
                allow_outbound: vec![
                    "registry.npmjs.org".to_string(),
                    "pypi.org".to_string(),
                    "files.pythonhosted.org".to_string(),
                ],
                deny_outbound: Vec::new(),
            },
            exec: ExecPolicy {
                allow_exec: Vec::new(),
                deny_exec: Vec::new(),
            },
        }
    }
}

fn union(a: &[String], b: &[String]) -> Vec<String> {
    let mut set: HashSet<String> = a.iter().cloned().collect();
    set.extend(b.iter().cloned());
    let mut out: Vec<String> = set.into_iter().collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_empty_pm_list_means_universal() {
        let policy = SandboxPolicy::default();
        assert!(policy.covers("npm"));
    }

    #[test]
    fn covers_named_pm_list() {
        let mut policy = SandboxPolicy::default();
        policy.package_managers = vec!["npm".to_string()];
        assert!(policy.covers("npm"));
        assert!(!policy.covers("pip"));
    }

    #[test]
    fn merge_unions_and_dedupes() {
        let mut a = SandboxPolicy::default();
        a.fs.allow_read = vec!["/a".to_string()];
        let mut b = SandboxPolicy::default();
        b.fs.allow_read = vec!["/a".to_string(), "/b".to_string()];
        let merged = a.merge(&b);
        assert_eq!(merged.fs.allow_read, vec!["/a".to_string(), "/b".to_string()]);
    }

    #[test]
    fn builtin_default_has_rules() {
        assert!(SandboxPolicy::builtin_default().rule_counts() > 0);
    }
}
