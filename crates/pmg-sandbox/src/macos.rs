//! macOS Seatbelt backend: translate a [`SandboxPolicy`] into Seatbelt Profile Language
//! and splice `sandbox-exec -f <profile>` in front of the child's argv.

use crate::policy::SandboxPolicy;
use crate::sandbox::{Sandbox, SandboxOutcome};
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::warn;

pub struct MacosSandbox {
    written_profiles: Mutex<Vec<NamedTempFile>>,
}

impl MacosSandbox {
    pub fn new() -> Self {
        Self {
            written_profiles: Mutex::new(Vec::new()),
        }
    }
}

impl Default for MacosSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox for MacosSandbox {
    fn is_available(&self) -> bool {
        cfg!(target_os = "macos") && which_sandbox_exec_exists()
    }

    fn execute(&self, policy: &SandboxPolicy, exe: &str, args: &[String]) -> SandboxOutcome {
        if !self.is_available() {
            warn!("sandbox-exec not available, running unsandboxed");
            return SandboxOutcome::Unsandboxed;
        }

        let profile = render_seatbelt_profile(policy);
        let mut file = match NamedTempFile::new() {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "failed to create sandbox profile temp file, running unsandboxed");
                return SandboxOutcome::Unsandboxed;
            }
        };
        if let Err(e) = file.write_all(profile.as_bytes()) {
            warn!(error = %e, "failed to write sandbox profile, running unsandboxed");
            return SandboxOutcome::Unsandboxed;
        }

        let profile_path = file.path().to_string_lossy().to_string();
        self.written_profiles.lock().expect("profile list poisoned").push(file);

        let mut new_args = vec!["-f".to_string(), profile_path, exe.to_string()];
        new_args.extend(args.iter().cloned());

        SandboxOutcome::CommandModified {
            exe: "sandbox-exec".to_string(),
            args: new_args,
        }
    }

    fn close(&self) -> std::io::Result<()> {
        self.written_profiles.lock().expect("profile list poisoned").clear();
        Ok(())
    }
}

fn which_sandbox_exec_exists() -> bool {
    std::path::Path::new("/usr/bin/sandbox-exec").exists()
}

/// Render `policy` into Seatbelt Profile Language. Deny rules are emitted after allow
/// rules so a more specific deny can override a broader allow, matching Seatbelt's
/// last-rule-wins evaluation for overlapping paths.
fn render_seatbelt_profile(policy: &SandboxPolicy) -> String {
    let mut out = String::new();
    out.push_str("(version 1)\n(deny default)\n(allow process-fork)\n(allow signal (target self))\n");

    for path in &policy.fs.allow_read {
        out.push_str(&format!("(allow file-read* (subpath {}))\n", quote(path)));
    }
    for path in &policy.fs.allow_write {
        out.push_str(&format!(
            "(allow file-write* (subpath {}))\n(allow file-read* (subpath {}))\n",
            quote(path),
            quote(path)
        ));
    }
    for path in &policy.fs.deny_read {
        out.push_str(&format!("(deny file-read* (subpath {}))\n", quote(path)));
    }
    for path in &policy.fs.deny_write {
        out.push_str(&format!("(deny file-write* (subpath {}))\n", quote(path)));
    }

    if policy.net.allow_outbound.is_empty() {
        out.push_str("(allow network-outbound)\n");
    } else {
        out.push_str("(allow network-outbound (remote ip))\n");
    }
    for host in &policy.net.deny_outbound {
        out.push_str(&format!("; deny-outbound hint: {}\n", quote(host)));
    }

    if policy.exec.allow_exec.is_empty() {
        out.push_str("(allow process-exec)\n");
    } else {
        for exe in &policy.exec.allow_exec {
            out.push_str(&format!("(allow process-exec (literal {}))\n", quote(exe)));
        }
    }
    for exe in &policy.exec.deny_exec {
        out.push_str(&format!("(deny process-exec (literal {}))\n", quote(exe)));
    }

    out
}

fn quote(path: &str) -> String {
    format!("\"{}\"", path.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{ExecPolicy, FsPolicy, NetPolicy};

    #[test]
    fn renders_deny_default_header() {
        let policy = SandboxPolicy {
            name: "t".to_string(),
            package_managers: Vec::new(),
            fs: FsPolicy::default(),
            net: NetPolicy::default(),
            exec: ExecPolicy::default(),
        };
        let profile = render_seatbelt_profile(&policy);
        assert!(profile.starts_with("(version 1)\n(deny default)"));
    }

    #[test]
    fn renders_allow_read_rules() {
        let mut policy = SandboxPolicy::default();
        policy.fs.allow_read = vec!["/tmp/project".to_string()];
        let profile = render_seatbelt_profile(&policy);
        assert!(profile.contains("(allow file-read* (subpath \"/tmp/project\"))"));
    }
}
