//! Guard Engine (C6): orchestrates C1–C5 for a non-proxy run, classifies verdicts, talks
//! to the UI, and hands the approved command to the sandbox adapter for execution.

use crate::trust;
use crate::ui::UserInteraction;
use pmg_analyzer::AnalyzerClient;
use pmg_common::{
    infer_outcome, Configuration, GuardResult, Outcome, OutcomeInputs, PackageVersion, ParsedCommand,
    TrustedPackage, VerdictKind,
};
use pmg_registry::{manifest, EcosystemClient, ResolverConfig};
use pmg_sandbox::{should_activate, Sandbox, SandboxOutcome, SandboxPolicy};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tracing::warn;

pub struct GuardEngine<'a> {
    pub config: &'a Configuration,
    pub trusted: Vec<TrustedPackage>,
    pub npm_client: Arc<dyn EcosystemClient>,
    pub pypi_client: Arc<dyn EcosystemClient>,
    pub analyzer: &'a AnalyzerClient,
    pub ui: &'a dyn UserInteraction,
    pub sandbox: Option<&'a dyn Sandbox>,
    pub sandbox_policy: SandboxPolicy,
}

pub struct RunOutcome {
    pub guard_result: GuardResult,
    pub outcome: Outcome,
    pub child_exit_code: Option<i32>,
}

impl<'a> GuardEngine<'a> {
    fn client_for(&self, pkg: &PackageVersion) -> Arc<dyn EcosystemClient> {
        match pkg.ecosystem {
            pmg_common::Ecosystem::Npm => Arc::clone(&self.npm_client),
            pmg_common::Ecosystem::PyPi => Arc::clone(&self.pypi_client),
        }
    }

    /// Run the full guard pipeline for `parsed`, optionally executing the real package
    /// manager command afterward (§4.6, steps 1-8).
    pub async fn run(&self, parsed: &ParsedCommand, cwd: &Path) -> RunOutcome {
        let mut had_error = false;

        // Step 1: fill missing versions on explicit install targets.
        let mut resolved_targets = Vec::new();
        for target in &parsed.install_targets {
            let mut pkg = target.pkg_version.clone();
            if pkg.version.is_empty() || pkg.version == "latest" {
                let client = self.client_for(&pkg);
                match client.resolve_latest_version(&pkg.name).await {
                    Ok(v) => pkg.version = v,
                    Err(e) => {
                        warn!(package = %pkg.name, error = %e, "failed to resolve latest version");
                        had_error = true;
                        continue;
                    }
                }
            }
            resolved_targets.push(pkg);
        }

        // Step 2: build the analysis set.
        let mut analysis_set: Vec<PackageVersion> = Vec::new();
        analysis_set.extend(resolved_targets.iter().cloned());

        if parsed.is_manifest_install {
            let extracted = extract_manifest_packages(parsed, cwd);
            analysis_set.extend(extracted);
        } else if self.config.transitive {
            for pkg in &resolved_targets {
                let client = self.client_for(pkg);
                let resolver_config = ResolverConfig {
                    max_depth: self.config.transitive_depth,
                    include_dev_dependencies: self.config.include_dev_dependencies,
                    ..ResolverConfig::default()
                };
                let target = pmg_common::PackageInstallTarget::new(pkg.clone());
                match pmg_registry::resolve_transitive(client, &[target], &resolver_config).await {
                    Ok(deps) => analysis_set.extend(deps.into_iter().map(|d| d.package)),
                    Err(e) => {
                        warn!(package = %pkg, error = %e, "transitive resolution failed");
                        had_error = true;
                    }
                }
            }
        }

        dedup_by_fingerprint(&mut analysis_set);

        // Step 3: trust filter.
        let (survivors, trusted_skipped) = trust::filter_trusted(&self.trusted, analysis_set);

        // Step 4: analyze.
        self.ui.set_status(&format!("Analyzing {} package(s)...", survivors.len()));
        let mut result = GuardResult {
            total_analyzed: survivors.len(),
            trusted_skipped,
            ..GuardResult::default()
        };

        for pkg in &survivors {
            match self.analyzer.analyze(pkg).await {
                Ok(verdict) => match verdict.kind {
                    VerdictKind::Malicious => {
                        result.blocked_count += 1;
                        result.blocked_packages.push(verdict);
                    }
                    VerdictKind::Suspicious => {
                        result.confirmed_count += 1;
                        result.confirmed_packages.push(verdict);
                    }
                    VerdictKind::Safe | VerdictKind::Unknown => {
                        result.allowed_count += 1;
                    }
                    VerdictKind::Error => {
                        had_error = true;
                    }
                },
                Err(e) => {
                    warn!(package = %pkg, error = %e, "analysis call failed");
                    had_error = true;
                }
            }
        }
        self.ui.clear_status();

        // Step 5/6: classify + dispatch callbacks.
        if !result.confirmed_packages.is_empty() {
            let allowed = self.ui.get_confirmation_on_malware(&result.confirmed_packages);
            if !allowed {
                result.was_user_cancelled = true;
            }
        }
        if !result.blocked_packages.is_empty() {
            self.ui.block(&result.blocked_packages);
        }

        let user_cancelled_count = usize::from(result.was_user_cancelled);
        let outcome = infer_outcome(OutcomeInputs {
            insecure_mode: self.config.insecure_installation,
            dry_run: self.config.dry_run,
            blocked_count: result.blocked_count,
            user_cancelled_count,
            has_error: had_error,
        });

        // Step 7/8: execute unless blocked/cancelled/dry-run (and not bypassed).
        let should_execute = matches!(outcome, Outcome::Success | Outcome::InsecureBypass);
        let child_exit_code = if should_execute {
            self.execute_child(parsed, cwd).await
        } else {
            None
        };

        RunOutcome {
            guard_result: result,
            outcome,
            child_exit_code,
        }
    }

    async fn execute_child(&self, parsed: &ParsedCommand, cwd: &Path) -> Option<i32> {
        let mut exe = parsed.exe.clone();
        let mut args = parsed.args.clone();

        let activate = should_activate(
            self.config.sandbox.enabled,
            self.config.sandbox.enforce_always,
            parsed.is_installation_command(),
        );

        if activate {
            if !self.sandbox_policy.covers(&parsed.exe) {
                warn!(pm = %parsed.exe, "sandbox policy does not cover this package manager, applying anyway");
            }
            if let Some(sandbox) = self.sandbox {
                match sandbox.execute(&self.sandbox_policy, &exe, &args) {
                    SandboxOutcome::CommandModified { exe: new_exe, args: new_args } => {
                        exe = new_exe;
                        args = new_args;
                    }
                    SandboxOutcome::Unsandboxed => {
                        self.ui.show_warning("sandbox unavailable, running unsandboxed");
                    }
                }
            }
        }

        let status = tokio::process::Command::new(&exe)
            .args(&args)
            .current_dir(cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await;

        if let Some(sandbox) = self.sandbox {
            if let Err(e) = sandbox.close() {
                warn!(error = %e, "failed to clean up sandbox artifacts");
            }
        }

        match status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(error = %e, "failed to execute package manager");
                None
            }
        }
    }
}

fn extract_manifest_packages(parsed: &ParsedCommand, cwd: &Path) -> Vec<PackageVersion> {
    if !parsed.manifest_files.is_empty() {
        let mut out = Vec::new();
        for file in &parsed.manifest_files {
            let kind = match file.rsplit('/').next().unwrap_or(file) {
                "package-lock.json" => manifest::LockfileKind::NpmLockfile,
                "pnpm-lock.yaml" => manifest::LockfileKind::Pnpm,
                "bun.lock" => manifest::LockfileKind::Bun,
                "uv.lock" => manifest::LockfileKind::UvLock,
                "poetry.lock" => manifest::LockfileKind::Poetry,
                _ => manifest::LockfileKind::Requirements,
            };
            match manifest::extract_file(kind, &cwd.join(file)) {
                Ok(mut pkgs) => out.append(&mut pkgs),
                Err(e) => warn!(file, error = %e, "failed to extract manifest file"),
            }
        }
        return out;
    }

    // No explicit manifest files named by C1 (e.g. bare `npm install`): probe the
    // package.json-adjacent lockfiles.
    manifest::extract_all(cwd, &manifest::default_npm_family_probes())
}

fn dedup_by_fingerprint(packages: &mut Vec<PackageVersion>) {
    let mut seen = std::collections::HashSet::new();
    packages.retain(|pkg| seen.insert(pkg.fingerprint()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_removes_duplicate_fingerprints() {
        let mut packages = vec![
            PackageVersion::new(pmg_common::Ecosystem::Npm, "lodash", "4.17.21"),
            PackageVersion::new(pmg_common::Ecosystem::Npm, "lodash", "4.17.21"),
            PackageVersion::new(pmg_common::Ecosystem::Npm, "left-pad", "1.0.0"),
        ];
        dedup_by_fingerprint(&mut packages);
        assert_eq!(packages.len(), 2);
    }
}
