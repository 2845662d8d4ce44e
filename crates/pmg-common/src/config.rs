use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Process-wide configuration (§3, §6). Populated once from CLI flags layered over an
/// optional YAML config file, then treated as immutable for the rest of the run except
/// for the documented sandbox-enable override applied by the sandbox-policy hook after
/// command parsing (see `pmg_sandbox`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub transitive: bool,
    pub transitive_depth: u32,
    pub include_dev_dependencies: bool,
    pub paranoid: bool,
    pub dry_run: bool,
    pub insecure_installation: bool,
    pub proxy_mode: bool,
    pub trusted_packages: Vec<String>,
    pub sandbox: SandboxConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            transitive: true,
            transitive_depth: 5,
            include_dev_dependencies: false,
            paranoid: false,
            dry_run: false,
            insecure_installation: false,
            proxy_mode: false,
            trusted_packages: Vec::new(),
            sandbox: SandboxConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub enabled: bool,
    pub enforce_always: bool,
    pub policies: HashMap<String, SandboxPmOverride>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            enforce_always: false,
            policies: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxPmOverride {
    pub profile: Option<String>,
    pub enabled: bool,
}

impl Configuration {
    /// Load a YAML config file, falling back to defaults if it does not exist.
    /// Unknown keys are ignored by serde's default struct deserialization.
    pub fn load(path: &Path) -> crate::error::PmgResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::PmgError::not_found(format!("cannot read config {}: {e}", path.display()))
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            crate::error::PmgError::invalid_argument(format!(
                "malformed config {}: {e}",
                path.display()
            ))
        })
    }

    /// The insecure bypass is read from the environment rather than the config file so
    /// it can never be silently checked in to a repository.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PMG_INSECURE_INSTALLATION") {
            self.insecure_installation = is_truthy(&val);
        }
    }
}

fn is_truthy(val: &str) -> bool {
    matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Credentials for the external malware-analysis service, read from the environment.
/// Missing credentials are only fatal when the caller actually needs active scanning —
/// that decision lives with the analyzer client, not here.
#[derive(Debug, Clone)]
pub struct SafeDepCredentials {
    pub api_key: Option<String>,
    pub tenant_id: Option<String>,
}

impl SafeDepCredentials {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("SAFEDEP_API_KEY").ok(),
            tenant_id: std::env::var("SAFEDEP_TENANT_ID").ok(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.api_key.is_some() && self.tenant_id.is_some()
    }
}
