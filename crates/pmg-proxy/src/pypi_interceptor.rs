//! The PyPI ecosystem interceptor (C9): recognizes pypi.org / files.pythonhosted.org
//! and classifies metadata (JSON/simple index) fetches from wheel/sdist fetches.

use crate::confirmation::{ConfirmationRequest, ConfirmationSender};
use crate::interceptor::{InterceptAction, Interceptor, RequestContext};
use async_trait::async_trait;
use pmg_analyzer::AnalyzerClient;
use pmg_common::{Ecosystem, PackageVersion, VerdictKind};
use std::sync::Arc;
use tracing::warn;

const PYPI_HOSTS: &[&str] = &["pypi.org", "files.pythonhosted.org"];

const ARTIFACT_EXTENSIONS: &[&str] = &[".tar.gz", ".whl", ".zip"];

/// Extract `(name, version)` from a wheel/sdist filename. Approximate: wheel/sdist
/// filenames are `name-version[-build-pytag-abitag-platform].ext`; this takes the
/// first hyphen-delimited segment that starts with a digit as the version and joins
/// everything before it as the name. Good enough to key the analysis cache; not a
/// PEP 427 parser.
fn extract_pypi_artifact(url: &str) -> Option<(String, String)> {
    let filename = url.rsplit('/').next()?;
    let stem = ARTIFACT_EXTENSIONS
        .iter()
        .find_map(|ext| filename.strip_suffix(ext))?;

    let parts: Vec<&str> = stem.split('-').collect();
    let version_idx = parts
        .iter()
        .position(|part| part.chars().next().is_some_and(|c| c.is_ascii_digit()))?;
    if version_idx == 0 {
        return None;
    }

    let name = parts[..version_idx].join("-");
    let version = parts[version_idx].to_string();
    Some((name, version))
}

pub struct PypiInterceptor {
    analyzer: Arc<AnalyzerClient>,
    confirmations: ConfirmationSender,
    insecure_installation: bool,
}

impl PypiInterceptor {
    pub fn new(analyzer: Arc<AnalyzerClient>, confirmations: ConfirmationSender, insecure_installation: bool) -> Self {
        Self { analyzer, confirmations, insecure_installation }
    }
}

#[async_trait]
impl Interceptor for PypiInterceptor {
    fn name(&self) -> &str {
        "pypi"
    }

    fn should_intercept(&self, ctx: &RequestContext) -> bool {
        PYPI_HOSTS.iter().any(|host| ctx.hostname == *host || ctx.hostname.ends_with(&format!(".{host}")))
    }

    async fn handle_request(&self, ctx: &RequestContext) -> InterceptAction {
        let Some((name, version)) = extract_pypi_artifact(&ctx.url) else {
            return InterceptAction::Allow;
        };

        let pkg = PackageVersion::new(Ecosystem::PyPi, name, version);
        let verdict = match self.analyzer.analyze(&pkg).await {
            Ok(v) => v,
            Err(e) => {
                warn!(package = %pkg, error = %e, "analyzer call failed for artifact fetch, allowing");
                return InterceptAction::Allow;
            }
        };

        match verdict.kind {
            VerdictKind::Malicious | VerdictKind::Suspicious => {
                if self.insecure_installation {
                    warn!(package = %pkg, "insecure_installation set, bypassing block for flagged artifact fetch");
                    return InterceptAction::Allow;
                }
                let request = ConfirmationRequest {
                    package: pkg,
                    verdict,
                    request_id: ctx.request_id.clone(),
                };
                if self.confirmations.send(request).await.is_err() {
                    warn!("confirmation channel closed, dropping notification");
                }
                InterceptAction::Block {
                    status: 403,
                    body: "Blocked by proxy interceptor".to_string(),
                }
            }
            VerdictKind::Safe | VerdictKind::Unknown | VerdictKind::Error => InterceptAction::Allow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_sdist() {
        let (name, version) = extract_pypi_artifact("/packages/ab/cd/requests-2.31.0.tar.gz").unwrap();
        assert_eq!(name, "requests");
        assert_eq!(version, "2.31.0");
    }

    #[test]
    fn extracts_wheel_with_hyphenated_name() {
        let (name, version) =
            extract_pypi_artifact("/packages/ab/cd/scikit-learn-1.3.0-cp311-cp311-manylinux.whl").unwrap();
        assert_eq!(name, "scikit-learn");
        assert_eq!(version, "1.3.0");
    }

    #[test]
    fn metadata_fetch_is_not_an_artifact() {
        assert!(extract_pypi_artifact("/pypi/requests/json").is_none());
        assert!(extract_pypi_artifact("/simple/requests/").is_none());
    }
}
