//! The npm ecosystem interceptor (C9): recognizes the npm registry and its mirrors,
//! classifies metadata vs tarball fetches, and consults C5 for tarball fetches only.

use crate::confirmation::{ConfirmationRequest, ConfirmationSender};
use crate::interceptor::{InterceptAction, Interceptor, RequestContext};
use async_trait::async_trait;
use pmg_analyzer::AnalyzerClient;
use pmg_common::{Ecosystem, PackageVersion, VerdictKind};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::warn;

const NPM_HOSTS: &[&str] = &["registry.npmjs.org", "registry.yarnpkg.com"];

fn tarball_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"/(?:(@[^/]+)/)?([^/@][^/]*)/-/[^/]+-([0-9][^/]*)\.tgz$")
            .expect("static npm tarball regex")
    })
}

/// Extract `(name, version)` from an npm tarball URL path, e.g.
/// `/left-pad/-/left-pad-1.3.0.tgz` or `/@babel/core/-/core-7.20.0.tgz`. Returns `None`
/// for metadata fetches (package/version JSON documents).
fn extract_npm_artifact(url: &str) -> Option<(String, String)> {
    let caps = tarball_regex().captures(url)?;
    let version = caps.get(3)?.as_str().to_string();
    let name = match caps.get(1) {
        Some(scope) => format!("{}/{}", scope.as_str(), caps.get(2)?.as_str()),
        None => caps.get(2)?.as_str().to_string(),
    };
    Some((name, version))
}

pub struct NpmInterceptor {
    analyzer: Arc<AnalyzerClient>,
    confirmations: ConfirmationSender,
    insecure_installation: bool,
}

impl NpmInterceptor {
    pub fn new(analyzer: Arc<AnalyzerClient>, confirmations: ConfirmationSender, insecure_installation: bool) -> Self {
        Self { analyzer, confirmations, insecure_installation }
    }
}

#[async_trait]
impl Interceptor for NpmInterceptor {
    fn name(&self) -> &str {
        "npm"
    }

    fn should_intercept(&self, ctx: &RequestContext) -> bool {
        NPM_HOSTS.iter().any(|host| ctx.hostname == *host || ctx.hostname.ends_with(&format!(".{host}")))
    }

    async fn handle_request(&self, ctx: &RequestContext) -> InterceptAction {
        let Some((name, version)) = extract_npm_artifact(&ctx.url) else {
            // Metadata fetch (package document / dist-tags) — always ALLOW.
            return InterceptAction::Allow;
        };

        let pkg = PackageVersion::new(Ecosystem::Npm, name, version);
        let verdict = match self.analyzer.analyze(&pkg).await {
            Ok(v) => v,
            Err(e) => {
                warn!(package = %pkg, error = %e, "analyzer call failed for tarball fetch, allowing");
                return InterceptAction::Allow;
            }
        };

        match verdict.kind {
            VerdictKind::Malicious | VerdictKind::Suspicious => {
                if self.insecure_installation {
                    warn!(package = %pkg, "insecure_installation set, bypassing block for flagged tarball fetch");
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
    fn extracts_unscoped_tarball() {
        let (name, version) = extract_npm_artifact("/left-pad/-/left-pad-1.3.0.tgz").unwrap();
        assert_eq!(name, "left-pad");
        assert_eq!(version, "1.3.0");
    }

    #[test]
    fn extracts_scoped_tarball() {
        let (name, version) = extract_npm_artifact("/@babel/core/-/core-7.20.0.tgz").unwrap();
        assert_eq!(name, "@babel/core");
        assert_eq!(version, "7.20.0");
    }

    #[test]
    fn metadata_fetch_is_not_an_artifact() {
        assert!(extract_npm_artifact("/left-pad").is_none());
        assert!(extract_npm_artifact("/@babel/core").is_none());
    }
}
