//! The malware-analysis client (C5): query mode (single stateless lookup) and
//! active-scan / paranoid mode (submit → analysis_id → poll report), sharing one
//! per-run verdict cache.

use crate::cache::VerdictCache;
use crate::error::{AnalyzerError, AnalyzerResult};
use pmg_common::{AnalysisVerdict, PackageVersion, SafeDepCredentials, VerdictKind};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.safedep.io/v1";
const POLL_INTERVAL: Duration = Duration::from_millis(750);
const POLL_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// A single stateless lookup; unknown resolves to SAFE.
    Query,
    /// Submit a scan request, then poll for the report; unknown resolves to SUSPICIOUS
    /// because the caller explicitly opted into active scanning.
    ActiveScan,
}

pub struct AnalyzerClient {
    http: reqwest::Client,
    base_url: String,
    credentials: SafeDepCredentials,
    mode: AnalysisMode,
    cache: VerdictCache,
}

impl AnalyzerClient {
    /// Build a client for the given mode. Per §4.5, missing credentials when the mode
    /// is active-scan is a fatal startup error, not a lazily-surfaced one.
    pub fn new(mode: AnalysisMode, credentials: SafeDepCredentials) -> AnalyzerResult<Self> {
        Self::with_base_url(DEFAULT_BASE_URL.to_string(), mode, credentials)
    }

    pub fn with_base_url(
        base_url: String,
        mode: AnalysisMode,
        credentials: SafeDepCredentials,
    ) -> AnalyzerResult<Self> {
        if mode == AnalysisMode::ActiveScan && !credentials.is_complete() {
            return Err(AnalyzerError::MissingCredentials);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AnalyzerError::Network {
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            http,
            base_url,
            credentials,
            mode,
            cache: VerdictCache::new(),
        })
    }

    pub fn cache(&self) -> &VerdictCache {
        &self.cache
    }

    /// Analyze one package, consulting the shared cache first (P3: at most one call per
    /// fingerprint per run).
    pub async fn analyze(&self, pkg: &PackageVersion) -> AnalyzerResult<AnalysisVerdict> {
        let fingerprint = pkg.fingerprint();
        let reservation = match self.cache.get_or_reserve(&fingerprint).await {
            crate::cache::CacheLookup::Hit(cached) => {
                debug!(%fingerprint, "analyzer cache hit");
                return Ok(cached);
            }
            crate::cache::CacheLookup::Reserved(reservation) => reservation,
        };

        let result = match self.mode {
            AnalysisMode::Query => self.query_once(pkg).await,
            AnalysisMode::ActiveScan => self.active_scan(pkg).await,
        };
        match result {
            Ok(verdict) => {
                reservation.fulfill(verdict.clone()).await;
                Ok(verdict)
            }
            Err(e) => {
                reservation.abandon().await;
                Err(e)
            }
        }
    }

    fn auth_headers(&self) -> AnalyzerResult<(String, String)> {
        let api_key = self
            .credentials
            .api_key
            .clone()
            .ok_or(AnalyzerError::MissingCredentials)?;
        let tenant_id = self
            .credentials
            .tenant_id
            .clone()
            .ok_or(AnalyzerError::MissingCredentials)?;
        Ok((api_key, tenant_id))
    }

    async fn query_once(&self, pkg: &PackageVersion) -> AnalyzerResult<AnalysisVerdict> {
        let (api_key, tenant_id) = self.auth_headers()?;
        let url = format!("{}/packages/query", self.base_url);
        let response: QueryResponse = self
            .http
            .post(&url)
            .header("X-SafeDep-Api-Key", api_key)
            .header("X-SafeDep-Tenant-Id", tenant_id)
            .json(&QueryRequest {
                ecosystem: pkg.ecosystem.as_str(),
                name: &pkg.name,
                version: &pkg.version,
            })
            .send()
            .await
            .map_err(|e| AnalyzerError::Network {
                message: format!("analysis query failed: {e}"),
            })?
            .json()
            .await
            .map_err(|e| AnalyzerError::InvalidResponse {
                message: format!("invalid query response: {e}"),
            })?;

        let kind = map_remote_kind(&response.verdict).resolve_unknown(false);
        Ok(AnalysisVerdict {
            pkg_version: pkg.clone(),
            kind,
            summary: response.summary,
            reference_url: response.reference_url,
        })
    }

    async fn active_scan(&self, pkg: &PackageVersion) -> AnalyzerResult<AnalysisVerdict> {
        let (api_key, tenant_id) = self.auth_headers()?;
        let submit_url = format!("{}/packages/scan", self.base_url);
        let submit: SubmitResponse = self
            .http
            .post(&submit_url)
            .header("X-SafeDep-Api-Key", api_key.clone())
            .header("X-SafeDep-Tenant-Id", tenant_id.clone())
            .json(&QueryRequest {
                ecosystem: pkg.ecosystem.as_str(),
                name: &pkg.name,
                version: &pkg.version,
            })
            .send()
            .await
            .map_err(|e| AnalyzerError::Network {
                message: format!("scan submission failed: {e}"),
            })?
            .json()
            .await
            .map_err(|e| AnalyzerError::InvalidResponse {
                message: format!("invalid scan-submit response: {e}"),
            })?;

        let report_url = format!("{}/packages/scan/{}", self.base_url, submit.analysis_id);
        let deadline = tokio::time::Instant::now() + POLL_TIMEOUT;
        loop {
            let report: ReportResponse = self
                .http
                .get(&report_url)
                .header("X-SafeDep-Api-Key", api_key.clone())
                .header("X-SafeDep-Tenant-Id", tenant_id.clone())
                .send()
                .await
                .map_err(|e| AnalyzerError::Network {
                    message: format!("scan poll failed: {e}"),
                })?
                .json()
                .await
                .map_err(|e| AnalyzerError::InvalidResponse {
                    message: format!("invalid scan report: {e}"),
                })?;

            if report.status == "completed" {
                let kind = map_remote_kind(report.verdict.as_deref().unwrap_or("UNKNOWN"))
                    .resolve_unknown(true);
                return Ok(AnalysisVerdict {
                    pkg_version: pkg.clone(),
                    kind,
                    summary: report.summary,
                    reference_url: report.reference_url,
                });
            }

            if tokio::time::Instant::now() >= deadline {
                warn!(package = %pkg, "active scan poll timed out, treating as suspicious");
                return Ok(AnalysisVerdict {
                    pkg_version: pkg.clone(),
                    kind: VerdictKind::Suspicious,
                    summary: Some("analysis timed out".to_string()),
                    reference_url: None,
                });
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

fn map_remote_kind(raw: &str) -> VerdictKind {
    match raw.to_uppercase().as_str() {
        "SAFE" => VerdictKind::Safe,
        "SUSPICIOUS" => VerdictKind::Suspicious,
        "MALICIOUS" => VerdictKind::Malicious,
        "ERROR" => VerdictKind::Error,
        _ => VerdictKind::Unknown,
    }
}

#[derive(serde::Serialize)]
struct QueryRequest<'a> {
    ecosystem: &'a str,
    name: &'a str,
    version: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    verdict: String,
    summary: Option<String>,
    reference_url: Option<String>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    analysis_id: String,
}

#[derive(Deserialize)]
struct ReportResponse {
    status: String,
    verdict: Option<String>,
    summary: Option<String>,
    reference_url: Option<String>,
}
