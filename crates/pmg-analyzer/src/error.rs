use std::time::Duration;

/// Errors surfaced by the malware-analysis client.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("missing analysis credentials: set SAFEDEP_API_KEY and SAFEDEP_TENANT_ID")]
    MissingCredentials,

    #[error("rate limited: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("invalid response from analysis service: {message}")]
    InvalidResponse { message: String },

    #[error("analysis request canceled")]
    Canceled,
}

impl AnalyzerError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalyzerError::Network { .. } | AnalyzerError::RateLimited { .. }
        )
    }
}

impl From<AnalyzerError> for pmg_common::PmgError {
    fn from(err: AnalyzerError) -> Self {
        use pmg_common::ErrorKind;
        let kind = match &err {
            AnalyzerError::MissingCredentials => ErrorKind::InvalidArgument,
            AnalyzerError::RateLimited { .. } | AnalyzerError::Network { .. } => ErrorKind::Network,
            AnalyzerError::InvalidResponse { .. } => ErrorKind::Unknown,
            AnalyzerError::Canceled => ErrorKind::Canceled,
        };
        pmg_common::PmgError::new(kind, err.to_string())
    }
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;
