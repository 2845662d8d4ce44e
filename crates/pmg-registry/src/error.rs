use std::time::Duration;

/// Errors surfaced by registry clients and the resolver.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("package not found: {name}@{version}")]
    NotFound { name: String, version: String },

    #[error("rate limited: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("invalid response from registry: {message}")]
    InvalidResponse { message: String },

    #[error("no version of {name} satisfies {constraint}")]
    NoMatchingVersion { name: String, constraint: String },

    #[error("manifest error: {message}")]
    Manifest { message: String },
}

impl RegistryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::Network { .. } | RegistryError::RateLimited { .. })
    }
}

impl From<RegistryError> for pmg_common::PmgError {
    fn from(err: RegistryError) -> Self {
        use pmg_common::ErrorKind;
        let kind = match &err {
            RegistryError::NotFound { .. } => ErrorKind::NotFound,
            RegistryError::RateLimited { .. } | RegistryError::Network { .. } => ErrorKind::Network,
            RegistryError::InvalidResponse { .. }
            | RegistryError::NoMatchingVersion { .. }
            | RegistryError::Manifest { .. } => ErrorKind::Unknown,
        };
        pmg_common::PmgError::new(kind, err.to_string())
    }
}

pub type RegistryResult<T> = Result<T, RegistryError>;
