//! Proxy-mode error taxonomy, mapped onto the shared [`pmg_common::PmgError`] kinds.

use pmg_common::{ErrorKind, PmgError};

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("certificate generation failed: {0}")]
    Certificate(String),
    #[error("proxy I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("proxy bind failed: {0}")]
    Bind(String),
    #[error("proxy shutdown timed out")]
    ShutdownTimeout,
    #[error("pty error: {0}")]
    Pty(String),
}

impl From<ProxyError> for PmgError {
    fn from(err: ProxyError) -> Self {
        let kind = match &err {
            ProxyError::Certificate(_) | ProxyError::Bind(_) | ProxyError::Pty(_) => ErrorKind::Lifecycle,
            ProxyError::Io(_) => ErrorKind::Network,
            ProxyError::ShutdownTimeout => ErrorKind::Timeout,
        };
        PmgError::new(kind, err.to_string())
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;
