use std::time::Duration;

/// Error kinds recognized across every PMG layer (§7). Kept coarse and stable so a CLI
/// entry point can map any error, wrapped or raw, to a user-facing exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    Network,
    Timeout,
    Canceled,
    UnexpectedEof,
    Lifecycle,
    PackageManagerExecutionFailed,
    Unknown,
}

/// A structured PMG error: a kind, a human-readable message, and optional help text
/// surfaced to the user (§7, "Propagation policy").
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct PmgError {
    pub kind: ErrorKind,
    pub message: String,
    pub help: Option<String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PmgError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            help: None,
            source: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Canceled, message)
    }

    pub fn pm_execution_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PackageManagerExecutionFailed, message)
    }

    /// Inspect a raw, non-PMG error for a well-known shape (timeouts, I/O not-founds,
    /// EOFs) and wrap it into the structured form. Anything unrecognized becomes
    /// `ErrorKind::Unknown` rather than failing silently.
    pub fn wrap_raw(err: &(dyn std::error::Error + 'static)) -> Self {
        let message = err.to_string();
        let lowered = message.to_lowercase();
        let kind = if lowered.contains("timed out") || lowered.contains("timeout") {
            ErrorKind::Timeout
        } else if lowered.contains("not found") || lowered.contains("no such file") {
            ErrorKind::NotFound
        } else if lowered.contains("connection") || lowered.contains("dns") || lowered.contains("network")
        {
            ErrorKind::Network
        } else if lowered.contains("unexpected end of file") || lowered.contains("eof") {
            ErrorKind::UnexpectedEof
        } else if lowered.contains("cancel") || lowered.contains("interrupted") {
            ErrorKind::Canceled
        } else {
            ErrorKind::Unknown
        };
        Self::new(kind, message)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Network | ErrorKind::Timeout)
    }
}

/// Retry/backoff classification shared by every HTTP-speaking component (registry
/// clients, the analyzer client).
#[derive(Debug, Clone, Copy)]
pub struct RetryAfter(pub Option<Duration>);

pub type PmgResult<T> = Result<T, PmgError>;
