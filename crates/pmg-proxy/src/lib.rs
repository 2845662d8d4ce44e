//! Proxy mode (C7–C10): a local HTTPS MITM proxy that selectively intercepts
//! ecosystem-registry traffic, plus the PTY switchboard that lets a synchronous
//! malware-confirmation prompt interrupt a running package manager's live output.

pub mod cert;
pub mod confirmation;
pub mod error;
pub mod interceptor;
pub mod npm_interceptor;
pub mod pty;
pub mod pypi_interceptor;
pub mod server;

pub use cert::CertificateAuthority;
pub use confirmation::{ConfirmationReceiver, ConfirmationRequest, ConfirmationSender};
pub use error::{ProxyError, ProxyResult};
pub use interceptor::{InterceptAction, Interceptor, RequestContext, ResponseParts};
pub use npm_interceptor::NpmInterceptor;
pub use pty::{stdin_is_interactive, InteractionHandle, OutputRouter, PromptReader, PtySwitchboard, TerminalMode};
pub use pypi_interceptor::PypiInterceptor;
pub use server::{ProxyConfig, ProxyHandle, ProxyServer};
