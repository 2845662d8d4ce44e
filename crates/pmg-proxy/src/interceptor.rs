//! The interceptor contract (C9 implements this against C8's dispatch loop).

use async_trait::async_trait;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Per-request context handed to every interceptor, built fresh for each CONNECT or
/// plain HTTP request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: String,
    pub url: String,
    pub hostname: String,
    pub headers: HashMap<String, String>,
    pub start_time: Instant,
    /// Free-form annotations interceptors can stash for later phases (e.g. the
    /// `(ecosystem, name, version)` extracted during `ShouldIntercept`/`HandleRequest`).
    pub bag: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, url: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            request_id: new_request_id(),
            method: method.into(),
            url: url.into(),
            hostname: hostname.into(),
            headers: HashMap::new(),
            start_time: Instant::now(),
            bag: HashMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }
}

/// 8 random bytes, hex-encoded, unique per request (property P8).
fn new_request_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A response-phase modifier registered by `MODIFY_RESPONSE`.
pub type ResponseModifier = Arc<dyn Fn(&mut ResponseParts) + Send + Sync>;

/// The subset of a response an interceptor is allowed to mutate in the response phase.
#[derive(Debug, Default)]
pub struct ResponseParts {
    pub status: u16,
    pub headers: HashMap<String, String>,
}

/// The action an interceptor wants C8 to take for a request.
pub enum InterceptAction {
    Allow,
    Block { status: u16, body: String },
    ModifyRequest { headers: HashMap<String, String> },
    ModifyResponse(ResponseModifier),
}

impl std::fmt::Debug for InterceptAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterceptAction::Allow => write!(f, "Allow"),
            InterceptAction::Block { status, .. } => write!(f, "Block({status})"),
            InterceptAction::ModifyRequest { .. } => write!(f, "ModifyRequest"),
            InterceptAction::ModifyResponse(_) => write!(f, "ModifyResponse"),
        }
    }
}

/// An ecosystem or policy interceptor registered with the proxy server (C8/C9).
#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this interceptor wants to see `ctx` at all — for CONNECTs, a "yes" vote
    /// triggers MITM; for plain requests, a "no" skips straight past `handle_request`.
    fn should_intercept(&self, ctx: &RequestContext) -> bool;

    async fn handle_request(&self, ctx: &RequestContext) -> InterceptAction;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn request_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| new_request_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
