//! Proxy Server (C8): a localhost CONNECT/HTTP proxy that selectively MITMs traffic
//! based on the registered interceptor chain's vote, dispatches to it, and tunnels
//! everything else transparently.

use crate::cert::CertificateAuthority;
use crate::interceptor::{InterceptAction, Interceptor, RequestContext, ResponseParts};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, RwLock};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, warn};

/// Timeouts and defaults from §5 ("Cancellation and timeouts").
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(5 * 60),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

type ResponseBody = BoxBody<Bytes, hyper::Error>;

fn full_body(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into()).map_err(|never| match never {}).boxed()
}

/// `Start()`/`Stop(ctx)` handle returned once the accept loop is running.
pub struct ProxyHandle {
    pub port: u16,
    shutdown: Arc<Notify>,
    join: tokio::task::JoinHandle<()>,
}

impl ProxyHandle {
    /// Graceful shutdown bounded by `ProxyConfig::shutdown_timeout` (§4.8 Lifecycle).
    pub async fn stop(self, timeout: Duration) {
        self.shutdown.notify_one();
        if tokio::time::timeout(timeout, self.join).await.is_err() {
            warn!("proxy server did not shut down within the timeout, abandoning accept loop");
        }
    }
}

pub struct ProxyServer {
    ca: Arc<CertificateAuthority>,
    interceptors: RwLock<Vec<Arc<dyn Interceptor>>>,
    upstream: reqwest::Client,
    config: ProxyConfig,
}

impl ProxyServer {
    pub fn new(ca: Arc<CertificateAuthority>, config: ProxyConfig) -> Arc<Self> {
        // Upstream client: verified certs, TLS >= 1.2 (both reqwest/rustls-tls
        // defaults) — the hard invariant from §4.8 "Upstream TLS".
        let upstream = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .expect("reqwest client builder with valid timeouts");

        Arc::new(Self {
            ca,
            interceptors: RwLock::new(Vec::new()),
            upstream,
            config,
        })
    }

    /// Registration is RW-locked; dispatch takes the read side (§5, Shared-resource
    /// policy).
    pub async fn register(&self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.write().await.push(interceptor);
    }

    pub async fn start(self: Arc<Self>) -> crate::error::ProxyResult<ProxyHandle> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        let shutdown = Arc::new(Notify::new());
        let shutdown_for_loop = Arc::clone(&shutdown);
        let server = Arc::clone(&self);

        let join = tokio::spawn(async move {
            server.accept_loop(listener, shutdown_for_loop).await;
        });

        debug!(port, "proxy server listening");
        Ok(ProxyHandle { port, shutdown, join })
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener, shutdown: Arc<Notify>) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("proxy server shutting down");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let server = Arc::clone(&self);
                            // One bad connection never tears down the accept loop
                            // (§5 Recovery: "C8 recovers per-request").
                            tokio::spawn(async move {
                                if let Err(e) = server.serve_connection(stream).await {
                                    warn!(error = %e, "connection handler failed");
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
            }
        }
    }

    async fn serve_connection(self: Arc<Self>, stream: TcpStream) -> crate::error::ProxyResult<()> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(&self);
        let service = service_fn(move |req| {
            let server = Arc::clone(&server);
            async move { server.route(req).await }
        });

        http1::Builder::new()
            .serve_connection(io, service)
            .with_upgrades()
            .await
            .map_err(|e| crate::error::ProxyError::Io(std::io::Error::other(e.to_string())))
    }

    async fn route(
        self: Arc<Self>,
        req: Request<Incoming>,
    ) -> Result<Response<ResponseBody>, hyper::Error> {
        if req.method() == Method::CONNECT {
            Ok(self.handle_connect(req).await)
        } else {
            Ok(self.handle_plain(req).await)
        }
    }

    async fn handle_connect(self: Arc<Self>, req: Request<Incoming>) -> Response<ResponseBody> {
        let Some(authority) = req.uri().authority().cloned() else {
            return synthesize(StatusCode::BAD_REQUEST, "malformed CONNECT target");
        };
        let hostname = authority.host().to_string();
        let port = authority.port_u16().unwrap_or(443);

        let ctx = RequestContext::new("CONNECT", authority.as_str(), hostname.clone());
        let intercept = {
            let guard = self.interceptors.read().await;
            guard.iter().any(|i| i.should_intercept(&ctx))
        };

        let server = Arc::clone(&self);
        tokio::spawn(async move {
            match hyper::upgrade::on(req).await {
                Ok(upgraded) => {
                    let io = TokioIo::new(upgraded);
                    if intercept {
                        server.mitm_tls(io, hostname).await;
                    } else {
                        server.tunnel(io, &hostname, port).await;
                    }
                }
                Err(e) => warn!(error = %e, "CONNECT upgrade failed"),
            }
        });

        Response::builder()
            .status(StatusCode::OK)
            .body(full_body(Bytes::new()))
            .expect("valid CONNECT response")
    }

    /// Transparent TCP tunnel for hosts no interceptor wants to see (§4.8 CONNECT,
    /// "Otherwise, transparent TCP tunnel").
    async fn tunnel(&self, mut client_io: impl tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin, host: &str, port: u16) {
        match TcpStream::connect((host, port)).await {
            Ok(mut upstream) => {
                if let Err(e) = tokio::io::copy_bidirectional(&mut client_io, &mut upstream).await {
                    debug!(host, error = %e, "tunnel closed");
                }
            }
            Err(e) => warn!(host, error = %e, "failed to connect upstream for tunnel"),
        }
    }

    /// MITM a CONNECT tunnel: terminate TLS with a leaf cert for `hostname`, then serve
    /// HTTP1 over the decrypted stream, forwarding each request through the same
    /// interceptor dispatch as direct plain requests.
    async fn mitm_tls(self: Arc<Self>, client_io: TokioIo<hyper::upgrade::Upgraded>, hostname: String) {
        let tls_config = match self.ca.tls_config_for(&hostname) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(hostname, error = %e, "failed to mint MITM leaf certificate");
                return;
            }
        };
        let acceptor = TlsAcceptor::from(tls_config);
        let tls_stream = match acceptor.accept(client_io).await {
            Ok(s) => s,
            Err(e) => {
                warn!(hostname, error = %e, "TLS handshake with client failed");
                return;
            }
        };

        let io = TokioIo::new(tls_stream);
        let server = Arc::clone(&self);
        let host_for_service = hostname.clone();
        let service = service_fn(move |req| {
            let server = Arc::clone(&server);
            let hostname = host_for_service.clone();
            async move { Ok::<_, hyper::Error>(server.handle_decrypted(req, hostname).await) }
        });

        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
            debug!(hostname, error = %e, "MITM connection closed");
        }
    }

    async fn handle_decrypted(
        self: Arc<Self>,
        req: Request<Incoming>,
        hostname: String,
    ) -> Response<ResponseBody> {
        let path = req.uri().path_and_query().map(|pq| pq.as_str().to_string()).unwrap_or_default();
        let url = format!("https://{hostname}{path}");
        self.dispatch_and_forward(req, hostname, url).await
    }

    async fn handle_plain(self: Arc<Self>, req: Request<Incoming>) -> Response<ResponseBody> {
        let hostname = req
            .uri()
            .host()
            .map(str::to_string)
            .or_else(|| header_value(&req, "host"))
            .unwrap_or_default();
        let url = req.uri().to_string();
        self.dispatch_and_forward(req, hostname, url).await
    }

    async fn dispatch_and_forward(
        self: Arc<Self>,
        req: Request<Incoming>,
        hostname: String,
        url: String,
    ) -> Response<ResponseBody> {
        let method = req.method().to_string();
        let mut headers = HashMap::new();
        for (name, value) in req.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_string(), v.to_string());
            }
        }

        let ctx = RequestContext::new(method.clone(), url.clone(), hostname.clone()).with_headers(headers.clone());

        let mut header_overrides: Option<HashMap<String, String>> = None;
        let mut modifier = None;
        let mut blocked = None;

        let matching: Vec<Arc<dyn Interceptor>> = {
            let guard = self.interceptors.read().await;
            guard.iter().filter(|i| i.should_intercept(&ctx)).cloned().collect()
        };

        for interceptor in matching {
            match interceptor.handle_request(&ctx).await {
                InterceptAction::Allow => {}
                InterceptAction::Block { status, body } => {
                    blocked = Some((status, body));
                    break;
                }
                InterceptAction::ModifyRequest { headers } => header_overrides = Some(headers),
                InterceptAction::ModifyResponse(m) => modifier = Some(m),
            }
        }

        if let Some((status, body)) = blocked {
            return synthesize_blocked(status, &body);
        }

        let body_bytes = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(error = %e, "failed to read request body");
                return synthesize(StatusCode::BAD_GATEWAY, "failed to read request body");
            }
        };

        let mut upstream_req = self.upstream.request(
            method.parse().unwrap_or(reqwest::Method::GET),
            &url,
        );
        let effective_headers = header_overrides.as_ref().unwrap_or(&headers);
        for (name, value) in effective_headers {
            if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("proxy-connection") {
                continue;
            }
            upstream_req = upstream_req.header(name, value);
        }
        if !body_bytes.is_empty() {
            upstream_req = upstream_req.body(body_bytes.to_vec());
        }

        let response = match upstream_req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url, error = %e, "upstream request failed");
                return synthesize(StatusCode::BAD_GATEWAY, "upstream request failed");
            }
        };

        let mut parts = ResponseParts {
            status: response.status().as_u16(),
            headers: response
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                .collect(),
        };
        if let Some(modifier) = modifier {
            modifier(&mut parts);
        }

        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(url, error = %e, "failed to read upstream body");
                return synthesize(StatusCode::BAD_GATEWAY, "failed to read upstream body");
            }
        };

        let mut builder = Response::builder().status(
            StatusCode::from_u16(parts.status).unwrap_or(StatusCode::BAD_GATEWAY),
        );
        for (name, value) in &parts.headers {
            builder = builder.header(name, value);
        }
        builder.body(full_body(body)).unwrap_or_else(|_| synthesize(StatusCode::BAD_GATEWAY, "malformed response"))
    }
}

fn header_value(req: &Request<Incoming>, name: &str) -> Option<String> {
    req.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn synthesize(status: StatusCode, body: &str) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header("Connection", "close")
        .body(full_body(Bytes::copy_from_slice(body.as_bytes())))
        .expect("valid synthetic response")
}

/// A BLOCK response per §4.8: configurable status/body, forced `Connection: close` +
/// `Proxy-Connection: close`, HTTP/1.1 explicitly to dodge a downstream HTTP/0.9
/// inference bug in some clients.
fn synthesize_blocked(status: u16, body: &str) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::from_u16(status).unwrap_or(StatusCode::FORBIDDEN))
        .version(hyper::Version::HTTP_11)
        .header("Connection", "close")
        .header("Proxy-Connection", "close")
        .header("Content-Type", "text/plain")
        .body(full_body(Bytes::copy_from_slice(body.as_bytes())))
        .expect("valid block response")
}
