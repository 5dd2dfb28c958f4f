//! Local HTTP listener that receives the OAuth2 redirect
//!
//! One server lives for one authentication attempt. The waiting future owns
//! the listener and both timers, so whichever of callback, timeout, grace
//! period or accept failure settles first drops everything else with it.

use crate::pages;
use crate::{AuthError, AuthResult};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Path the provider redirects to
pub const CALLBACK_PATH: &str = "/callback";

/// How long to wait for the browser redirect
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Delay between serving the missing-code page and giving up
pub const MISSING_CODE_GRACE: Duration = Duration::from_millis(2000);

const MAX_REQUEST_HEAD: u64 = 8 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// What the provider handed back on a successful redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCallback {
    pub code: String,
    pub state: Option<String>,
}

/// Outcome one request contributes to the pending authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Settlement {
    Code(AuthCallback),
    ProviderError {
        error: String,
        description: Option<String>,
    },
    MissingCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Response {
    pub status: u16,
    pub body: String,
    pub html: bool,
}

impl Response {
    fn html(status: u16, body: String) -> Self {
        Self {
            status,
            body,
            html: true,
        }
    }

    fn not_found(body: &str) -> Self {
        Self {
            status: 404,
            body: body.to_string(),
            html: false,
        }
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            _ => "Unknown",
        }
    }
}

/// Decide the response and settlement for one request target
pub(crate) fn route(target: &str) -> (Response, Option<Settlement>) {
    if target.contains("favicon") || target.contains("service-worker") {
        return (Response::not_found(""), None);
    }

    let url = match url::Url::parse(&format!("http://localhost{}", target)) {
        Ok(url) if target.starts_with('/') => url,
        _ => return (Response::not_found("Page not found"), None),
    };

    match url.path() {
        CALLBACK_PATH => {
            let param = |name: &str| {
                url.query_pairs()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.into_owned())
                    .filter(|v| !v.is_empty())
            };
            let code = param("code");
            let state = param("state");
            let error = param("error");
            let description = param("error_description");

            debug!(
                "Callback parameters: code={} error={:?} description={:?}",
                if code.is_some() { "PRESENT" } else { "MISSING" },
                error,
                description
            );

            if let Some(error) = error {
                let page = pages::error_page(&error, description.as_deref());
                return (
                    Response::html(400, page),
                    Some(Settlement::ProviderError { error, description }),
                );
            }

            match code {
                Some(code) => {
                    let page = pages::success_page(&code);
                    (
                        Response::html(200, page),
                        Some(Settlement::Code(AuthCallback { code, state })),
                    )
                }
                None => (
                    Response::html(400, pages::missing_code_page(target)),
                    Some(Settlement::MissingCode),
                ),
            }
        }
        "/" | "/auth" => (Response::html(200, pages::help_page()), None),
        _ => (Response::not_found("Page not found"), None),
    }
}

/// A bound loopback listener waiting for exactly one redirect
pub struct LoopbackServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    /// `[::1]` on the same port, for browsers resolving `localhost` to IPv6
    ipv6: Option<TcpListener>,
}

impl LoopbackServer {
    /// Bind the listener. Fails immediately if the address is taken.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> AuthResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AuthError::CallbackServerFailed(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AuthError::CallbackServerFailed(e.to_string()))?;

        debug!("Authentication server started on {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
            ipv6: None,
        })
    }

    /// Bind `127.0.0.1:port`, plus `[::1]` on the same port when available
    pub async fn bind_loopback(port: u16) -> AuthResult<Self> {
        let mut server = Self::bind((Ipv4Addr::LOCALHOST, port)).await?;
        match TcpListener::bind((Ipv6Addr::LOCALHOST, server.local_addr.port())).await {
            Ok(listener) => server.ipv6 = Some(listener),
            Err(e) => debug!("IPv6 loopback not available: {}", e),
        }
        Ok(server)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn ipv6_addr(&self) -> Option<SocketAddr> {
        self.ipv6.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Serve requests until the first settling event, then close.
    pub async fn wait(self, timeout: Duration) -> AuthResult<AuthCallback> {
        let (tx, mut rx) = mpsc::channel::<Settlement>(8);

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        // Armed by the first missing-code callback
        let grace = tokio::time::sleep(MISSING_CODE_GRACE);
        tokio::pin!(grace);
        let mut grace_armed = false;

        let result = loop {
            tokio::select! {
                _ = &mut deadline => {
                    warn!("Timeout reached after {}s without a callback", timeout.as_secs());
                    break Err(AuthError::Timeout(timeout));
                }
                _ = &mut grace, if grace_armed => {
                    break Err(AuthError::MissingCode);
                }
                Some(settlement) = rx.recv() => match settlement {
                    Settlement::Code(callback) => {
                        let preview: String = callback.code.chars().take(10).collect();
                        debug!("Authorization code received: {}...", preview);
                        break Ok(callback);
                    }
                    Settlement::ProviderError { error, description } => {
                        error!("OAuth Error: {} - {:?}", error, description);
                        break Err(AuthError::AuthorizationFailed { error, description });
                    }
                    Settlement::MissingCode => {
                        error!("No authorization code in callback request");
                        if !grace_armed {
                            grace.as_mut().reset(Instant::now() + MISSING_CODE_GRACE);
                            grace_armed = true;
                        }
                    }
                },
                accepted = accept_any(&self.listener, self.ipv6.as_ref()) => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Connection from {}", peer);
                        tokio::spawn(serve_connection(stream, tx.clone()));
                    }
                    Err(e) => {
                        error!("Callback server error: {}", e);
                        break Err(AuthError::IoError(e));
                    }
                },
            }
        };

        info!("Authentication server on {} closed", self.local_addr);
        result
    }
}

/// Bind the loopback addresses on `port` and wait for the redirect
pub async fn await_authorization_code(port: u16, timeout: Duration) -> AuthResult<AuthCallback> {
    LoopbackServer::bind_loopback(port)
        .await?
        .wait(timeout)
        .await
}

async fn accept_any(
    primary: &TcpListener,
    secondary: Option<&TcpListener>,
) -> std::io::Result<(TcpStream, SocketAddr)> {
    match secondary {
        Some(secondary) => tokio::select! {
            accepted = primary.accept() => accepted,
            accepted = secondary.accept() => accepted,
        },
        None => primary.accept().await,
    }
}

async fn serve_connection(mut stream: TcpStream, tx: mpsc::Sender<Settlement>) {
    let target = match tokio::time::timeout(READ_TIMEOUT, read_request_target(&mut stream)).await {
        Ok(Ok(Some(target))) => target,
        Ok(Ok(None)) => {
            debug!("Ignoring malformed request");
            return;
        }
        Ok(Err(e)) => {
            debug!("Failed to read request: {}", e);
            return;
        }
        Err(_) => {
            debug!("Timed out reading request");
            return;
        }
    };

    debug!("Request received: GET {}", target);
    let (response, settlement) = route(&target);

    if let Err(e) = write_response(&mut stream, &response).await {
        debug!("Failed to write response: {}", e);
    }

    if let Some(settlement) = settlement {
        // Receiver is gone once the attempt settled; late events are dropped
        let _ = tx.send(settlement).await;
    }
}

/// Read the request head and return the request target of a GET
async fn read_request_target(stream: &mut TcpStream) -> std::io::Result<Option<String>> {
    let mut reader = BufReader::new(stream.take(MAX_REQUEST_HEAD));

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Drain headers so closing the socket doesn't reset the browser
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(_method), Some(target)) => Ok(Some(target.to_string())),
        _ => Ok(None),
    }
}

async fn write_response(stream: &mut TcpStream, response: &Response) -> std::io::Result<()> {
    let content_type = if response.html {
        "text/html; charset=utf-8"
    } else {
        "text/plain; charset=utf-8"
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.reason(),
        content_type,
        response.body.len()
    );

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(response.body.as_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await
}
