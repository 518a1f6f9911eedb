//! Interactive consent channel
//!
//! A loopback HTTP listener that receives the OAuth redirect. The browser
//! is sent to the authorization URL; Google redirects back to
//! `http://127.0.0.1:<port>/?code=...&state=...` (or `?error=...`).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::common::AuthError;

/// How long a single callback connection may take to send its request
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens a consent session: somewhere for the redirect to land.
#[async_trait]
pub trait ConsentChannel: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PendingConsent>, AuthError>;
}

/// A consent session waiting for the user.
#[async_trait]
pub trait PendingConsent: Send {
    /// Redirect URI to embed in the authorization URL
    fn redirect_uri(&self) -> &str;

    /// Present `authorize_url` to the user and wait for the callback.
    ///
    /// Returns the authorization code once a callback carrying
    /// `expected_state` arrives. Runs until a callback arrives; callers
    /// bound it with a timeout.
    async fn wait_for_code(
        &mut self,
        authorize_url: &str,
        expected_state: &str,
    ) -> Result<String, AuthError>;
}

// ── Loopback listener ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LoopbackConsent {
    host: String,
    port: u16,
    open_browser: bool,
}

impl LoopbackConsent {
    pub fn new(host: impl Into<String>, port: u16, open_browser: bool) -> Self {
        Self {
            host: host.into(),
            port,
            open_browser,
        }
    }
}

impl Default for LoopbackConsent {
    fn default() -> Self {
        Self::new("127.0.0.1", 0, true)
    }
}

#[async_trait]
impl ConsentChannel for LoopbackConsent {
    async fn open(&self) -> Result<Box<dyn PendingConsent>, AuthError> {
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .map_err(|e| AuthError::Authorization(format!("Failed to bind local server: {}", e)))?;

        let local_addr = listener.local_addr().map_err(|e| {
            AuthError::Authorization(format!("Failed to get local address: {}", e))
        })?;

        let redirect_uri = format!("http://{}:{}", self.host, local_addr.port());
        info!("OAuth callback server listening on {}", redirect_uri);

        Ok(Box::new(LoopbackSession {
            listener,
            redirect_uri,
            open_browser: self.open_browser,
        }))
    }
}

struct LoopbackSession {
    listener: TcpListener,
    redirect_uri: String,
    open_browser: bool,
}

/// What a single request to the callback listener carried.
enum Callback {
    Code(String),
    Denied(String),
    StateMismatch,
    /// Not an OAuth redirect (favicon, probes)
    Unrelated,
}

#[async_trait]
impl PendingConsent for LoopbackSession {
    fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    async fn wait_for_code(
        &mut self,
        authorize_url: &str,
        expected_state: &str,
    ) -> Result<String, AuthError> {
        present_url(authorize_url, self.open_browser);

        let expected_state: Arc<str> = Arc::from(expected_state);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (socket, peer) = accepted.map_err(|e| {
                        AuthError::Authorization(format!("Callback server error: {}", e))
                    })?;
                    debug!("Callback connection from {}", peer);

                    // Browsers preconnect without sending a request; serve each
                    // connection on its own task so an idle one cannot block.
                    let state = expected_state.clone();
                    connections.spawn(async move {
                        timeout(CONNECTION_TIMEOUT, handle_connection(socket, &state)).await
                    });
                }
                Some(joined) = connections.join_next() => {
                    let callback = match joined {
                        Ok(Ok(Ok(callback))) => callback,
                        Ok(Ok(Err(e))) => {
                            warn!("Dropped callback connection: {}", e);
                            continue;
                        }
                        Ok(Err(_)) => {
                            debug!("Closed idle callback connection");
                            continue;
                        }
                        Err(e) => {
                            warn!("Callback connection task failed: {}", e);
                            continue;
                        }
                    };

                    match callback {
                        Callback::Code(code) => return Ok(code),
                        Callback::Denied(reason) => return Err(AuthError::Authorization(reason)),
                        Callback::StateMismatch => {
                            return Err(AuthError::Authorization(
                                "state parameter mismatch in OAuth callback".to_string(),
                            ))
                        }
                        Callback::Unrelated => continue,
                    }
                }
            }
        }
    }
}

fn present_url(authorize_url: &str, open_browser: bool) {
    if open_browser {
        info!("Opening browser for OAuth authorization");
        match open::that(authorize_url) {
            Ok(()) => return,
            Err(e) => warn!("Failed to open browser automatically: {}", e),
        }
    }
    info!("Visit this URL to authorize access: {}", authorize_url);
}

/// Read one request, answer the browser, and classify the callback.
async fn handle_connection(
    mut socket: TcpStream,
    expected_state: &str,
) -> std::io::Result<Callback> {
    let socket = &mut socket;
    let mut reader = BufReader::new(&mut *socket);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    // Drain headers so closing the socket does not reset the connection.
    let mut header = String::new();
    loop {
        header.clear();
        if reader.read_line(&mut header).await? == 0 || header.trim().is_empty() {
            break;
        }
    }

    // "GET /path?query HTTP/1.1"
    let target = request_line.split_whitespace().nth(1).unwrap_or("");
    let query = target.split_once('?').map(|(_, q)| q).unwrap_or("");
    let params = parse_query_params(query);

    if let Some(error) = params.get("error") {
        let error_desc = params
            .get("error_description")
            .map(|s| s.as_str())
            .unwrap_or("Unknown error");
        let message = format!("{}: {}", error, error_desc);
        send_response(socket, "400 Bad Request", page_html(&format!("Error: {}", message))).await?;
        return Ok(Callback::Denied(message));
    }

    let (code, state) = match (params.get("code"), params.get("state")) {
        (Some(code), Some(state)) => (code, state),
        _ => {
            send_response(socket, "404 Not Found", page_html("Not found")).await?;
            return Ok(Callback::Unrelated);
        }
    };

    if state != expected_state {
        send_response(
            socket,
            "400 Bad Request",
            page_html("Error: Invalid state parameter. Please try again."),
        )
        .await?;
        return Ok(Callback::StateMismatch);
    }

    send_response(
        socket,
        "200 OK",
        page_html("Authentication successful! You can close this tab."),
    )
    .await?;
    Ok(Callback::Code(code.clone()))
}

/// Parse URL query parameters into a HashMap
fn parse_query_params(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            let plus_decoded = value.replace('+', " ");
            let decoded_value = urlencoding::decode(&plus_decoded).ok()?.into_owned();
            Some((key.to_string(), decoded_value))
        })
        .collect()
}

/// Send HTTP response to the browser
async fn send_response(socket: &mut TcpStream, status: &str, html: String) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        html.len(),
        html
    );
    socket.write_all(response.as_bytes()).await?;
    socket.flush().await?;
    Ok(())
}

fn page_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>gsuite-bridge</title>
    <style>
        body {{ font-family: sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; }}
        p {{ color: #444; }}
    </style>
</head>
<body>
    <p>{}</p>
</body>
</html>"#,
        escape_html(message)
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
