//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so passes can run
//! against a real peer ([`ReqwestClient`], feature `reqwest`) or an
//! in-process server ([`LoopbackClient`]).

use crate::error::{SyncError, SyncResult};
use crate::transport::MirrorTransport;
use elog_codec::MessageId;
use elog_sync_protocol::{DigestList, EntryTransfer, Method, MirrorRequest, Url};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Failure of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// No answer within the request timeout.
    #[error("request timed out")]
    Timeout,
    /// The peer answered with a non-success status.
    #[error("status {code}: {message}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body or reason.
        message: String,
    },
    /// The request could not be sent or the answer not read.
    #[error("connection failed: {0}")]
    Connection(String),
}

impl From<ClientError> for SyncError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Timeout => SyncError::Timeout,
            ClientError::Status { code, message } => SyncError::Remote {
                status: code,
                message,
            },
            ClientError::Connection(message) => SyncError::transport_retryable(message),
        }
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Both calls
/// return the response body of a successful exchange.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request.
    fn get(&self, url: &Url) -> Result<Vec<u8>, ClientError>;

    /// Sends a POST request.
    fn post(&self, url: &Url, body: Vec<u8>) -> Result<Vec<u8>, ClientError>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// HTTP-based mirror transport.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the peer (e.g. `https://elog.example.org/`).
    base_url: Url,
    /// HTTP client implementation.
    client: C,
    /// Connection state.
    connected: AtomicBool,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: Url, client: C) -> Self {
        Self {
            base_url,
            client,
            connected: AtomicBool::new(true),
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns true until the transport is closed, while the client is
    /// healthy.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    /// Closes the transport. Later requests fail with
    /// [`SyncError::NotConnected`].
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn send(&self, logbook: &str, request: &MirrorRequest, body: Vec<u8>) -> SyncResult<Vec<u8>> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }

        let url = request.url(&self.base_url, logbook)?;
        debug!(method = %request.method(), %url, "mirror request");
        let result = match request.method() {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url, body),
        };

        match result {
            Ok(response) => {
                *self.last_error.write() = None;
                Ok(response)
            }
            Err(err) => {
                *self.last_error.write() = Some(err.to_string());
                Err(err.into())
            }
        }
    }
}

impl<C: HttpClient> MirrorTransport for HttpTransport<C> {
    fn fetch_digests(&self, logbook: &str) -> SyncResult<DigestList> {
        let body = self.send(logbook, &MirrorRequest::Digests, Vec::new())?;
        Ok(DigestList::parse(&String::from_utf8_lossy(&body))?)
    }

    fn push_entry(&self, logbook: &str, entry: &EntryTransfer) -> SyncResult<()> {
        self.send(logbook, &MirrorRequest::Submit, entry.encode()?)?;
        Ok(())
    }

    fn pull_entry(&self, logbook: &str, id: MessageId) -> SyncResult<EntryTransfer> {
        let body = self.send(logbook, &MirrorRequest::Download { id }, Vec::new())?;
        Ok(EntryTransfer::decode(&body)?)
    }

    fn delete_entry(&self, logbook: &str, id: MessageId) -> SyncResult<()> {
        self.send(logbook, &MirrorRequest::Delete { id }, Vec::new())?;
        Ok(())
    }

    fn location(&self, logbook: &str, id: MessageId) -> String {
        let mut url = self.base_url.clone();
        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().push(logbook).push(&id.to_string());
            }
            Err(()) => return format!("{}{logbook}/{id}", self.base_url),
        }
        url.to_string()
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles one request, `path` including the query, and returns the
    /// status code and body.
    fn handle_request(&self, method: Method, path: &str, body: &[u8]) -> (u16, Vec<u8>);
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for Arc<S> {
    fn handle_request(&self, method: Method, path: &str, body: &[u8]) -> (u16, Vec<u8>) {
        (**self).handle_request(method, path, body)
    }
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing without actual network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    fn dispatch(&self, method: Method, url: &Url, body: &[u8]) -> Result<Vec<u8>, ClientError> {
        let path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };
        let (status, response) = self.server.handle_request(method, &path, body);
        if (200..300).contains(&status) {
            Ok(response)
        } else {
            Err(ClientError::Status {
                code: status,
                message: String::from_utf8_lossy(&response).trim().to_string(),
            })
        }
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn get(&self, url: &Url) -> Result<Vec<u8>, ClientError> {
        self.dispatch(Method::Get, url, &[])
    }

    fn post(&self, url: &Url, body: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        self.dispatch(Method::Post, url, &body)
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Blocking HTTP client backed by `reqwest`.
#[cfg(feature = "reqwest")]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "reqwest")]
impl ReqwestClient {
    /// Creates a client whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a fatal transport error if the TLS backend cannot be
    /// initialised.
    pub fn new(timeout: std::time::Duration) -> SyncResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::transport_fatal(e.to_string()))?;
        Ok(Self { client })
    }

    fn finish(
        response: Result<reqwest::blocking::Response, reqwest::Error>,
    ) -> Result<Vec<u8>, ClientError> {
        let response = response.map_err(client_error)?;
        let status = response.status();
        let body = response.bytes().map_err(client_error)?;
        if !status.is_success() {
            return Err(ClientError::Status {
                code: status.as_u16(),
                message: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }
        Ok(body.to_vec())
    }
}

#[cfg(feature = "reqwest")]
fn client_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout
    } else {
        ClientError::Connection(err.to_string())
    }
}

#[cfg(feature = "reqwest")]
impl HttpClient for ReqwestClient {
    fn get(&self, url: &Url) -> Result<Vec<u8>, ClientError> {
        Self::finish(self.client.get(url.as_str()).send())
    }

    fn post(&self, url: &Url, body: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        Self::finish(
            self.client
                .post(url.as_str())
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(body)
                .send(),
        )
    }

    fn is_healthy(&self) -> bool {
        true
    }
}
