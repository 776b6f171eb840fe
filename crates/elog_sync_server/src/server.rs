//! Main mirror server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use elog_core::Logbook;
use elog_sync_protocol::{Method, MirrorRequest};
use std::sync::Arc;
use tracing::warn;

/// An HTTP-level answer: status code and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl Response {
    /// A 200 answer.
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    /// The answer for an error: its status and message.
    pub fn error(err: &ServerError) -> Self {
        Self {
            status: err.status(),
            body: format!("{err}\n").into_bytes(),
        }
    }

    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The mirror server.
///
/// Answers the requests of a peer's mirror pass against the logbooks it
/// serves: digest lists, downloads, verbatim submits and deletes.
///
/// # Example
///
/// ```
/// use elog_sync_protocol::Method;
/// use elog_sync_server::{MirrorServer, ServerConfig};
///
/// let server = MirrorServer::new(ServerConfig::new("linac-elog"));
///
/// // An HTTP front end passes every request through handle_request().
/// let response = server.handle_request(Method::Get, "/Linac/?cmd=GetMD5", &[]);
/// assert_eq!(response.status, 404);
/// ```
pub struct MirrorServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl MirrorServer {
    /// Creates a new mirror server serving no logbook.
    pub fn new(config: ServerConfig) -> Self {
        let context = Arc::new(HandlerContext::new(config));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Serves a logbook under its name.
    pub fn add_logbook(&self, logbook: Arc<Logbook>) {
        self.context.add_logbook(logbook);
    }

    /// Returns a served logbook.
    pub fn logbook(&self, name: &str) -> Option<Arc<Logbook>> {
        self.context.logbook(name).ok()
    }

    /// Returns the served logbook names.
    pub fn logbook_names(&self) -> Vec<String> {
        self.context.logbook_names()
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Answers a parsed request.
    pub fn handle(
        &self,
        method: Method,
        logbook: &str,
        request: &MirrorRequest,
        body: &[u8],
    ) -> ServerResult<Vec<u8>> {
        if method != request.method() {
            return Err(ServerError::MethodNotAllowed {
                command: request.command(),
                method: method.to_string(),
            });
        }
        match request {
            MirrorRequest::Digests => Ok(self.handler.handle_digests(logbook)?.into_bytes()),
            MirrorRequest::Download { id } => {
                Ok(self.handler.handle_download(logbook, *id)?.encode()?)
            }
            MirrorRequest::Submit => {
                let id = self.handler.handle_submit(logbook, body)?;
                Ok(format!("{id}\n").into_bytes())
            }
            MirrorRequest::Delete { id } => {
                self.handler.handle_delete(logbook, *id)?;
                Ok(Vec::new())
            }
            MirrorRequest::Attachment { name } => self.handler.handle_attachment(logbook, name),
        }
    }

    /// Answers a raw request; `path` includes the query string.
    pub fn handle_request(&self, method: Method, path: &str, body: &[u8]) -> Response {
        let result = MirrorRequest::parse_path(path)
            .map_err(ServerError::from)
            .and_then(|(logbook, request)| self.handle(method, &logbook, &request, body));
        match result {
            Ok(body) => Response::ok(body),
            Err(err) => {
                if err.is_server_error() {
                    warn!(%method, path, error = %err, "mirror request failed");
                }
                Response::error(&err)
            }
        }
    }
}

impl std::fmt::Debug for MirrorServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorServer")
            .field("server_name", &self.context.config.server_name)
            .field("logbooks", &self.logbook_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use elog_core::{Draft, IndexRegistry, LogbookConfig};
    use elog_sync_protocol::{DigestList, EntryTransfer, Url};
    use tempfile::TempDir;

    fn serve(temp: &TempDir) -> (MirrorServer, Arc<Logbook>) {
        let logbook = Arc::new(
            Logbook::open(
                LogbookConfig::new("Linac", temp.path().join("linac")),
                &IndexRegistry::new(),
            )
            .unwrap(),
        );
        let server = MirrorServer::new(ServerConfig::new("linac-elog"));
        server.add_logbook(Arc::clone(&logbook));
        (server, logbook)
    }

    fn draft(body: &str) -> Draft {
        let date = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 6, 7, 8, 9)
            .unwrap();
        Draft::new().date(date).attribute("Author", "ops").body(body)
    }

    fn path(request: &MirrorRequest) -> String {
        let url = request
            .url(&Url::parse("http://peer/").unwrap(), "Linac")
            .unwrap();
        format!("{}?{}", url.path(), url.query().unwrap())
    }

    #[test]
    fn full_mirror_flow() {
        let temp = TempDir::new().unwrap();
        let (server, logbook) = serve(&temp);
        let id = logbook.submit(None, draft("first")).unwrap();

        // 1. Digest list
        let response = server.handle_request(Method::Get, &path(&MirrorRequest::Digests), &[]);
        assert!(response.is_success());
        let list = DigestList::parse(&String::from_utf8(response.body).unwrap()).unwrap();
        assert_eq!(list.len(), 1);

        // 2. Download
        let response =
            server.handle_request(Method::Get, &path(&MirrorRequest::Download { id }), &[]);
        assert!(response.is_success());
        let transfer = EntryTransfer::decode(&response.body).unwrap();
        assert_eq!(transfer.id, id);

        // 3. Submit a new id
        let record = String::from_utf8(transfer.record)
            .unwrap()
            .replacen(&format!("$@MID@$: {id}"), "$@MID@$: 9", 1);
        let pushed = EntryTransfer::new(record.into_bytes()).unwrap();
        let response = server.handle_request(
            Method::Post,
            &path(&MirrorRequest::Submit),
            &pushed.encode().unwrap(),
        );
        assert_eq!(response, Response::ok(b"9\n".to_vec()));
        assert_eq!(logbook.ids(), vec![id, 9]);

        // 4. Delete
        let response =
            server.handle_request(Method::Post, &path(&MirrorRequest::Delete { id: 9 }), &[]);
        assert!(response.is_success());
        assert_eq!(logbook.ids(), vec![id]);
    }

    #[test]
    fn wrong_method_is_refused() {
        let temp = TempDir::new().unwrap();
        let (server, _) = serve(&temp);
        let response =
            server.handle_request(Method::Get, &path(&MirrorRequest::Delete { id: 1 }), &[]);
        assert_eq!(response.status, 405);
    }

    #[test]
    fn malformed_requests() {
        let temp = TempDir::new().unwrap();
        let (server, _) = serve(&temp);

        let response = server.handle_request(Method::Get, "/Linac/?cmd=Explode", &[]);
        assert_eq!(response.status, 400);

        let response = server.handle_request(Method::Post, "/Linac/?cmd=Submit", b"garbage");
        assert_eq!(response.status, 400);

        let response = server.handle_request(Method::Get, "/Linac/77?cmd=Download", &[]);
        assert_eq!(response.status, 404);
        assert!(String::from_utf8(response.body).unwrap().contains("77"));
    }
}
