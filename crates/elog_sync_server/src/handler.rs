//! Request handlers for mirror commands.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use elog_codec::{decode_entry, MessageId};
use elog_core::{CoreError, DeleteOptions, Logbook};
use elog_sync_protocol::{DigestList, EntryTransfer};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Served logbooks by name.
    logbooks: RwLock<BTreeMap<String, Arc<Logbook>>>,
}

impl HandlerContext {
    /// Creates a new handler context serving no logbook.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            logbooks: RwLock::new(BTreeMap::new()),
        }
    }

    /// Serves `logbook` under its name, replacing any logbook of that name.
    pub fn add_logbook(&self, logbook: Arc<Logbook>) {
        self.logbooks
            .write()
            .insert(logbook.name().to_string(), logbook);
    }

    /// Returns the logbook served under `name`.
    pub fn logbook(&self, name: &str) -> ServerResult<Arc<Logbook>> {
        self.logbooks
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ServerError::UnknownLogbook(name.to_string()))
    }

    /// Returns the served logbook names.
    pub fn logbook_names(&self) -> Vec<String> {
        self.logbooks.read().keys().cloned().collect()
    }
}

/// Handler for mirror requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Renders the digest list of a logbook, banner first.
    pub fn handle_digests(&self, logbook: &str) -> ServerResult<String> {
        let logbook = self.context.logbook(logbook)?;
        let list = DigestList::new(&self.context.config.server_name, logbook.digests());
        debug!(logbook = %logbook.name(), entries = list.len(), "served digest list");
        Ok(list.render())
    }

    /// Packs an entry's stored bytes with the attachments it lists.
    ///
    /// Attachments missing from the store are left out.
    pub fn handle_download(&self, logbook: &str, id: MessageId) -> ServerResult<EntryTransfer> {
        let logbook = self.context.logbook(logbook)?;
        let raw = logbook.raw_record(id)?;
        let entry = decode_entry(&raw.bytes, Some(id)).map_err(CoreError::from)?;
        let mut transfer = EntryTransfer::new(raw.bytes)?;
        for name in entry.attachments {
            match logbook.attachments().get(&name) {
                Ok(data) => transfer = transfer.with_attachment(name, data),
                Err(CoreError::AttachmentNotFound { .. }) => {
                    warn!(logbook = %logbook.name(), id, attachment = %name, "attachment missing from download");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(transfer)
    }

    /// Stores a pushed entry verbatim, attachments first.
    pub fn handle_submit(&self, logbook: &str, body: &[u8]) -> ServerResult<MessageId> {
        let max = self.context.config.max_request_size;
        if body.len() > max {
            return Err(ServerError::PayloadTooLarge {
                size: body.len(),
                max,
            });
        }
        let logbook = self.context.logbook(logbook)?;
        let transfer = EntryTransfer::decode(body)?;
        for blob in &transfer.attachments {
            logbook.attachments().put(&blob.name, &blob.data)?;
        }
        let id = logbook.store_record(&transfer.record)?;
        info!(logbook = %logbook.name(), id, "stored mirrored entry");
        Ok(id)
    }

    /// Deletes an entry and its attachments, without cascading to replies.
    pub fn handle_delete(&self, logbook: &str, id: MessageId) -> ServerResult<()> {
        if !self.context.config.allow_deletes {
            return Err(ServerError::Forbidden(format!(
                "mirror deletes are disabled on {}",
                self.context.config.server_name
            )));
        }
        let logbook = self.context.logbook(logbook)?;
        logbook.delete(id, DeleteOptions::entry_only().attachments(true))?;
        info!(logbook = %logbook.name(), id, "deleted entry for mirror peer");
        Ok(())
    }

    /// Reads one attachment.
    pub fn handle_attachment(&self, logbook: &str, name: &str) -> ServerResult<Vec<u8>> {
        let logbook = self.context.logbook(logbook)?;
        Ok(logbook.attachments().get(name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use elog_core::{Draft, IndexRegistry, LogbookConfig, MemoryAttachmentStore};
    use tempfile::TempDir;

    fn create_handler(temp: &TempDir, config: ServerConfig) -> (RequestHandler, Arc<Logbook>) {
        let logbook = Arc::new(
            Logbook::open_with_attachments(
                LogbookConfig::new("Linac", temp.path()),
                &IndexRegistry::new(),
                Arc::new(MemoryAttachmentStore::new()),
            )
            .unwrap(),
        );
        let context = Arc::new(HandlerContext::new(config));
        context.add_logbook(Arc::clone(&logbook));
        (RequestHandler::new(context), logbook)
    }

    fn draft(body: &str) -> Draft {
        let date = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 8, 30, 0)
            .unwrap();
        Draft::new().date(date).body(body)
    }

    #[test]
    fn digest_list_has_banner() {
        let temp = TempDir::new().unwrap();
        let (handler, logbook) = create_handler(&temp, ServerConfig::new("linac-elog"));
        let id = logbook.submit(None, draft("beam on")).unwrap();

        let text = handler.handle_digests("Linac").unwrap();
        let list = DigestList::parse(&text).unwrap();
        assert_eq!(list.server, "linac-elog");
        assert_eq!(list.digests.get(&id), Some(&logbook.raw_record(id).unwrap().digest));
    }

    #[test]
    fn unknown_logbook() {
        let temp = TempDir::new().unwrap();
        let (handler, _) = create_handler(&temp, ServerConfig::default());
        let err = handler.handle_digests("Cryo").unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn download_carries_attachments() {
        let temp = TempDir::new().unwrap();
        let (handler, logbook) = create_handler(&temp, ServerConfig::default());
        let date = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 1, 8, 30, 0)
            .unwrap();
        let stored = logbook.store_attachment(&date, "plot.png", b"PNG").unwrap();
        let id = logbook
            .submit(None, draft("see plot").attachments(vec![stored.clone(), "gone.txt".into()]))
            .unwrap();

        let transfer = handler.handle_download("Linac", id).unwrap();
        assert_eq!(transfer.id, id);
        assert_eq!(transfer.attachments.len(), 1);
        assert_eq!(transfer.attachments[0].name, stored);
        assert_eq!(transfer.attachments[0].data, b"PNG");
    }

    #[test]
    fn submit_stores_verbatim() {
        let temp = TempDir::new().unwrap();
        let (handler, logbook) = create_handler(&temp, ServerConfig::default());
        let id = logbook.submit(None, draft("original")).unwrap();
        let mut transfer = handler.handle_download("Linac", id).unwrap();
        transfer.record = String::from_utf8(transfer.record)
            .unwrap()
            .replace("original", "mirrored")
            .into_bytes();
        let transfer = transfer.with_attachment("240301_083000_log.txt", b"data".to_vec());

        let stored = handler
            .handle_submit("Linac", &transfer.encode().unwrap())
            .unwrap();
        assert_eq!(stored, id);
        assert_eq!(logbook.retrieve(id).unwrap().body, "mirrored");
        assert_eq!(logbook.raw_record(id).unwrap().bytes, transfer.record);
        assert!(logbook.attachments().exists("240301_083000_log.txt"));
    }

    #[test]
    fn oversized_submit_is_rejected() {
        let temp = TempDir::new().unwrap();
        let (handler, _) =
            create_handler(&temp, ServerConfig::default().with_max_request_size(8));
        let err = handler.handle_submit("Linac", &[b'x'; 9]).unwrap_err();
        assert!(matches!(err, ServerError::PayloadTooLarge { size: 9, max: 8 }));
    }

    #[test]
    fn delete_respects_config() {
        let temp = TempDir::new().unwrap();
        let (handler, logbook) =
            create_handler(&temp, ServerConfig::default().with_deletes(false));
        let id = logbook.submit(None, draft("keep")).unwrap();
        assert_eq!(handler.handle_delete("Linac", id).unwrap_err().status(), 403);
        assert!(logbook.contains(id));
    }

    #[test]
    fn delete_missing_entry_is_not_found() {
        let temp = TempDir::new().unwrap();
        let (handler, _) = create_handler(&temp, ServerConfig::default());
        assert_eq!(handler.handle_delete("Linac", 42).unwrap_err().status(), 404);
    }
}
