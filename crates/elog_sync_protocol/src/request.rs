//! Mirror requests and their URLs.
//!
//! Every request addresses one logbook by path and names the command in the
//! query:
//!
//! ```text
//! GET  /<logbook>/?cmd=GetMD5                digest list
//! GET  /<logbook>/<id>?cmd=Download          entry transfer
//! POST /<logbook>/?cmd=Submit                entry transfer in the body
//! POST /<logbook>/<id>?cmd=Delete
//! GET  /<logbook>/?cmd=Attachment&name=<n>   raw attachment bytes
//! ```

use crate::error::{ProtocolError, ProtocolResult};
use elog_codec::MessageId;
use percent_encoding::percent_decode_str;
use std::fmt;
use url::Url;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read-only request.
    Get,
    /// Request that changes the peer.
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

/// One mirror request against a peer logbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorRequest {
    /// Fetch the digest list.
    Digests,
    /// Fetch one entry with its attachments.
    Download {
        /// Entry id.
        id: MessageId,
    },
    /// Store the entry carried in the body.
    Submit,
    /// Delete one entry.
    Delete {
        /// Entry id.
        id: MessageId,
    },
    /// Fetch one attachment.
    Attachment {
        /// Stored attachment name.
        name: String,
    },
}

impl MirrorRequest {
    /// Returns the `cmd` query value.
    #[must_use]
    pub fn command(&self) -> &'static str {
        match self {
            Self::Digests => "GetMD5",
            Self::Download { .. } => "Download",
            Self::Submit => "Submit",
            Self::Delete { .. } => "Delete",
            Self::Attachment { .. } => "Attachment",
        }
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> Method {
        match self {
            Self::Submit | Self::Delete { .. } => Method::Post,
            Self::Digests | Self::Download { .. } | Self::Attachment { .. } => Method::Get,
        }
    }

    /// Builds the request URL for `logbook` under `base`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidRequest`] if `base` cannot carry a
    /// path (e.g. a `mailto:` URL).
    pub fn url(&self, base: &Url, logbook: &str) -> ProtocolResult<Url> {
        let mut url = base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| ProtocolError::invalid_request(format!("{base} cannot be a base")))?;
            segments.pop_if_empty().push(logbook);
            match self {
                Self::Download { id } | Self::Delete { id } => segments.push(&id.to_string()),
                _ => segments.push(""),
            };
        }
        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("cmd", self.command());
            if let Self::Attachment { name } = self {
                query.append_pair("name", name);
            }
        }
        Ok(url)
    }

    /// Parses a request URL into the logbook name and the request.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidRequest`] for a missing or unknown
    /// command, a missing logbook, or a bad id.
    pub fn parse(url: &Url) -> ProtocolResult<(String, Self)> {
        let segments: Vec<&str> = url
            .path_segments()
            .map(Iterator::collect)
            .unwrap_or_default();
        let [.., logbook, last] = segments.as_slice() else {
            return Err(ProtocolError::invalid_request(format!(
                "no logbook in {}",
                url.path()
            )));
        };
        let logbook = decode_segment(logbook)?;
        if logbook.is_empty() {
            return Err(ProtocolError::invalid_request("empty logbook name"));
        }

        let mut command = None;
        let mut name = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "cmd" => command = Some(value.into_owned()),
                "name" => name = Some(value.into_owned()),
                _ => {}
            }
        }
        let command =
            command.ok_or_else(|| ProtocolError::invalid_request("missing cmd parameter"))?;

        let id = || -> ProtocolResult<MessageId> {
            match last.parse::<MessageId>() {
                Ok(id) if id > 0 => Ok(id),
                _ => Err(ProtocolError::invalid_request(format!(
                    "{command} needs an entry id, got {last:?}"
                ))),
            }
        };

        let request = match command.as_str() {
            "GetMD5" => Self::Digests,
            "Download" => Self::Download { id: id()? },
            "Submit" => Self::Submit,
            "Delete" => Self::Delete { id: id()? },
            "Attachment" => Self::Attachment {
                name: name.ok_or_else(|| ProtocolError::invalid_request("missing name parameter"))?,
            },
            other => {
                return Err(ProtocolError::invalid_request(format!(
                    "unknown command {other:?}"
                )))
            }
        };
        Ok((logbook, request))
    }

    /// Parses a path with query, as received by a server.
    ///
    /// # Errors
    ///
    /// Same as [`MirrorRequest::parse`].
    pub fn parse_path(path: &str) -> ProtocolResult<(String, Self)> {
        let base = Url::parse("http://localhost/")
            .map_err(|e| ProtocolError::invalid_request(e.to_string()))?;
        let url = base
            .join(path)
            .map_err(|e| ProtocolError::invalid_request(format!("{path:?}: {e}")))?;
        Self::parse(&url)
    }
}

fn decode_segment(segment: &str) -> ProtocolResult<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| ProtocolError::invalid_request(format!("bad path segment {segment:?}: {e}")))
}
