//! The entry data model.

use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric entry id, unique within one logbook.
pub type MessageId = u32;

/// How the entry body is to be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    /// Plain text.
    #[default]
    Plain,
    /// ELCode markup.
    ELCode,
    /// Raw HTML.
    Html,
}

impl Encoding {
    /// Returns the spelling used in the `Encoding:` header.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::ELCode => "ELCode",
            Self::Html => "HTML",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "elcode" => Ok(Self::ELCode),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown encoding {other:?}")),
        }
    }
}

/// One named attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name as defined by the logbook schema.
    pub name: String,
    /// Attribute value, a single line.
    pub value: String,
}

impl Attribute {
    /// Creates an attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One logbook record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Entry id.
    pub id: MessageId,
    /// Creation time, second precision.
    pub date: DateTime<FixedOffset>,
    /// Ids of the replies to this entry.
    pub reply_to: Vec<MessageId>,
    /// Id of the entry this one replies to.
    pub in_reply_to: Option<MessageId>,
    /// Attribute values in schema order.
    pub attributes: Vec<Attribute>,
    /// Stored attachment file names.
    pub attachments: Vec<String>,
    /// Body encoding.
    pub encoding: Encoding,
    /// Advisory lock owner (`user@host`), if somebody is editing.
    pub locked_by: Option<String>,
    /// Free-text body.
    pub body: String,
}

impl Entry {
    /// Creates an empty plain-text entry.
    ///
    /// Sub-second precision is dropped, since the record format stores whole
    /// seconds.
    pub fn new(id: MessageId, date: DateTime<FixedOffset>) -> Self {
        Self {
            id,
            date: truncate_to_seconds(date),
            reply_to: Vec::new(),
            in_reply_to: None,
            attributes: Vec::new(),
            attachments: Vec::new(),
            encoding: Encoding::Plain,
            locked_by: None,
            body: String::new(),
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Appends an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    /// Sets the parent id.
    #[must_use]
    pub fn in_reply_to(mut self, parent: MessageId) -> Self {
        self.in_reply_to = Some(parent);
        self
    }

    /// Looks up an attribute value by name (case-insensitive).
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// Returns true if this entry starts a thread.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.in_reply_to.is_none()
    }
}

/// Drops the sub-second part of a timestamp.
pub fn truncate_to_seconds(date: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    date.with_nanosecond(0).unwrap_or(date)
}
