//! # elog Codec
//!
//! The on-disk entry record format, the per-logbook attribute schema and the
//! 128-bit content digest.
//!
//! ## Record layout
//!
//! ```text
//! $@MID@$: <decimal id>
//! Date: <RFC 2822 date>
//! [Reply to: <comma list>]
//! [In reply to: <id>]
//! <attribute name>: <value>        (schema order)
//! Attachment: <comma list>
//! Encoding: plain|ELCode|HTML
//! [Locked by: <owner>]
//! ========================================
//! <body>
//! ```
//!
//! Records are concatenated with no framing beyond the marker. A record's
//! digest covers exactly the bytes from its marker to the next marker (or
//! end of file).
//!
//! ## Usage
//!
//! ```
//! use chrono::DateTime;
//! use elog_codec::{decode_entry, encode_entry, AttributeSchema, Digest, Entry};
//!
//! let date = DateTime::parse_from_rfc2822("Wed, 31 Jan 2024 14:05:00 +0100").unwrap();
//! let entry = Entry::new(1, date).with_attribute("Author", "jdoe").with_body("Hello");
//!
//! let bytes = encode_entry(&entry, &AttributeSchema::permissive()).unwrap();
//! assert_eq!(decode_entry(&bytes, Some(1)).unwrap(), entry);
//! println!("digest {}", Digest::of(&bytes));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod digest;
mod encoder;
mod entry;
mod error;
mod schema;

pub use decoder::{decode_entry, peek_id, record_len, record_ranges};
pub use digest::{Digest, DIGEST_LEN};
pub use encoder::{body_has_marker, encode_entry};
pub use entry::{truncate_to_seconds, Attribute, Encoding, Entry, MessageId};
pub use error::{CodecError, CodecResult};
pub use schema::{AttributeSchema, RESERVED_HEADERS};

/// Marker that opens every record.
pub const MARKER: &str = "$@MID@$:";

/// Line that separates the header from the body.
pub const SEPARATOR: &str = "========================================";

/// `chrono` format of the `Date:` header.
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separator_is_forty_wide() {
        assert_eq!(SEPARATOR.len(), 40);
        assert!(SEPARATOR.bytes().all(|b| b == b'='));
    }

    #[test]
    fn digest_covers_exact_record_bytes() {
        let date = chrono::DateTime::parse_from_rfc2822("Wed, 31 Jan 2024 14:05:00 +0100").unwrap();
        let a = encode_entry(&Entry::new(1, date).with_body("A"), &AttributeSchema::permissive())
            .unwrap();
        let b = encode_entry(&Entry::new(2, date).with_body("B"), &AttributeSchema::permissive())
            .unwrap();
        let file = [a.clone(), b].concat();

        let ranges = record_ranges(&file);
        assert_eq!(ranges.len(), 2);
        assert_eq!(Digest::of(&file[ranges[0].clone()]), Digest::of(&a));
    }
}
