//! Property-based test generators using proptest.
//!
//! Provides strategies for generating entries the record format can
//! store and read back unchanged.

use chrono::{DateTime, FixedOffset, TimeZone};
use elog_codec::{Attribute, Encoding, Entry, MessageId, RESERVED_HEADERS};
use elog_core::Draft;
use proptest::prelude::*;

/// Strategy for generating entry ids.
pub fn message_id_strategy() -> impl Strategy<Value = MessageId> {
    1..100_000u32
}

/// Strategy for generating dates with whole-second precision and a whole
/// minute offset, between 1971 and 2096.
pub fn date_strategy() -> impl Strategy<Value = DateTime<FixedOffset>> {
    (31_536_000i64..4_000_000_000i64, -720i32..=840).prop_map(|(secs, minutes)| {
        FixedOffset::east_opt(minutes * 60)
            .and_then(|offset| offset.timestamp_opt(secs, 0).single())
            .expect("Offset and timestamp are in range")
    })
}

/// Strategy for generating dates the `Date:` header cannot carry: an
/// offset with a seconds part, or a sub-second timestamp.
pub fn unencodable_date_strategy() -> impl Strategy<Value = DateTime<FixedOffset>> {
    let odd_offset = (31_536_000i64..4_000_000_000i64, -720i32..=840, 1i32..60).prop_map(
        |(secs, minutes, extra)| {
            FixedOffset::east_opt(minutes * 60 + extra)
                .and_then(|offset| offset.timestamp_opt(secs, 0).single())
                .expect("Offset and timestamp are in range")
        },
    );
    let sub_second = (31_536_000i64..4_000_000_000i64, 1u32..1_000_000_000).prop_map(
        |(secs, nanos)| {
            FixedOffset::east_opt(0)
                .and_then(|offset| offset.timestamp_opt(secs, nanos).single())
                .expect("Offset and timestamp are in range")
        },
    );
    prop_oneof![odd_offset, sub_second]
}

/// Strategy for generating attribute names the format accepts.
pub fn attribute_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{1,10}")
        .expect("Invalid regex")
        .prop_filter("Name must not be a reserved header", |name| {
            !RESERVED_HEADERS.iter().any(|r| r.eq_ignore_ascii_case(name))
        })
}

/// Strategy for generating single-line attribute values.
pub fn attribute_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~äöüé]{0,40}").expect("Invalid regex")
}

/// Strategy for generating attribute lists with distinct names.
pub fn attributes_strategy() -> impl Strategy<Value = Vec<Attribute>> {
    prop::collection::btree_map(attribute_name_strategy(), attribute_value_strategy(), 0..5)
        .prop_map(|map| {
            map.into_iter()
                .map(|(name, value)| Attribute::new(name, value))
                .collect()
        })
}

/// Strategy for generating bodies: several lines, none starting with the
/// record marker.
pub fn body_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9äöü .,:;!?=@$\n-]{0,300}")
        .expect("Invalid regex")
        .prop_filter("Body must not contain a marker line", |body| {
            !elog_codec::body_has_marker(body)
        })
}

/// Strategy for generating stored attachment names.
pub fn attachment_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9]{6}_[0-9]{6}_[a-z]{1,8}\\.(txt|png|pdf)")
        .expect("Invalid regex")
}

/// Strategy for generating encodings.
pub fn encoding_strategy() -> impl Strategy<Value = Encoding> {
    prop_oneof![
        Just(Encoding::Plain),
        Just(Encoding::ELCode),
        Just(Encoding::Html),
    ]
}

/// Strategy for generating complete entries.
pub fn entry_strategy() -> impl Strategy<Value = Entry> {
    (
        message_id_strategy(),
        date_strategy(),
        prop::collection::vec(message_id_strategy(), 0..4),
        prop::option::of(message_id_strategy()),
        attributes_strategy(),
        prop::collection::vec(attachment_name_strategy(), 0..3),
        encoding_strategy(),
        prop::option::of(
            prop::string::string_regex("[a-z]{1,8}@[a-z]{1,8}").expect("Invalid regex"),
        ),
        body_strategy(),
    )
        .prop_map(
            |(id, date, reply_to, in_reply_to, attributes, attachments, encoding, locked_by, body)| {
                Entry {
                    id,
                    date,
                    reply_to,
                    in_reply_to,
                    attributes,
                    attachments,
                    encoding,
                    locked_by,
                    body,
                }
            },
        )
}

/// Strategy for generating drafts for new entries.
pub fn draft_strategy() -> impl Strategy<Value = Draft> {
    (attributes_strategy(), body_strategy(), encoding_strategy()).prop_map(
        |(attributes, body, encoding)| {
            let mut draft = Draft::new().body(body).encoding(encoding);
            draft.attributes = Some(attributes);
            draft
        },
    )
}

/// One change to a logbook.
#[derive(Debug, Clone)]
pub enum LogbookOperation {
    /// Submit a new entry.
    Create {
        /// Entry content.
        draft: Draft,
    },
    /// Edit an existing entry, picked modulo the current id count.
    Edit {
        /// Index into the current ids.
        pick: usize,
        /// New body.
        body: String,
    },
    /// Delete an existing entry, picked modulo the current id count.
    Delete {
        /// Index into the current ids.
        pick: usize,
    },
}

/// Strategy for generating logbook operations.
pub fn logbook_operation_strategy() -> impl Strategy<Value = LogbookOperation> {
    prop_oneof![
        3 => draft_strategy().prop_map(|draft| LogbookOperation::Create { draft }),
        2 => (any::<usize>(), body_strategy())
            .prop_map(|(pick, body)| LogbookOperation::Edit { pick, body }),
        1 => any::<usize>().prop_map(|pick| LogbookOperation::Delete { pick }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<LogbookOperation>> {
    prop::collection::vec(logbook_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
