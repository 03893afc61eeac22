//! Page tokens for the document adapter.
//!
//! A token records the sort position of the last execution on a page, so the
//! next page resumes strictly after it even when executions were inserted or
//! deleted in between.
//!
//! # Token Format
//!
//! ```text
//! +----------+--------------------------------------------+
//! | 0        | version (1 byte)                           |
//! | 1-N      | protobuf `PageTokenProto` (variable)       |
//! | N-N+3    | CRC32 checksum (4 bytes, little endian)    |
//! +----------+--------------------------------------------+
//! ```
//!
//! The checksum covers everything before it. Tokens are opaque to callers and
//! bound to the sort they were issued for.

use std::cmp::Ordering;

use prost::Message;

use crate::backend::StoreError;
use crate::types::{AttributeValue, ExecutionRecord, SortDirection, SortSpec};

const TOKEN_VERSION: u8 = 1;

const CHECKSUM_SIZE: usize = 4;

#[derive(Clone, PartialEq, Message)]
struct PageTokenProto {
    #[prost(string, repeated, tag = "1")]
    sort_keys: Vec<String>,
    #[prost(message, repeated, tag = "2")]
    sort_values: Vec<TokenValue>,
    #[prost(string, tag = "3")]
    run_id: String,
}

/// One sort value; an unset `value` means the attribute was absent.
#[derive(Clone, PartialEq, Message)]
struct TokenValue {
    #[prost(oneof = "token_value::Value", tags = "1, 2, 3, 4, 5")]
    value: Option<token_value::Value>,
}

mod token_value {
    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Value {
        #[prost(string, tag = "1")]
        Text(String),
        #[prost(int64, tag = "2")]
        Int(i64),
        #[prost(bool, tag = "3")]
        Bool(bool),
        #[prost(int64, tag = "4")]
        Datetime(i64),
        #[prost(message, tag = "5")]
        KeywordList(super::KeywordListValue),
    }
}

#[derive(Clone, PartialEq, Message)]
struct KeywordListValue {
    #[prost(string, repeated, tag = "1")]
    items: Vec<String>,
}

impl From<Option<&AttributeValue>> for TokenValue {
    fn from(value: Option<&AttributeValue>) -> Self {
        let value = value.map(|value| match value {
            AttributeValue::Text(s) => token_value::Value::Text(s.as_str().to_owned()),
            AttributeValue::Int(n) => token_value::Value::Int(*n),
            AttributeValue::Bool(b) => token_value::Value::Bool(*b),
            AttributeValue::Datetime(nanos) => token_value::Value::Datetime(*nanos),
            AttributeValue::KeywordList(items) => {
                token_value::Value::KeywordList(KeywordListValue {
                    items: items.clone(),
                })
            }
        });
        Self { value }
    }
}

impl From<TokenValue> for Option<AttributeValue> {
    fn from(token: TokenValue) -> Self {
        token.value.map(|value| match value {
            token_value::Value::Text(s) => AttributeValue::Text(s),
            token_value::Value::Int(n) => AttributeValue::Int(n),
            token_value::Value::Bool(b) => AttributeValue::Bool(b),
            token_value::Value::Datetime(nanos) => AttributeValue::Datetime(nanos),
            token_value::Value::KeywordList(list) => AttributeValue::KeywordList(list.items),
        })
    }
}

/// Where an execution falls in a sort order.
///
/// `values[i]` is the execution's value for the `i`-th sort key, `None` when
/// absent. Positions are totally ordered: absent values sort after present
/// ones in both directions, and ties break on run id ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortPosition {
    values: Vec<Option<AttributeValue>>,
    run_id: String,
}

impl SortPosition {
    /// The position of `record` under `sort`.
    #[must_use]
    pub fn of(record: &ExecutionRecord, sort: &SortSpec) -> Self {
        Self {
            values: sort
                .keys()
                .iter()
                .map(|key| record.get(&key.attribute).cloned())
                .collect(),
            run_id: record.run_id().to_owned(),
        }
    }

    /// Compare two positions taken under the same `sort`.
    #[must_use]
    pub fn compare(&self, other: &Self, sort: &SortSpec) -> Ordering {
        for (i, key) in sort.keys().iter().enumerate() {
            let ordering = match (self.values.get(i), other.values.get(i)) {
                (Some(Some(a)), Some(Some(b))) => match key.direction {
                    SortDirection::Ascending => a.total_cmp(b),
                    SortDirection::Descending => b.total_cmp(a),
                },
                (Some(Some(_)), _) => Ordering::Less,
                (_, Some(Some(_))) => Ordering::Greater,
                _ => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        self.run_id.cmp(&other.run_id)
    }
}

/// Decoded page token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    sort_keys: Vec<String>,
    position: SortPosition,
}

impl PageCursor {
    /// A cursor positioned at `record`.
    #[must_use]
    pub fn at(record: &ExecutionRecord, sort: &SortSpec) -> Self {
        Self {
            sort_keys: sort_signature(sort),
            position: SortPosition::of(record, sort),
        }
    }

    /// Sort position of the last execution already returned.
    #[must_use]
    pub const fn position(&self) -> &SortPosition {
        &self.position
    }

    /// Serialize to the opaque token format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let proto = PageTokenProto {
            sort_keys: self.sort_keys.clone(),
            sort_values: self
                .position
                .values
                .iter()
                .map(|value| TokenValue::from(value.as_ref()))
                .collect(),
            run_id: self.position.run_id.as_str().to_owned(),
        };

        let mut bytes = Vec::with_capacity(1 + proto.encoded_len() + CHECKSUM_SIZE);
        bytes.push(TOKEN_VERSION);
        bytes.extend_from_slice(&proto.encode_to_vec());
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_le_bytes());
        bytes
    }

    /// Parse a token issued for `sort`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPageToken` if the token is truncated, corrupt, from an
    /// unknown version, or was issued for a different sort.
    pub fn decode(bytes: &[u8], sort: &SortSpec) -> Result<Self, StoreError> {
        if bytes.len() < 1 + CHECKSUM_SIZE {
            return Err(invalid("token is truncated"));
        }
        let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_SIZE);
        let stored = u32::from_le_bytes([checksum[0], checksum[1], checksum[2], checksum[3]]);
        if stored != crc32fast::hash(body) {
            return Err(invalid("checksum mismatch"));
        }
        if body[0] != TOKEN_VERSION {
            return Err(invalid(&format!("unsupported token version {}", body[0])));
        }

        let proto = PageTokenProto::decode(&body[1..])
            .map_err(|e| invalid(&format!("malformed token: {e}")))?;

        let expected = sort_signature(sort);
        if proto.sort_keys != expected || proto.sort_values.len() != expected.len() {
            return Err(invalid("token was issued for a different sort order"));
        }

        Ok(Self {
            sort_keys: proto.sort_keys,
            position: SortPosition {
                values: proto.sort_values.into_iter().map(Into::into).collect(),
                run_id: proto.run_id,
            },
        })
    }
}

/// `"<attribute> <direction>"` per sort key.
fn sort_signature(sort: &SortSpec) -> Vec<String> {
    sort.keys()
        .iter()
        .map(|key| format!("{} {}", key.attribute, key.direction))
        .collect()
}

fn invalid(message: &str) -> StoreError {
    StoreError::InvalidPageToken(message.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{HISTORY_LENGTH, START_TIME};
    use crate::types::SortKey;

    fn record() -> ExecutionRecord {
        ExecutionRecord::new("run-7")
            .with(START_TIME, AttributeValue::Datetime(1_000))
            .with("Labels", AttributeValue::keyword_list(["x"]))
    }

    #[test]
    fn test_token_round_trip_keeps_missing_values() {
        let sort = SortSpec::from_keys(vec![SortKey::desc(START_TIME), SortKey::asc(HISTORY_LENGTH)]);
        let cursor = PageCursor::at(&record(), &sort);
        let decoded = PageCursor::decode(&cursor.encode(), &sort).expect("decode");
        assert_eq!(decoded, cursor);
        assert_eq!(decoded.position().values[1], None);
    }

    #[test]
    fn test_corrupt_token_is_rejected() {
        let sort = SortSpec::default();
        let mut bytes = PageCursor::at(&record(), &sort).encode();
        bytes[2] ^= 0xff;
        assert!(matches!(
            PageCursor::decode(&bytes, &sort),
            Err(StoreError::InvalidPageToken(_))
        ));
        assert!(matches!(
            PageCursor::decode(b"abc", &sort),
            Err(StoreError::InvalidPageToken(_))
        ));
    }

    #[test]
    fn test_token_is_bound_to_sort() {
        let issued = PageCursor::at(&record(), &SortSpec::default()).encode();
        let other = SortSpec::from_keys(vec![SortKey::asc(HISTORY_LENGTH)]);
        assert!(matches!(
            PageCursor::decode(&issued, &other),
            Err(StoreError::InvalidPageToken(_))
        ));
    }

    #[test]
    fn test_token_is_bound_to_direction() {
        let issued = PageCursor::at(&record(), &SortSpec::default()).encode();
        let flipped = SortSpec::from_keys(vec![SortKey::asc(START_TIME)]);
        assert!(PageCursor::decode(&issued, &flipped).is_err());
    }

    #[test]
    fn test_missing_values_sort_last_in_both_directions() {
        let present = ExecutionRecord::new("a").with(HISTORY_LENGTH, AttributeValue::Int(1));
        let absent = ExecutionRecord::new("b");
        for sort in [
            SortSpec::from_keys(vec![SortKey::asc(HISTORY_LENGTH)]),
            SortSpec::from_keys(vec![SortKey::desc(HISTORY_LENGTH)]),
        ] {
            let ordering =
                SortPosition::of(&present, &sort).compare(&SortPosition::of(&absent, &sort), &sort);
            assert_eq!(ordering, Ordering::Less);
        }
    }

    #[test]
    fn test_ties_break_on_run_id() {
        let sort = SortSpec::default();
        let a = ExecutionRecord::new("a").with(START_TIME, AttributeValue::Datetime(5));
        let b = ExecutionRecord::new("b").with(START_TIME, AttributeValue::Datetime(5));
        assert_eq!(
            SortPosition::of(&a, &sort).compare(&SortPosition::of(&b, &sort), &sort),
            Ordering::Less
        );
    }
}
