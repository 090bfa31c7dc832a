//! Normalization of remote collection responses.
//!
//! The remote API returns collections in four different shapes:
//!
//! | Shape        | JSON                                   |
//! |--------------|----------------------------------------|
//! | `Bare`       | `[ ... ]`                              |
//! | `Data`       | `{ "data": [ ... ] }`                  |
//! | `Items`      | `{ "items": [ ... ] }`                 |
//! | `Paginated`  | `{ "pagination": { ... }, "data": [ ... ] }` |
//!
//! [`RawEnvelope::classify`] maps a JSON value onto exactly one of these
//! shapes and fails with [`EnvelopeError`] on anything else. There is no
//! silent fallback to an empty list: an empty list would wipe the local
//! collection on merge.
//!
//! [`ResponseEnvelopeParser::parse`] then decodes every element into the
//! entity type, producing a [`CanonicalList`].
//!
//! # Examples
//!
//! ```rust
//! use reconciler::envelope::{EnvelopeShape, ResponseEnvelopeParser};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Debug, Deserialize, PartialEq)]
//! struct Row { id: String }
//!
//! let list = ResponseEnvelopeParser::parse::<Row>(json!({
//!     "pagination": { "page": 1, "limit": 20, "total": 1 },
//!     "data": [{ "id": "a" }]
//! }))
//! .unwrap();
//!
//! assert_eq!(list.shape, EnvelopeShape::Paginated);
//! assert_eq!(list.items, vec![Row { id: "a".to_string() }]);
//!
//! assert!(ResponseEnvelopeParser::parse::<Row>(json!({ "rows": [] })).is_err());
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// A fetched collection could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The value matches none of the recognized shapes.
    #[error("unrecognized envelope shape: {observed}")]
    UnrecognizedShape {
        /// Short description of what was received.
        observed: String,
    },

    /// The object carries both `data` and `items` lists.
    #[error("ambiguous envelope: both `data` and `items` are lists")]
    AmbiguousShape,

    /// The `pagination` member is not an object of counters.
    #[error("invalid pagination block: {message}")]
    InvalidPagination {
        /// Decoder message.
        message: String,
    },

    /// One element of the list could not be decoded into the entity type.
    #[error("invalid item at index {index}: {message}")]
    InvalidItem {
        /// Position of the element in the list.
        index: usize,
        /// Decoder message.
        message: String,
    },
}

// =============================================================================
// Shapes
// =============================================================================

/// The recognized envelope shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeShape {
    /// A bare JSON array.
    Bare,
    /// `{ "data": [...] }`
    Data,
    /// `{ "items": [...] }`
    Items,
    /// `{ "pagination": {...}, "data": [...] }`
    Paginated,
}

impl fmt::Display for EnvelopeShape {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bare => "bare",
            Self::Data => "data",
            Self::Items => "items",
            Self::Paginated => "paginated",
        };
        formatter.write_str(name)
    }
}

/// Pagination counters attached to a paginated response.
///
/// All counters are optional; servers disagree on which ones they send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Current page number.
    #[serde(default)]
    pub page: Option<u64>,
    /// Page size.
    #[serde(default, alias = "pageSize", alias = "perPage")]
    pub limit: Option<u64>,
    /// Total number of records across all pages.
    #[serde(default, alias = "totalCount")]
    pub total: Option<u64>,
    /// Total number of pages.
    #[serde(default, alias = "pages")]
    pub total_pages: Option<u64>,
}

/// A collection response, classified but not yet decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEnvelope {
    /// A bare JSON array.
    Bare(Vec<Value>),
    /// `{ "data": [...] }`
    Data(Vec<Value>),
    /// `{ "items": [...] }`
    Items(Vec<Value>),
    /// `{ "pagination": {...}, "data": [...] }`
    Paginated {
        /// Pagination counters.
        pagination: PageInfo,
        /// The records on this page.
        data: Vec<Value>,
    },
}

impl RawEnvelope {
    /// Classifies a JSON value into one of the recognized shapes.
    ///
    /// # Errors
    ///
    /// - [`EnvelopeError::AmbiguousShape`] if an object has both `data` and
    ///   `items` lists
    /// - [`EnvelopeError::InvalidPagination`] if `pagination` is present next
    ///   to a `data` list but is not an object of counters
    /// - [`EnvelopeError::UnrecognizedShape`] for everything else
    pub fn classify(value: Value) -> Result<Self, EnvelopeError> {
        match value {
            Value::Array(items) => Ok(Self::Bare(items)),
            Value::Object(mut object) => {
                let data = take_list(&mut object, "data");
                let items = take_list(&mut object, "items");
                match (data, items) {
                    (Ok(_), Ok(_)) => Err(EnvelopeError::AmbiguousShape),
                    (Ok(data), Err(_)) => match object.remove("pagination") {
                        Some(pagination) => {
                            let pagination = serde_json::from_value(pagination).map_err(|error| {
                                EnvelopeError::InvalidPagination {
                                    message: error.to_string(),
                                }
                            })?;
                            Ok(Self::Paginated { pagination, data })
                        }
                        None => Ok(Self::Data(data)),
                    },
                    (Err(_), Ok(items)) => Ok(Self::Items(items)),
                    (Err(data), Err(items)) => {
                        restore(&mut object, "data", data);
                        restore(&mut object, "items", items);
                        Err(EnvelopeError::UnrecognizedShape {
                            observed: describe_object(&object),
                        })
                    }
                }
            }
            other => Err(EnvelopeError::UnrecognizedShape {
                observed: describe_scalar(&other).to_string(),
            }),
        }
    }

    /// Returns the shape of this envelope.
    #[must_use]
    pub const fn shape(&self) -> EnvelopeShape {
        match self {
            Self::Bare(_) => EnvelopeShape::Bare,
            Self::Data(_) => EnvelopeShape::Data,
            Self::Items(_) => EnvelopeShape::Items,
            Self::Paginated { .. } => EnvelopeShape::Paginated,
        }
    }

    /// Splits the envelope into its records and optional pagination.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Value>, Option<PageInfo>) {
        match self {
            Self::Bare(items) | Self::Data(items) | Self::Items(items) => (items, None),
            Self::Paginated { pagination, data } => (data, Some(pagination)),
        }
    }

    /// Wraps `records` in the given shape.
    ///
    /// `pagination` is only used for [`EnvelopeShape::Paginated`]; when absent
    /// a single page holding every record is described.
    #[must_use]
    pub fn wrap(shape: EnvelopeShape, records: Vec<Value>, pagination: Option<PageInfo>) -> Self {
        match shape {
            EnvelopeShape::Bare => Self::Bare(records),
            EnvelopeShape::Data => Self::Data(records),
            EnvelopeShape::Items => Self::Items(records),
            EnvelopeShape::Paginated => {
                let total = records.len() as u64;
                let pagination = pagination.unwrap_or(PageInfo {
                    page: Some(1),
                    limit: Some(total),
                    total: Some(total),
                    total_pages: Some(1),
                });
                Self::Paginated {
                    pagination,
                    data: records,
                }
            }
        }
    }

    /// Renders the envelope back to the JSON the remote would send.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Bare(items) => Value::Array(items),
            Self::Data(items) => serde_json::json!({ "data": items }),
            Self::Items(items) => serde_json::json!({ "items": items }),
            Self::Paginated { pagination, data } => serde_json::json!({
                "pagination": pagination,
                "data": data,
            }),
        }
    }
}

/// Result of a `take_list` lookup: the list, or whatever non-list value was
/// under the key (so it can be put back).
type Probe = Result<Vec<Value>, Option<Value>>;

fn take_list(object: &mut Map<String, Value>, key: &str) -> Probe {
    match object.remove(key) {
        Some(Value::Array(items)) => Ok(items),
        other => Err(other),
    }
}

fn restore(object: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        object.insert(key.to_string(), value);
    }
}

fn describe_scalar(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn describe_object(object: &Map<String, Value>) -> String {
    if object.is_empty() {
        return "empty object".to_string();
    }
    let keys: Vec<String> = object
        .iter()
        .map(|(key, value)| format!("{key}: {}", describe_scalar(value)))
        .collect();
    format!("object {{ {} }}", keys.join(", "))
}

// =============================================================================
// Parser
// =============================================================================

/// A decoded collection in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalList<T> {
    /// The decoded records, in server order.
    pub items: Vec<T>,
    /// The shape the response arrived in.
    pub shape: EnvelopeShape,
    /// Pagination counters, for paginated responses.
    pub page: Option<PageInfo>,
}

impl<T> CanonicalList<T> {
    /// Returns `true` if the server reports more records than this response
    /// carries (a single page of a larger collection).
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.page
            .and_then(|page| page.total)
            .is_some_and(|total| total > self.items.len() as u64)
    }
}

/// Normalizes remote collection responses into a [`CanonicalList`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseEnvelopeParser;

impl ResponseEnvelopeParser {
    /// Classifies `value` and decodes every element into `T`.
    ///
    /// # Errors
    ///
    /// Returns an [`EnvelopeError`] if the shape is not recognized or any
    /// element fails to decode. No partial list is ever returned.
    pub fn parse<T: DeserializeOwned>(value: Value) -> Result<CanonicalList<T>, EnvelopeError> {
        let envelope = RawEnvelope::classify(value)?;
        let shape = envelope.shape();
        let (records, page) = envelope.into_parts();

        let items = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                serde_json::from_value(record).map_err(|error| EnvelopeError::InvalidItem {
                    index,
                    message: error.to_string(),
                })
            })
            .collect::<Result<Vec<T>, _>>()?;

        Ok(CanonicalList { items, shape, page })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Row {
        id: String,
    }

    fn rows(ids: &[&str]) -> Vec<Row> {
        ids.iter().map(|id| Row { id: (*id).to_string() }).collect()
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[rstest]
    #[case(json!([{"id": "a"}, {"id": "b"}]), EnvelopeShape::Bare)]
    #[case(json!({"data": [{"id": "a"}, {"id": "b"}]}), EnvelopeShape::Data)]
    #[case(json!({"items": [{"id": "a"}, {"id": "b"}]}), EnvelopeShape::Items)]
    #[case(
        json!({"pagination": {"page": 1, "limit": 2, "total": 2}, "data": [{"id": "a"}, {"id": "b"}]}),
        EnvelopeShape::Paginated
    )]
    fn test_parse_recognized_shapes(#[case] value: Value, #[case] expected: EnvelopeShape) {
        let list = ResponseEnvelopeParser::parse::<Row>(value).unwrap();
        assert_eq!(list.shape, expected);
        assert_eq!(list.items, rows(&["a", "b"]));
    }

    #[rstest]
    fn test_data_envelope_tolerates_extra_members() {
        let list =
            ResponseEnvelopeParser::parse::<Row>(json!({"success": true, "data": [{"id": "a"}]}))
                .unwrap();
        assert_eq!(list.shape, EnvelopeShape::Data);
        assert_eq!(list.items, rows(&["a"]));
    }

    #[rstest]
    fn test_empty_lists_are_valid() {
        let list = ResponseEnvelopeParser::parse::<Row>(json!({"items": []})).unwrap();
        assert!(list.items.is_empty());
    }

    #[rstest]
    #[case(json!(null), "null")]
    #[case(json!("oops"), "string")]
    #[case(json!(42), "number")]
    #[case(json!({}), "empty object")]
    #[case(json!({"rows": [{"id": "a"}]}), "object { rows: array }")]
    #[case(json!({"data": {"id": "a"}}), "object { data: object }")]
    fn test_unrecognized_shapes_fail_loudly(#[case] value: Value, #[case] observed: &str) {
        let error = ResponseEnvelopeParser::parse::<Row>(value).unwrap_err();
        assert_eq!(
            error,
            EnvelopeError::UnrecognizedShape {
                observed: observed.to_string()
            }
        );
    }

    #[rstest]
    fn test_data_and_items_together_is_ambiguous() {
        let error =
            ResponseEnvelopeParser::parse::<Row>(json!({"data": [], "items": []})).unwrap_err();
        assert_eq!(error, EnvelopeError::AmbiguousShape);
    }

    #[rstest]
    fn test_invalid_pagination_is_reported() {
        let error =
            ResponseEnvelopeParser::parse::<Row>(json!({"pagination": "page 1", "data": []}))
                .unwrap_err();
        assert!(matches!(error, EnvelopeError::InvalidPagination { .. }));
    }

    #[rstest]
    fn test_bad_item_aborts_whole_parse() {
        let error =
            ResponseEnvelopeParser::parse::<Row>(json!([{"id": "a"}, {"name": "b"}])).unwrap_err();
        assert!(matches!(error, EnvelopeError::InvalidItem { index: 1, .. }));
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    #[rstest]
    fn test_page_info_accepts_aliases() {
        let page: PageInfo =
            serde_json::from_value(json!({"page": 2, "pageSize": 10, "totalCount": 35, "pages": 4}))
                .unwrap();
        assert_eq!(
            page,
            PageInfo {
                page: Some(2),
                limit: Some(10),
                total: Some(35),
                total_pages: Some(4),
            }
        );
    }

    #[rstest]
    fn test_is_partial_when_total_exceeds_page() {
        let list = ResponseEnvelopeParser::parse::<Row>(
            json!({"pagination": {"total": 3}, "data": [{"id": "a"}]}),
        )
        .unwrap();
        assert!(list.is_partial());

        let complete = ResponseEnvelopeParser::parse::<Row>(json!([{"id": "a"}])).unwrap();
        assert!(!complete.is_partial());
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    #[rstest]
    #[case(EnvelopeShape::Bare)]
    #[case(EnvelopeShape::Data)]
    #[case(EnvelopeShape::Items)]
    #[case(EnvelopeShape::Paginated)]
    fn test_wrapped_envelope_classifies_as_its_shape(#[case] shape: EnvelopeShape) {
        let value = RawEnvelope::wrap(shape, vec![json!({"id": "a"})], None).into_value();
        let envelope = RawEnvelope::classify(value).unwrap();
        assert_eq!(envelope.shape(), shape);
    }
}
