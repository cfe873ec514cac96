//! Uniform in-memory representation of one API response.
//!
//! A [`ResponseEnvelope`] is the same type whether the payload came from the
//! network or from the disk cache; [`Origin`] records which. Downstream code
//! reads totals and records through the envelope and never branches on origin.

use serde_json::{Map, Value};

use super::error::{Error, Result};
use super::xml;
use crate::models::ResponseFormat;

const EMPTY_JSON: &str = r#"{"result":[{"total":"0"}],"records":[]}"#;
const EMPTY_XML: &str = "<response><result><total>0</total></result><records/></response>";

/// Where the payload of an envelope was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Fetched from the API during this call
    Network,
    /// Loaded from the disk cache
    Cache,
    /// Built locally without any I/O (zero-count requests)
    Synthesized,
}

/// Parsed payload
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Json(Value),
    Xml(String),
}

/// Records held by an envelope
#[derive(Debug, Clone, PartialEq)]
pub enum RecordContainer<'a> {
    /// Elements of the JSON `records` array
    Json(&'a [Value]),
    /// Each child of the XML `records` element, serialized
    Xml(Vec<String>),
}

impl RecordContainer<'_> {
    /// Number of records
    pub fn len(&self) -> usize {
        match self {
            RecordContainer::Json(records) => records.len(),
            RecordContainer::Xml(records) => records.len(),
        }
    }

    /// Whether there are no records
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One API response, live or cached
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    document: Document,
    origin: Origin,
}

impl ResponseEnvelope {
    /// Wrap a body just fetched from the API
    pub fn from_network(format: ResponseFormat, body: &str) -> Self {
        Self::parse(format, body, Origin::Network)
    }

    /// Wrap a body read from the cache
    pub fn from_cache(format: ResponseFormat, body: &str) -> Self {
        Self::parse(format, body, Origin::Cache)
    }

    /// A zero-record response
    pub fn empty(format: ResponseFormat) -> Self {
        let body = match format {
            ResponseFormat::Json => EMPTY_JSON,
            ResponseFormat::Xml => EMPTY_XML,
        };
        Self::parse(format, body, Origin::Synthesized)
    }

    /// Malformed JSON becomes an empty object; the next refresh recovers it.
    fn parse(format: ResponseFormat, body: &str, origin: Origin) -> Self {
        let document = match format {
            ResponseFormat::Json => match serde_json::from_str(body) {
                Ok(value) => Document::Json(value),
                Err(e) => {
                    tracing::warn!("Malformed JSON response ({:?}), using empty document: {}", origin, e);
                    Document::Json(Value::Object(Map::new()))
                }
            },
            ResponseFormat::Xml => Document::Xml(body.to_string()),
        };
        Self { document, origin }
    }

    /// Payload format
    pub fn format(&self) -> ResponseFormat {
        match self.document {
            Document::Json(_) => ResponseFormat::Json,
            Document::Xml(_) => ResponseFormat::Xml,
        }
    }

    /// Where the first page of this envelope came from
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Parsed payload
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// JSON payload, if this is a JSON envelope
    pub fn json(&self) -> Option<&Value> {
        match &self.document {
            Document::Json(value) => Some(value),
            Document::Xml(_) => None,
        }
    }

    /// XML payload, if this is an XML envelope
    pub fn xml(&self) -> Option<&str> {
        match &self.document {
            Document::Json(_) => None,
            Document::Xml(text) => Some(text),
        }
    }

    /// Total number of results the API reports for the query
    ///
    /// Reads `result[0].total` from JSON and `result/total` from XML. A
    /// missing, non-numeric or negative total is an error: it means the
    /// endpoint mapping is wrong, not that the request should be retried.
    pub fn total_available(&self) -> Result<u64> {
        let format = self.format();
        let missing = |message: String| Error::MissingTotal { format, message };

        let raw = match &self.document {
            Document::Json(value) => match value.pointer("/result/0/total") {
                Some(Value::String(s)) => s.trim().to_string(),
                Some(Value::Number(n)) => n.to_string(),
                Some(other) => return Err(missing(format!("unexpected value {}", other))),
                None => return Err(missing("no result[0].total field".to_string())),
            },
            Document::Xml(text) => xml::total_text(text)?
                .ok_or_else(|| missing("no result/total element".to_string()))?,
        };

        let total: i64 = raw
            .parse()
            .map_err(|_| missing(format!("'{}' is not a number", raw)))?;
        u64::try_from(total).map_err(|_| missing(format!("negative total {}", total)))
    }

    /// Records of this envelope
    pub fn record_container(&self) -> Result<RecordContainer<'_>> {
        match &self.document {
            Document::Json(value) => match value.get("records") {
                Some(Value::Array(records)) => Ok(RecordContainer::Json(records)),
                Some(_) => Err(Error::Parse("JSON: records is not an array".to_string())),
                None => Ok(RecordContainer::Json(&[])),
            },
            Document::Xml(text) => Ok(RecordContainer::Xml(xml::record_fragments(text)?)),
        }
    }

    /// Number of records in this envelope
    pub fn record_count(&self) -> Result<usize> {
        Ok(self.record_container()?.len())
    }

    /// Append `other`'s records after this envelope's records
    ///
    /// Both envelopes must have the same format; merging across formats is a
    /// programming error and always fails with [`Error::FormatMismatch`].
    pub fn merge(self, other: ResponseEnvelope) -> Result<ResponseEnvelope> {
        let (left, right) = (self.format(), other.format());
        let origin = self.origin;

        let document = match (self.document, other.document) {
            (Document::Json(mut target), Document::Json(source)) => {
                let incoming = match source {
                    Value::Object(mut map) => match map.remove("records") {
                        Some(Value::Array(records)) => records,
                        Some(_) => {
                            return Err(Error::Parse("JSON: records is not an array".to_string()))
                        }
                        None => Vec::new(),
                    },
                    _ => Vec::new(),
                };

                let object = target.as_object_mut().ok_or_else(|| {
                    Error::Parse("JSON: response is not an object".to_string())
                })?;
                match object
                    .entry("records")
                    .or_insert_with(|| Value::Array(Vec::new()))
                {
                    Value::Array(records) => records.extend(incoming),
                    _ => return Err(Error::Parse("JSON: records is not an array".to_string())),
                }
                Document::Json(target)
            }
            (Document::Xml(target), Document::Xml(source)) => {
                Document::Xml(xml::append_records(&target, &source)?)
            }
            _ => return Err(Error::FormatMismatch { left, right }),
        };

        Ok(Self { document, origin })
    }

    /// Serialized payload
    pub fn to_text(&self) -> String {
        match &self.document {
            Document::Json(value) => value.to_string(),
            Document::Xml(text) => text.clone(),
        }
    }
}
