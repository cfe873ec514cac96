//! Query models: identifier lookups and keyword searches.
//!
//! A [`Query`] renders to the `q` request parameter and, together with a
//! window `(start, size)`, determines the cache key of a response.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of identifier for identifier-based lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Doi,
    Issn,
    Isbn,
}

impl IdentifierKind {
    /// Field name used in the query string
    pub fn field(&self) -> &'static str {
        match self {
            IdentifierKind::Doi => "doi",
            IdentifierKind::Issn => "issn",
            IdentifierKind::Isbn => "isbn",
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// A query against one of the endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    /// Lookup by DOI, ISSN or ISBN
    Identifier { kind: IdentifierKind, value: String },

    /// Free text plus structured `field:value` filters
    Keyword {
        text: String,
        fields: Vec<(String, String)>,
    },
}

impl Query {
    /// Lookup by DOI
    pub fn doi(value: impl Into<String>) -> Self {
        Self::identifier(IdentifierKind::Doi, value)
    }

    /// Lookup by ISSN
    pub fn issn(value: impl Into<String>) -> Self {
        Self::identifier(IdentifierKind::Issn, value)
    }

    /// Lookup by ISBN
    pub fn isbn(value: impl Into<String>) -> Self {
        Self::identifier(IdentifierKind::Isbn, value)
    }

    /// Identifier lookup of the given kind
    pub fn identifier(kind: IdentifierKind, value: impl Into<String>) -> Self {
        Self::Identifier {
            kind,
            value: value.into().trim().to_string(),
        }
    }

    /// Free-text search
    pub fn keyword(text: impl Into<String>) -> Self {
        Self::Keyword {
            text: text.into().trim().to_string(),
            fields: Vec::new(),
        }
    }

    /// Add a `field:value` filter, e.g. `datefrom:2024-01-01`.
    ///
    /// An identifier query becomes a keyword query carrying the identifier as
    /// its first filter.
    #[must_use]
    pub fn field(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let (text, mut fields) = match self {
            Query::Keyword { text, fields } => (text, fields),
            Query::Identifier { kind, value } => {
                (String::new(), vec![(kind.field().to_string(), value)])
            }
        };
        fields.push((name.into(), value.into()));
        Query::Keyword { text, fields }
    }

    /// Whether the query carries no search terms at all
    pub fn is_empty(&self) -> bool {
        match self {
            Query::Identifier { value, .. } => value.is_empty(),
            Query::Keyword { text, fields } => text.is_empty() && fields.is_empty(),
        }
    }

    /// The `q` request parameter
    pub fn render(&self) -> String {
        match self {
            Query::Identifier { kind, value } => format!("{}:{}", kind, value),
            Query::Keyword { text, fields } => {
                let mut parts = Vec::with_capacity(fields.len() + 1);
                if !text.is_empty() {
                    parts.push(text.clone());
                }
                parts.extend(fields.iter().map(|(k, v)| format!("{}:{}", k, v)));
                parts.join(" ")
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
