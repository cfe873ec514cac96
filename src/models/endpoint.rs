//! API surfaces exposed by Springer Nature and their fixed properties.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default base URL of the Springer Nature API
pub const DEFAULT_BASE_URL: &str = "http://api.springernature.com";

/// Payload format returned by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    Json,
    Xml,
}

impl ResponseFormat {
    /// File extension used for cached payloads
    pub fn extension(&self) -> &'static str {
        match self {
            ResponseFormat::Json => "json",
            ResponseFormat::Xml => "xml",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Subscription tier, which bounds the page size per endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Basic,
    Premium,
}

/// One of the Springer Nature API surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// Bibliographic metadata (`/metadata/json`)
    Metadata,
    /// Meta v2 records (`/meta/v2/json`)
    Meta,
    /// Open access full text in JATS (`/openaccess/jats`)
    OpenAccess,
}

impl Endpoint {
    /// All endpoints, in a stable order
    pub const ALL: [Endpoint; 3] = [Endpoint::Metadata, Endpoint::Meta, Endpoint::OpenAccess];

    /// Logical name
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Metadata => "Metadata",
            Endpoint::Meta => "Meta",
            Endpoint::OpenAccess => "OpenAccess",
        }
    }

    /// Path segment identifying the API on the wire
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Metadata => "metadata",
            Endpoint::Meta => "meta/v2",
            Endpoint::OpenAccess => "openaccess",
        }
    }

    /// Format segment appended to the path on the wire
    pub fn wire_format(&self) -> &'static str {
        match self {
            Endpoint::Metadata | Endpoint::Meta => "json",
            Endpoint::OpenAccess => "jats",
        }
    }

    /// Format of the response payload
    pub fn format(&self) -> ResponseFormat {
        match self {
            Endpoint::Metadata | Endpoint::Meta => ResponseFormat::Json,
            Endpoint::OpenAccess => ResponseFormat::Xml,
        }
    }

    /// Default cache subdirectory name
    pub fn cache_subdir(&self) -> &'static str {
        match self {
            Endpoint::Metadata => "metadata",
            Endpoint::Meta => "meta",
            Endpoint::OpenAccess => "open_access",
        }
    }

    /// Maximum number of records a single request may ask for
    pub fn page_ceiling(&self, plan: Plan) -> u32 {
        match (self, plan) {
            (Endpoint::Metadata | Endpoint::Meta, Plan::Basic) => 25,
            (Endpoint::Metadata | Endpoint::Meta, Plan::Premium) => 100,
            (Endpoint::OpenAccess, Plan::Basic) => 10,
            (Endpoint::OpenAccess, Plan::Premium) => 20,
        }
    }

    /// Full request URL below `base_url`
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            self.path(),
            self.wire_format()
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
