//! # springer-client
//!
//! A client for the Springer Nature API: bibliographic metadata, meta v2
//! records and open access full text.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`client`]: transport, disk cache, response envelopes and pagination
//! - [`models`]: endpoints, queries and typed records
//! - [`utils`]: HTTP client and retry with backoff
//! - [`config`]: configuration management
//!
//! ## Example
//!
//! ```rust,no_run
//! use springer_client::{Config, Query, RetrieveOptions, SpringerClient};
//! use springer_client::models::{MetadataRecords, RecordParser};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), springer_client::Error> {
//! let client = SpringerClient::new(Config::default().with_api_key("your-key"))?;
//! let retrieval = client
//!     .metadata(&Query::keyword("eigenvalues"), RetrieveOptions::default().count(30))
//!     .await?;
//! for record in MetadataRecords::parse(&retrieval.envelope)? {
//!     println!("{:?}", record.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use client::{
    Error, RefreshPolicy, Result, Retrieval, RetrievalWarning, RetrieveOptions, SpringerClient,
};
pub use config::Config;
pub use models::{Endpoint, Plan, Query};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
