//! Core data models: endpoints, queries and parsed records.

mod endpoint;
mod query;
mod records;

pub use endpoint::{Endpoint, Plan, ResponseFormat, DEFAULT_BASE_URL};
pub use query::{IdentifierKind, Query};
pub use records::{
    Article, Chapter, Creator, Discipline, Facet, MetaRecord, MetaRecords, MetadataRecord,
    MetadataRecords, OpenAccessDocument, OpenAccessRecords, Paragraph, RecordParser, RecordUrl,
    ResultSummary,
};
