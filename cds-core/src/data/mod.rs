//! Raw spread ingestion: supplier seam, file-backed supplier, table schema.

pub mod directory;
pub mod provider;
pub mod schema;

pub use directory::DirectorySource;
pub use provider::{InMemorySource, SpreadSource, YearTables};
pub use schema::SpreadSchema;
