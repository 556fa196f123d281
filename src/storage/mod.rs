pub mod blob;
pub mod documents;
pub mod error;

pub use blob::{BlobError, BlobId, BlobStore, FsBlobStore, MemoryBlobStore};
pub use documents::{DocumentStore, MemoryDocumentStore, PgDocumentStore, SaveOutcome};
pub use error::DbError;
