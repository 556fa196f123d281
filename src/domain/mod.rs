pub mod document;
pub mod mint;

pub use document::{DocumentMetadata, DocumentRecord, Owner, OwnerStatus, ValidationError};
pub use mint::{MintReceipt, MintStage, MintedEvent, PendingMint};
