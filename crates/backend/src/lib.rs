//! External collaborators of the marketplace: the identity service, the
//! document store for profiles and listings, and the blob store for images.
//!
//! Each collaborator is a trait with two implementations: a Firebase REST
//! client under [`firebase`] and an in-process one under [`memory`].

pub mod blobs;
pub mod documents;
pub mod error;
pub mod firebase;
pub mod identity;
pub mod memory;

pub use blobs::BlobStore;
pub use documents::{
    to_fields, Direction, Document, DocumentStore, Fields, Filter, FilterOp, Order, Query,
    WriteMode,
};
pub use error::{BackendError, BackendResult};
pub use firebase::FirebaseBackend;
pub use identity::{IdentityClient, IdentityHandle, IdentityState};
