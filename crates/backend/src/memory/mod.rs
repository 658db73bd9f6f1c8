//! In-process implementations of the backend interfaces, used for local
//! development and as test fixtures.

mod blobs;
mod documents;
mod identity;

pub use blobs::{MemoryBlobStore, StoredBlob};
pub use documents::MemoryDocumentStore;
pub use identity::{MemoryIdentityClient, MessageKind, OutboundMessage};

use cuid2::CuidConstructor;
use once_cell::sync::Lazy;

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

fn new_id() -> String {
    CUID.create_id()
}
