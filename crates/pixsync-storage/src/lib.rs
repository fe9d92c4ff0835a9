//! Pixsync Storage - Blob store client.
//!
//! Blobs are addressed by `{channel}/{destination name}`. Every backend
//! publishes an object under its final key only once the whole payload is
//! stored, and re-putting a key overwrites it (last write wins), so retried
//! uploads are safe.

mod error;
mod object;
mod store;

pub use error::{StorageError, StorageResult};
pub use object::ObjectBlobStore;
pub use store::{validate_key, BlobStore, Locator};
