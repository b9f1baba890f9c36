pub mod error;
pub mod filestore;

pub use error::{Result, StoreError};
pub use filestore::CredentialStore;
pub use fcmcore::store::{Credentials, MAX_PERSISTENT_IDS, PersistentIdSet};
