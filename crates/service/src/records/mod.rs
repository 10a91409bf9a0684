//! Record collection: CRUD, search, and photo attachment over a `KvProvider`.

pub mod search;
pub mod store;

pub use search::{matches, SEARCH_FIELDS};
pub use store::{Committed, RecordStore, StorageNotice, RECORDS_KEY};
