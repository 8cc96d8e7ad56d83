//! Cached reads and invalidating writes over a [`Repository`](crate::repository::Repository).

pub mod query;
pub mod query_client;

pub use query::{Query, QueryStatus};
pub use query_client::QueryClient;

/// Cache namespaces. Detail keys live under their list namespace (`files/detail`).
pub mod keys {
    pub const FILES: &str = "files";
    pub const FILE_DETAIL: &str = "files/detail";
    pub const TRASH: &str = "trash";
    pub const TAGS: &str = "tags";
    pub const SAVED_SEARCHES: &str = "saved-searches";
    pub const SESSION: &str = "session";
}
