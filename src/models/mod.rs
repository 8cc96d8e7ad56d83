use serde::{Deserialize, Serialize};

pub mod file;
pub mod query;
pub mod search;
pub mod tag;

pub use file::{
    Document, DownloadedFile, FileEvent, FileStatus, LifecycleError, UpdateFileRequest,
    UploadRequest, TRASH_RETENTION_DAYS,
};
pub use query::{FileQuery, Page, SortBy, SortOrder, TrashQuery, DEFAULT_PAGE_SIZE};
pub use search::{SavedSearchCondition, SavedSearchInput};
pub use tag::{CreateTagRequest, Tag, TagColor, UpdateTagRequest};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub user_id: String,
    pub password: String,
    pub remember_me: bool,
}

impl LoginRequest {
    /// URL-encoded form fields in the order the login endpoint expects.
    pub fn form_fields(&self) -> [(&'static str, String); 3] {
        [
            ("userId", self.user_id.clone()),
            ("password", self.password.clone()),
            ("rememberMe", self.remember_me.to_string()),
        ]
    }
}
