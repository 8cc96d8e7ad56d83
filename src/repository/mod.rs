//! Capability traits for the document service, one per resource.
//!
//! Each method performs exactly one service call and hands back domain
//! values. Errors are passed through untouched.

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::{
    CreateTagRequest, Document, DownloadedFile, FileQuery, LoginRequest, Page,
    SavedSearchCondition, SavedSearchInput, SessionUser, Tag, TrashQuery, UpdateFileRequest,
    UpdateTagRequest, UploadRequest,
};

pub mod http;
pub mod mapping;
pub mod mock;

pub use http::HttpRepository;
pub use mock::{MockRepository, Operation};

#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn list_files(&self, query: &FileQuery) -> Result<Page<Document>, ApiError>;
    async fn get_file(&self, id: &str) -> Result<Document, ApiError>;
    async fn upload_file(&self, request: UploadRequest) -> Result<Document, ApiError>;
    async fn update_file(&self, id: &str, request: &UpdateFileRequest) -> Result<Document, ApiError>;
    /// Moves the file to the trash.
    async fn delete_file(&self, id: &str) -> Result<(), ApiError>;
    async fn download_file(&self, id: &str) -> Result<DownloadedFile, ApiError>;
}

#[async_trait]
pub trait TrashRepository: Send + Sync {
    async fn list_trash(&self, query: &TrashQuery) -> Result<Page<Document>, ApiError>;
    async fn restore_file(&self, id: &str) -> Result<Document, ApiError>;
    async fn permanently_delete_file(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError>;
    async fn create_tag(&self, request: &CreateTagRequest) -> Result<Tag, ApiError>;
    async fn update_tag(&self, id: &str, request: &UpdateTagRequest) -> Result<Tag, ApiError>;
    async fn delete_tag(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
pub trait SavedSearchRepository: Send + Sync {
    async fn list_saved_searches(&self) -> Result<Vec<SavedSearchCondition>, ApiError>;
    async fn create_saved_search(&self, input: &SavedSearchInput) -> Result<SavedSearchCondition, ApiError>;
    async fn update_saved_search(
        &self,
        id: &str,
        input: &SavedSearchInput,
    ) -> Result<SavedSearchCondition, ApiError>;
    async fn delete_saved_search(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<SessionUser, ApiError>;
    async fn logout(&self) -> Result<(), ApiError>;
    async fn current_session(&self) -> Result<SessionUser, ApiError>;

    /// Opaque credential worth persisting between runs, if the backend has one.
    async fn session_token(&self) -> Option<String> {
        None
    }

    async fn restore_session_token(&self, _token: Option<String>) {}
}

/// Everything the front end needs from one backend.
pub trait Repository:
    FileRepository + TrashRepository + TagRepository + SavedSearchRepository + SessionRepository
{
}

impl<T> Repository for T where
    T: FileRepository + TrashRepository + TagRepository + SavedSearchRepository + SessionRepository
{
}
