use std::sync::Arc;

use log::{info, warn};

use super::keys;
use super::query::{Query, QueryStatus};
use crate::cache::{QueryCache, QueryKey};
use crate::error::{ApiError, TransitionError, UploadError};
use crate::models::{
    CreateTagRequest, Document, DownloadedFile, FileQuery, LoginRequest, Page,
    SavedSearchCondition, SavedSearchInput, SessionUser, Tag, TrashQuery, UpdateFileRequest,
    UpdateTagRequest, UploadRequest,
};
use crate::repository::Repository;
use crate::utils::validation::{validate_files, ValidationConfig};

/// Binds repository operations to cache keys.
///
/// Reads go through the cache. Writes go straight to the repository and, once
/// they succeed, mark the namespaces they affect stale.
pub struct QueryClient<R: Repository + 'static> {
    repository: Arc<R>,
    cache: Arc<QueryCache>,
    rules: ValidationConfig,
}

impl<R: Repository + 'static> Clone for QueryClient<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            cache: Arc::clone(&self.cache),
            rules: self.rules.clone(),
        }
    }
}

impl<R: Repository + 'static> QueryClient<R> {
    pub fn new(repository: Arc<R>, cache: Arc<QueryCache>) -> Self {
        Self {
            repository,
            cache,
            rules: ValidationConfig::default(),
        }
    }

    pub fn with_rules(mut self, rules: ValidationConfig) -> Self {
        self.rules = rules;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn rules(&self) -> &ValidationConfig {
        &self.rules
    }

    pub fn files_key(query: &FileQuery) -> Result<QueryKey, ApiError> {
        QueryKey::new(keys::FILES, query)
    }

    pub fn file_key(id: &str) -> Result<QueryKey, ApiError> {
        QueryKey::new(keys::FILE_DETAIL, id)
    }

    /// Drives `query` through one read of the file list.
    pub async fn load_files<'q>(
        &self,
        query: &'q mut Query<Page<Document>>,
        params: &FileQuery,
    ) -> Result<&'q QueryStatus<Page<Document>>, TransitionError> {
        // An unusable key surfaces as the read's own error.
        if let Ok(key) = Self::files_key(params) {
            query.track(key);
        }
        query.run(self.files(params)).await
    }

    pub async fn load_file<'q>(
        &self,
        query: &'q mut Query<Document>,
        id: &str,
    ) -> Result<&'q QueryStatus<Document>, TransitionError> {
        if let Ok(key) = Self::file_key(id) {
            query.track(key);
        }
        query.run(self.file(id)).await
    }

    // Reads

    pub async fn files(&self, query: &FileQuery) -> Result<Page<Document>, ApiError> {
        let repo = Arc::clone(&self.repository);
        let query = query.clone();
        self.cache
            .get_or_fetch(Self::files_key(&query)?, move || async move {
                repo.list_files(&query).await
            })
            .await
    }

    pub async fn file(&self, id: &str) -> Result<Document, ApiError> {
        let repo = Arc::clone(&self.repository);
        let id = id.to_string();
        self.cache
            .get_or_fetch(Self::file_key(&id)?, move || async move {
                repo.get_file(&id).await
            })
            .await
    }

    pub async fn trash(&self, query: &TrashQuery) -> Result<Page<Document>, ApiError> {
        let repo = Arc::clone(&self.repository);
        let query = query.clone();
        self.cache
            .get_or_fetch(QueryKey::new(keys::TRASH, &query)?, move || async move {
                repo.list_trash(&query).await
            })
            .await
    }

    pub async fn tags(&self) -> Result<Vec<Tag>, ApiError> {
        let repo = Arc::clone(&self.repository);
        self.cache
            .get_or_fetch(QueryKey::resource(keys::TAGS), move || async move {
                repo.list_tags().await
            })
            .await
    }

    pub async fn saved_searches(&self) -> Result<Vec<SavedSearchCondition>, ApiError> {
        let repo = Arc::clone(&self.repository);
        self.cache
            .get_or_fetch(QueryKey::resource(keys::SAVED_SEARCHES), move || async move {
                repo.list_saved_searches().await
            })
            .await
    }

    pub async fn session(&self) -> Result<SessionUser, ApiError> {
        let repo = Arc::clone(&self.repository);
        self.cache
            .get_or_fetch(QueryKey::resource(keys::SESSION), move || async move {
                repo.current_session().await
            })
            .await
    }

    /// Downloads are never cached.
    pub async fn download(&self, id: &str) -> Result<DownloadedFile, ApiError> {
        self.repository.download_file(id).await
    }

    // Writes

    async fn invalidate(&self, namespaces: &[&str]) {
        for namespace in namespaces {
            self.cache.invalidate(namespace).await;
        }
    }

    /// Validates the whole batch first; nothing is sent if any file is refused.
    pub async fn upload(&self, requests: Vec<UploadRequest>) -> Result<Vec<Document>, UploadError> {
        let candidates: Vec<_> = requests.iter().map(UploadRequest::candidate).collect();
        let validation = validate_files(&candidates, &self.rules);
        if !validation.valid {
            warn!("Upload refused: {}", validation.errors.join("; "));
            return Err(UploadError::Rejected(validation.errors));
        }

        let mut uploaded = Vec::with_capacity(requests.len());
        let mut failure = None;
        for request in requests {
            match self.repository.upload_file(request).await {
                Ok(document) => uploaded.push(document),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if !uploaded.is_empty() {
            self.invalidate(&[keys::FILES]).await;
            info!("Uploaded {} file(s)", uploaded.len());
        }
        match failure {
            Some(err) => Err(UploadError::Api(err)),
            None => Ok(uploaded),
        }
    }

    pub async fn update_file(&self, id: &str, request: &UpdateFileRequest) -> Result<Document, ApiError> {
        let document = self.repository.update_file(id, request).await?;
        self.invalidate(&[keys::FILES]).await;
        info!("Updated file {}", id);
        Ok(document)
    }

    pub async fn delete_file(&self, id: &str) -> Result<(), ApiError> {
        self.repository.delete_file(id).await?;
        self.invalidate(&[keys::FILES, keys::TRASH]).await;
        info!("Moved file {} to trash", id);
        Ok(())
    }

    pub async fn restore_file(&self, id: &str) -> Result<Document, ApiError> {
        let document = self.repository.restore_file(id).await?;
        self.invalidate(&[keys::FILES, keys::TRASH]).await;
        info!("Restored file {}", id);
        Ok(document)
    }

    pub async fn permanently_delete_file(&self, id: &str) -> Result<(), ApiError> {
        self.repository.permanently_delete_file(id).await?;
        self.invalidate(&[keys::TRASH]).await;
        info!("Permanently deleted file {}", id);
        Ok(())
    }

    pub async fn create_tag(&self, request: &CreateTagRequest) -> Result<Tag, ApiError> {
        let tag = self.repository.create_tag(request).await?;
        self.invalidate(&[keys::TAGS]).await;
        info!("Created tag {}", tag.name);
        Ok(tag)
    }

    pub async fn update_tag(&self, id: &str, request: &UpdateTagRequest) -> Result<Tag, ApiError> {
        let tag = self.repository.update_tag(id, request).await?;
        self.invalidate(&[keys::TAGS]).await;
        Ok(tag)
    }

    /// Files and saved searches carry tag ids, so they go stale too.
    pub async fn delete_tag(&self, id: &str) -> Result<(), ApiError> {
        self.repository.delete_tag(id).await?;
        self.invalidate(&[keys::TAGS, keys::FILES, keys::SAVED_SEARCHES]).await;
        info!("Deleted tag {}", id);
        Ok(())
    }

    pub async fn create_saved_search(&self, input: &SavedSearchInput) -> Result<SavedSearchCondition, ApiError> {
        let condition = self.repository.create_saved_search(input).await?;
        self.invalidate(&[keys::SAVED_SEARCHES]).await;
        Ok(condition)
    }

    pub async fn update_saved_search(
        &self,
        id: &str,
        input: &SavedSearchInput,
    ) -> Result<SavedSearchCondition, ApiError> {
        let condition = self.repository.update_saved_search(id, input).await?;
        self.invalidate(&[keys::SAVED_SEARCHES]).await;
        Ok(condition)
    }

    pub async fn delete_saved_search(&self, id: &str) -> Result<(), ApiError> {
        self.repository.delete_saved_search(id).await?;
        self.invalidate(&[keys::SAVED_SEARCHES]).await;
        Ok(())
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<SessionUser, ApiError> {
        let user = self.repository.login(request).await?;
        self.cache.invalidate_all().await;
        Ok(user)
    }

    /// Drops every cached value, whatever the service answered.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self.repository.logout().await;
        self.cache.clear().await;
        result
    }
}
