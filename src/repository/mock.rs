//! In-memory stand-in for the document service.
//!
//! Used by `docs-cli --mock` for local development and by the tests. It keeps
//! wire records and answers through the same mapping functions as the live
//! backend, and it enforces the rules the real service enforces (tag name
//! uniqueness, upload limits, lifecycle transitions, trash retention).

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::mapping::{
    document_from_wire, page_from_wire, saved_search_from_wire, session_from_wire, tag_from_wire,
    tags_from_wire,
};
use super::{FileRepository, SavedSearchRepository, SessionRepository, TagRepository, TrashRepository};
use crate::api::wire::{WireFile, WireFileList, WireSavedSearch, WireSession, WireTag};
use crate::error::ApiError;
use crate::models::{
    CreateTagRequest, Document, DownloadedFile, FileEvent, FileQuery, FileStatus, LoginRequest,
    Page, SavedSearchCondition, SavedSearchInput, SessionUser, SortBy, SortOrder, Tag,
    TrashQuery, UpdateFileRequest, UpdateTagRequest, UploadRequest,
};
use crate::utils::timestamp::{format_date, format_timestamp, parse_timestamp};
use crate::utils::validation::{
    validate_date_range, validate_description, validate_file_name, validate_keyword,
    validate_tag_name, ALLOWED_TYPES, MAX_FILE_SIZE_BYTES,
};

pub const DEMO_USER: &str = "demo";
pub const DEMO_PASSWORD: &str = "password";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListFiles,
    GetFile,
    UploadFile,
    UpdateFile,
    DeleteFile,
    DownloadFile,
    ListTrash,
    RestoreFile,
    PermanentlyDeleteFile,
    ListTags,
    CreateTag,
    UpdateTag,
    DeleteTag,
    ListSavedSearches,
    CreateSavedSearch,
    UpdateSavedSearch,
    DeleteSavedSearch,
    Login,
    Logout,
    CurrentSession,
}

impl Operation {
    fn is_public(&self) -> bool {
        matches!(self, Operation::Login | Operation::Logout | Operation::CurrentSession)
    }
}

#[derive(Default)]
struct MockState {
    files: Vec<WireFile>,
    blobs: HashMap<String, Bytes>,
    tags: Vec<WireTag>,
    searches: Vec<WireSavedSearch>,
    users: HashMap<String, String>,
    session: Option<WireSession>,
    require_login: bool,
    calls: HashMap<Operation, usize>,
    failures: HashMap<Operation, ApiError>,
    now: Option<DateTime<Utc>>,
}

impl MockState {
    fn now(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }

    fn now_string(&self) -> String {
        format_timestamp(&self.now())
    }

    fn file_index(&self, id: &str) -> Result<usize, ApiError> {
        self.files
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| ApiError::with_message(404, "File not found"))
    }

    fn active_file(&self, id: &str) -> Result<&WireFile, ApiError> {
        self.files
            .iter()
            .find(|f| f.id == id && f.deleted_at.is_none())
            .ok_or_else(|| ApiError::with_message(404, "File not found"))
    }

    fn tag_index(&self, id: &str) -> Result<usize, ApiError> {
        self.tags
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ApiError::with_message(404, "Tag not found"))
    }

    fn tag_name_taken(&self, name: &str, except: Option<&str>) -> bool {
        let wanted = name.trim().to_lowercase();
        self.tags
            .iter()
            .any(|t| Some(t.id.as_str()) != except && t.name.to_lowercase() == wanted)
    }

    fn current_user(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.user_id.clone())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn purge_expired(&mut self) {
        let now = self.now();
        let expired: Vec<String> = self
            .files
            .iter()
            .filter(|f| status_of(f).map(|s| s.is_purge_due(now)).unwrap_or(false))
            .map(|f| f.id.clone())
            .collect();
        if expired.is_empty() {
            return;
        }
        for id in &expired {
            self.blobs.remove(id);
        }
        self.files.retain(|f| !expired.contains(&f.id));
        info!("Purged {} file(s) past the trash retention window", expired.len());
    }
}

fn status_of(file: &WireFile) -> Result<FileStatus, ApiError> {
    Ok(document_from_wire(file.clone())?.status)
}

fn transition(file: &WireFile, event: FileEvent) -> Result<FileStatus, ApiError> {
    status_of(file)?
        .apply(event)
        .map_err(|e| ApiError::with_message(409, &e.to_string()))
}

fn bad_request(message: String) -> ApiError {
    ApiError::with_message(400, &message)
}

fn matches_query(file: &WireFile, query: &FileQuery) -> bool {
    if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        let in_name = file.name.to_lowercase().contains(&needle);
        let in_description = file
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&needle));
        if !in_name && !in_description {
            return false;
        }
    }
    let tag_ids = file.tag_ids.as_deref().unwrap_or_default();
    if !query.tag_ids.iter().all(|wanted| tag_ids.contains(wanted)) {
        return false;
    }
    if query.date_from.is_some() || query.date_to.is_some() {
        let Ok(uploaded) = parse_timestamp(&file.uploaded_at) else {
            return false;
        };
        let day = uploaded.date_naive();
        if query.date_from.is_some_and(|from| day < from) || query.date_to.is_some_and(|to| day > to) {
            return false;
        }
    }
    true
}

fn paginate(files: Vec<WireFile>, page: u32, limit: u32) -> WireFileList {
    let total = files.len() as u64;
    let page = page.max(1);
    let skip = (page as usize - 1).saturating_mul(limit as usize);
    let files = files.into_iter().skip(skip).take(limit as usize).collect();
    WireFileList {
        files,
        total,
        page,
        limit,
    }
}

/// In-memory service double. Files are kept newest first.
pub struct MockRepository {
    state: Mutex<MockState>,
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    /// Knows the `demo` / `password` account.
    pub fn with_demo_user() -> Self {
        Self::new().with_user(DEMO_USER, DEMO_PASSWORD)
    }

    pub fn with_user(mut self, user_id: &str, password: &str) -> Self {
        self.state
            .get_mut()
            .users
            .insert(user_id.to_string(), password.to_string());
        self
    }

    /// Every `/api` call answers 401 until someone logs in.
    pub fn require_login(mut self) -> Self {
        self.state.get_mut().require_login = true;
        self
    }

    pub async fn calls(&self, op: Operation) -> usize {
        self.state.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    pub async fn total_calls(&self) -> usize {
        self.state.lock().await.calls.values().sum()
    }

    /// The next call of `op` fails with `err` instead of running.
    pub async fn fail_next(&self, op: Operation, err: ApiError) {
        self.state.lock().await.failures.insert(op, err);
    }

    pub async fn fail_next_with_status(&self, op: Operation, status: u16) {
        self.fail_next(op, ApiError::with_message(status, "injected failure")).await;
    }

    /// Pins the mock clock; `None` goes back to the wall clock.
    pub async fn set_now(&self, now: Option<DateTime<Utc>>) {
        self.state.lock().await.now = now;
    }

    async fn begin(&self, op: Operation) -> Result<MutexGuard<'_, MockState>, ApiError> {
        let mut state = self.state.lock().await;
        *state.calls.entry(op).or_insert(0) += 1;
        debug!("mock {:?}", op);
        if let Some(err) = state.failures.remove(&op) {
            return Err(err);
        }
        if state.require_login && state.session.is_none() && !op.is_public() {
            return Err(ApiError::Unauthorized);
        }
        Ok(state)
    }
}

#[async_trait]
impl FileRepository for MockRepository {
    async fn list_files(&self, query: &FileQuery) -> Result<Page<Document>, ApiError> {
        let state = self.begin(Operation::ListFiles).await?;
        let mut matched: Vec<WireFile> = state
            .files
            .iter()
            .filter(|f| f.deleted_at.is_none() && matches_query(f, query))
            .cloned()
            .collect();
        drop(state);

        let sort_by = query.sort_by.unwrap_or_default();
        matched.sort_by(|a, b| match sort_by {
            SortBy::UploadedAt => a.uploaded_at.cmp(&b.uploaded_at),
            SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortBy::Size => a.size.cmp(&b.size),
        });
        if query.sort_order.unwrap_or_default() == SortOrder::Desc {
            matched.reverse();
        }
        page_from_wire(paginate(matched, query.page, query.limit))
    }

    async fn get_file(&self, id: &str) -> Result<Document, ApiError> {
        let state = self.begin(Operation::GetFile).await?;
        document_from_wire(state.active_file(id)?.clone())
    }

    async fn upload_file(&self, request: UploadRequest) -> Result<Document, ApiError> {
        let mut state = self.begin(Operation::UploadFile).await?;
        if !ALLOWED_TYPES.contains(&request.mime_type.as_str()) {
            return Err(ApiError::with_message(415, "Unsupported file format"));
        }
        if request.data.len() as u64 > MAX_FILE_SIZE_BYTES {
            return Err(ApiError::with_message(413, "File exceeds the 10MB size limit"));
        }
        validate_file_name(&request.file_name).map_err(bad_request)?;
        let description = request.description.filter(|d| !d.is_empty());
        if let Some(description) = &description {
            validate_description(description).map_err(bad_request)?;
        }

        // Uploading → Active happens within this one call.
        FileStatus::Uploading
            .apply(FileEvent::UploadCompleted)
            .map_err(|e| ApiError::with_message(409, &e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        let wire = WireFile {
            id: id.clone(),
            name: request.file_name,
            size: request.data.len() as u64,
            mime_type: request.mime_type,
            description,
            uploaded_at: state.now_string(),
            download_url: format!("/api/files/{}/download", id),
            tag_ids: Some(Vec::new()),
            deleted_at: None,
        };
        state.blobs.insert(id, request.data);
        state.files.insert(0, wire.clone());
        document_from_wire(wire)
    }

    async fn update_file(&self, id: &str, request: &UpdateFileRequest) -> Result<Document, ApiError> {
        let mut state = self.begin(Operation::UpdateFile).await?;
        state.active_file(id)?;
        if let Some(name) = &request.name {
            validate_file_name(name).map_err(bad_request)?;
        }
        if let Some(description) = &request.description {
            validate_description(description).map_err(bad_request)?;
        }
        let tag_ids = match &request.tag_ids {
            Some(requested) => {
                let mut cleaned: Vec<String> = Vec::with_capacity(requested.len());
                for tag_id in requested {
                    if !state.tags.iter().any(|t| &t.id == tag_id) {
                        return Err(bad_request(format!("Unknown tag '{}'", tag_id)));
                    }
                    if !cleaned.contains(tag_id) {
                        cleaned.push(tag_id.clone());
                    }
                }
                Some(cleaned)
            }
            None => None,
        };

        let index = state.file_index(id)?;
        let file = &mut state.files[index];
        if let Some(name) = &request.name {
            file.name = name.trim().to_string();
        }
        if let Some(description) = &request.description {
            file.description = Some(description.clone()).filter(|d| !d.is_empty());
        }
        if let Some(tag_ids) = tag_ids {
            file.tag_ids = Some(tag_ids);
        }
        document_from_wire(file.clone())
    }

    async fn delete_file(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.begin(Operation::DeleteFile).await?;
        let index = state.file_index(id)?;
        let now = state.now();
        let next = transition(&state.files[index], FileEvent::MoveToTrash { at: now })?;
        if let FileStatus::Trashed { deleted_at } = next {
            state.files[index].deleted_at = Some(format_timestamp(&deleted_at));
        }
        Ok(())
    }

    async fn download_file(&self, id: &str) -> Result<DownloadedFile, ApiError> {
        let state = self.begin(Operation::DownloadFile).await?;
        let file = state.active_file(id)?;
        let data = state
            .blobs
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::with_message(404, "File content not found"))?;
        Ok(DownloadedFile {
            file_name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            data,
        })
    }
}

#[async_trait]
impl TrashRepository for MockRepository {
    async fn list_trash(&self, query: &TrashQuery) -> Result<Page<Document>, ApiError> {
        let mut state = self.begin(Operation::ListTrash).await?;
        state.purge_expired();
        let mut trashed: Vec<WireFile> = state
            .files
            .iter()
            .filter(|f| f.deleted_at.is_some())
            .cloned()
            .collect();
        drop(state);
        trashed.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        page_from_wire(paginate(trashed, query.page, query.limit))
    }

    async fn restore_file(&self, id: &str) -> Result<Document, ApiError> {
        let mut state = self.begin(Operation::RestoreFile).await?;
        state.purge_expired();
        let index = state.file_index(id)?;
        transition(&state.files[index], FileEvent::Restore)?;
        let file = &mut state.files[index];
        file.deleted_at = None;
        document_from_wire(file.clone())
    }

    async fn permanently_delete_file(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.begin(Operation::PermanentlyDeleteFile).await?;
        let index = state.file_index(id)?;
        transition(&state.files[index], FileEvent::Purge)?;
        state.files.remove(index);
        state.blobs.remove(id);
        Ok(())
    }
}

#[async_trait]
impl TagRepository for MockRepository {
    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        let state = self.begin(Operation::ListTags).await?;
        tags_from_wire(state.tags.clone())
    }

    async fn create_tag(&self, request: &CreateTagRequest) -> Result<Tag, ApiError> {
        let mut state = self.begin(Operation::CreateTag).await?;
        validate_tag_name(&request.name).map_err(bad_request)?;
        if state.tag_name_taken(&request.name, None) {
            return Err(ApiError::with_message(409, "Tag name already exists"));
        }
        let now = state.now_string();
        let wire = WireTag {
            id: Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            color: request.color.to_string(),
            created_at: now.clone(),
            updated_at: now,
        };
        state.tags.push(wire.clone());
        tag_from_wire(wire)
    }

    async fn update_tag(&self, id: &str, request: &UpdateTagRequest) -> Result<Tag, ApiError> {
        let mut state = self.begin(Operation::UpdateTag).await?;
        let index = state.tag_index(id)?;
        if let Some(name) = &request.name {
            validate_tag_name(name).map_err(bad_request)?;
            if state.tag_name_taken(name, Some(id)) {
                return Err(ApiError::with_message(409, "Tag name already exists"));
            }
        }
        let now = state.now_string();
        let tag = &mut state.tags[index];
        if let Some(name) = &request.name {
            tag.name = name.trim().to_string();
        }
        if let Some(color) = request.color {
            tag.color = color.to_string();
        }
        tag.updated_at = now;
        tag_from_wire(tag.clone())
    }

    async fn delete_tag(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.begin(Operation::DeleteTag).await?;
        let index = state.tag_index(id)?;
        state.tags.remove(index);
        for file in state.files.iter_mut() {
            if let Some(tag_ids) = file.tag_ids.as_mut() {
                tag_ids.retain(|t| t != id);
            }
        }
        for search in state.searches.iter_mut() {
            if let Some(tag_ids) = search.tag_ids.as_mut() {
                tag_ids.retain(|t| t != id);
            }
        }
        Ok(())
    }
}

fn saved_search_fields(input: &SavedSearchInput) -> Result<(), ApiError> {
    if input.condition_name.trim().is_empty() {
        return Err(bad_request("Condition name must not be empty".to_string()));
    }
    if let Some(keyword) = &input.keyword {
        validate_keyword(keyword).map_err(bad_request)?;
    }
    validate_date_range(input.date_from, input.date_to).map_err(bad_request)
}

#[async_trait]
impl SavedSearchRepository for MockRepository {
    async fn list_saved_searches(&self) -> Result<Vec<SavedSearchCondition>, ApiError> {
        let state = self.begin(Operation::ListSavedSearches).await?;
        let user = state.current_user();
        let mine: Vec<WireSavedSearch> = state
            .searches
            .iter()
            .filter(|s| s.user_id == user)
            .cloned()
            .collect();
        drop(state);
        mine.into_iter().map(saved_search_from_wire).collect()
    }

    async fn create_saved_search(&self, input: &SavedSearchInput) -> Result<SavedSearchCondition, ApiError> {
        let mut state = self.begin(Operation::CreateSavedSearch).await?;
        saved_search_fields(input)?;
        let wire = WireSavedSearch {
            id: Uuid::new_v4().to_string(),
            user_id: state.current_user(),
            condition_name: input.condition_name.trim().to_string(),
            keyword: input.keyword.clone(),
            tag_ids: input.tag_ids.clone(),
            date_from: input.date_from.as_ref().map(format_date),
            date_to: input.date_to.as_ref().map(format_date),
        };
        state.searches.push(wire.clone());
        saved_search_from_wire(wire)
    }

    async fn update_saved_search(
        &self,
        id: &str,
        input: &SavedSearchInput,
    ) -> Result<SavedSearchCondition, ApiError> {
        let mut state = self.begin(Operation::UpdateSavedSearch).await?;
        saved_search_fields(input)?;
        let user = state.current_user();
        let search = state
            .searches
            .iter_mut()
            .find(|s| s.id == id && s.user_id == user)
            .ok_or_else(|| ApiError::with_message(404, "Saved search not found"))?;
        search.condition_name = input.condition_name.trim().to_string();
        search.keyword = input.keyword.clone();
        search.tag_ids = input.tag_ids.clone();
        search.date_from = input.date_from.as_ref().map(format_date);
        search.date_to = input.date_to.as_ref().map(format_date);
        saved_search_from_wire(search.clone())
    }

    async fn delete_saved_search(&self, id: &str) -> Result<(), ApiError> {
        let mut state = self.begin(Operation::DeleteSavedSearch).await?;
        let user = state.current_user();
        let before = state.searches.len();
        state.searches.retain(|s| !(s.id == id && s.user_id == user));
        if state.searches.len() == before {
            return Err(ApiError::with_message(404, "Saved search not found"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MockRepository {
    async fn login(&self, request: &LoginRequest) -> Result<SessionUser, ApiError> {
        let mut state = self.begin(Operation::Login).await?;
        let known = state
            .users
            .get(&request.user_id)
            .is_some_and(|password| password == &request.password);
        if !known {
            return Err(ApiError::Unauthorized);
        }
        let session = WireSession {
            user_id: request.user_id.clone(),
            display_name: None,
        };
        state.session = Some(session.clone());
        Ok(session_from_wire(session))
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let mut state = self.begin(Operation::Logout).await?;
        state.session = None;
        Ok(())
    }

    async fn current_session(&self) -> Result<SessionUser, ApiError> {
        let state = self.begin(Operation::CurrentSession).await?;
        state
            .session
            .clone()
            .map(session_from_wire)
            .ok_or(ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TagColor;
    use crate::utils::mime;
    use chrono::{Duration, TimeZone};

    fn pdf(name: &str) -> UploadRequest {
        UploadRequest::new(name, mime::PDF, vec![1u8; 64])
    }

    async fn upload_at(repo: &MockRepository, name: &str, day: u32) -> Document {
        repo.set_now(Some(Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap())).await;
        repo.upload_file(pdf(name)).await.unwrap()
    }

    #[tokio::test]
    async fn upload_then_list_newest_first() {
        let repo = MockRepository::new();
        upload_at(&repo, "first.pdf", 1).await;
        upload_at(&repo, "second.pdf", 2).await;

        let page = repo.list_files(&FileQuery::default()).await.unwrap();
        let names: Vec<_> = page.items.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["second.pdf", "first.pdf"]);
        assert_eq!(page.total, 2);
        assert_eq!(repo.calls(Operation::UploadFile).await, 2);
        assert_eq!(repo.calls(Operation::ListFiles).await, 1);
    }

    #[tokio::test]
    async fn empty_description_is_stored_as_none() {
        let repo = MockRepository::new();
        let doc = repo.upload_file(pdf("a.pdf").with_description("")).await.unwrap();
        assert_eq!(doc.description, None);
        let described = repo
            .update_file(&doc.id, &UpdateFileRequest::describe("Quarterly"))
            .await
            .unwrap();
        assert_eq!(described.description.as_deref(), Some("Quarterly"));
    }

    #[tokio::test]
    async fn service_rejects_what_the_client_should_have_caught() {
        let repo = MockRepository::new();
        let err = repo
            .upload_file(UploadRequest::new("a.txt", "text/plain", vec![0u8; 4]))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(415));
        let big = UploadRequest::new("big.pdf", mime::PDF, vec![0u8; (MAX_FILE_SIZE_BYTES + 1) as usize]);
        assert_eq!(repo.upload_file(big).await.unwrap_err().status(), Some(413));
    }

    #[tokio::test]
    async fn search_tags_and_paging() {
        let repo = MockRepository::new();
        let finance = repo
            .create_tag(&CreateTagRequest { name: "Finance".into(), color: TagColor::Green })
            .await
            .unwrap();
        for day in 1..=5 {
            let doc = upload_at(&repo, &format!("report-{}.pdf", day), day).await;
            if day % 2 == 1 {
                repo.update_file(&doc.id, &UpdateFileRequest::retag(vec![finance.id.clone()]))
                    .await
                    .unwrap();
            }
        }
        upload_at(&repo, "holiday.pdf", 6).await;

        let tagged = repo
            .list_files(&FileQuery { tag_ids: vec![finance.id.clone()], ..FileQuery::default() })
            .await
            .unwrap();
        assert_eq!(tagged.total, 3);

        let searched = repo
            .list_files(&FileQuery { search: Some("REPORT".into()), limit: 2, page: 2, ..FileQuery::default() })
            .await
            .unwrap();
        assert_eq!(searched.total, 5);
        assert_eq!(searched.items.len(), 2);
        assert_eq!(searched.items[0].name, "report-3.pdf");

        let by_name = repo
            .list_files(&FileQuery {
                sort_by: Some(SortBy::Name),
                sort_order: Some(SortOrder::Asc),
                ..FileQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(by_name.items[0].name, "holiday.pdf");

        let dated = repo
            .list_files(&FileQuery {
                date_from: chrono::NaiveDate::from_ymd_opt(2024, 1, 2),
                date_to: chrono::NaiveDate::from_ymd_opt(2024, 1, 3),
                ..FileQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(dated.total, 2);
    }

    #[tokio::test]
    async fn trash_restore_and_purge() {
        let repo = MockRepository::new();
        let doc = upload_at(&repo, "a.pdf", 1).await;

        repo.delete_file(&doc.id).await.unwrap();
        assert_eq!(repo.list_files(&FileQuery::default()).await.unwrap().total, 0);
        let trash = repo.list_trash(&TrashQuery::default()).await.unwrap();
        assert_eq!(trash.items.len(), 1);
        assert!(trash.items[0].status.is_trashed());

        // Deleting twice is a lifecycle conflict.
        assert_eq!(repo.delete_file(&doc.id).await.unwrap_err().status(), Some(409));

        let restored = repo.restore_file(&doc.id).await.unwrap();
        assert_eq!(restored.status, FileStatus::Active);
        assert_eq!(repo.restore_file(&doc.id).await.unwrap_err().status(), Some(409));
        assert_eq!(repo.permanently_delete_file(&doc.id).await.unwrap_err().status(), Some(409));

        repo.delete_file(&doc.id).await.unwrap();
        repo.permanently_delete_file(&doc.id).await.unwrap();
        assert_eq!(repo.list_trash(&TrashQuery::default()).await.unwrap().total, 0);
        assert_eq!(repo.get_file(&doc.id).await.unwrap_err().status(), Some(404));
    }

    #[tokio::test]
    async fn trash_is_purged_after_retention() {
        let repo = MockRepository::new();
        let doc = upload_at(&repo, "old.pdf", 1).await;
        repo.delete_file(&doc.id).await.unwrap();
        let deleted = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();

        repo.set_now(Some(deleted + Duration::days(29))).await;
        assert_eq!(repo.list_trash(&TrashQuery::default()).await.unwrap().total, 1);

        repo.set_now(Some(deleted + Duration::days(30))).await;
        assert_eq!(repo.list_trash(&TrashQuery::default()).await.unwrap().total, 0);
        assert_eq!(repo.restore_file(&doc.id).await.unwrap_err().status(), Some(404));
    }

    #[tokio::test]
    async fn tag_names_are_unique_ignoring_case() {
        let repo = MockRepository::new();
        repo.create_tag(&CreateTagRequest { name: "Invoices".into(), color: TagColor::Red })
            .await
            .unwrap();
        let err = repo
            .create_tag(&CreateTagRequest { name: "invoices".into(), color: TagColor::Blue })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
        let err = repo
            .create_tag(&CreateTagRequest { name: "x".repeat(51), color: TagColor::Blue })
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
    }

    #[tokio::test]
    async fn deleting_a_tag_detaches_it() {
        let repo = MockRepository::new();
        let keep = repo
            .create_tag(&CreateTagRequest { name: "keep".into(), color: TagColor::Gray })
            .await
            .unwrap();
        let gone = repo
            .create_tag(&CreateTagRequest { name: "gone".into(), color: TagColor::Pink })
            .await
            .unwrap();
        let doc = repo.upload_file(pdf("a.pdf")).await.unwrap();
        repo.update_file(&doc.id, &UpdateFileRequest::retag(vec![gone.id.clone(), keep.id.clone()]))
            .await
            .unwrap();

        repo.delete_tag(&gone.id).await.unwrap();
        let doc = repo.get_file(&doc.id).await.unwrap();
        assert_eq!(doc.tag_ids, vec![keep.id.clone()]);
        assert_eq!(repo.list_tags().await.unwrap().len(), 1);
        assert_eq!(repo.delete_tag(&gone.id).await.unwrap_err().status(), Some(404));
    }

    #[tokio::test]
    async fn empty_tag_collection_lists_empty() {
        let repo = MockRepository::new();
        assert!(repo.list_tags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_gate_and_session() {
        let repo = MockRepository::with_demo_user().require_login();
        assert!(repo.current_session().await.unwrap_err().is_session_error());
        assert!(repo.list_tags().await.unwrap_err().is_session_error());

        let bad = LoginRequest { user_id: DEMO_USER.into(), password: "nope".into(), remember_me: false };
        assert!(repo.login(&bad).await.is_err());

        let good = LoginRequest { user_id: DEMO_USER.into(), password: DEMO_PASSWORD.into(), remember_me: true };
        let user = repo.login(&good).await.unwrap();
        assert_eq!(user.user_id, DEMO_USER);
        assert!(repo.list_tags().await.is_ok());

        repo.logout().await.unwrap();
        assert!(repo.list_tags().await.unwrap_err().is_session_error());
    }

    #[tokio::test]
    async fn saved_searches_belong_to_the_user() {
        let repo = MockRepository::with_demo_user();
        let input = SavedSearchInput {
            condition_name: "reports".into(),
            keyword: Some("report".into()),
            ..SavedSearchInput::default()
        };
        let created = repo.create_saved_search(&input).await.unwrap();
        assert_eq!(created.user_id, "anonymous");

        repo.login(&LoginRequest { user_id: DEMO_USER.into(), password: DEMO_PASSWORD.into(), remember_me: false })
            .await
            .unwrap();
        assert!(repo.list_saved_searches().await.unwrap().is_empty());
        let mine = repo.create_saved_search(&input).await.unwrap();
        assert_eq!(mine.user_id, DEMO_USER);

        let renamed = repo
            .update_saved_search(&mine.id, &SavedSearchInput { condition_name: "all reports".into(), ..input.clone() })
            .await
            .unwrap();
        assert_eq!(renamed.condition_name, "all reports");
        repo.delete_saved_search(&mine.id).await.unwrap();
        assert_eq!(repo.delete_saved_search(&mine.id).await.unwrap_err().status(), Some(404));

        let blank = SavedSearchInput { condition_name: " ".into(), ..SavedSearchInput::default() };
        assert_eq!(repo.create_saved_search(&blank).await.unwrap_err().status(), Some(400));
    }

    #[tokio::test]
    async fn injected_failure_hits_once() {
        let repo = MockRepository::new();
        let doc = repo.upload_file(pdf("a.pdf")).await.unwrap();
        repo.fail_next_with_status(Operation::DeleteFile, 500).await;
        assert_eq!(repo.delete_file(&doc.id).await.unwrap_err().status(), Some(500));
        assert_eq!(repo.list_files(&FileQuery::default()).await.unwrap().total, 1);
        repo.delete_file(&doc.id).await.unwrap();
        assert_eq!(repo.calls(Operation::DeleteFile).await, 2);
    }

    #[tokio::test]
    async fn download_returns_stored_bytes() {
        let repo = MockRepository::new();
        let doc = repo
            .upload_file(UploadRequest::new("pic.png", mime::PNG, b"\x89PNG".to_vec()))
            .await
            .unwrap();
        let file = repo.download_file(&doc.id).await.unwrap();
        assert_eq!(file.file_name, "pic.png");
        assert_eq!(file.mime_type, mime::PNG);
        assert_eq!(&file.data[..], b"\x89PNG");
    }
}
