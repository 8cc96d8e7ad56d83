use async_trait::async_trait;
use log::info;
use reqwest::{multipart, Method};

use super::mapping::{
    document_from_wire, page_from_wire, saved_search_from_wire, session_from_wire, tag_from_wire,
    tags_from_wire,
};
use super::{FileRepository, SavedSearchRepository, SessionRepository, TagRepository, TrashRepository};
use crate::api::wire::{
    WireFile, WireFileList, WireSavedSearch, WireSavedSearchList, WireSession, WireTag, WireTagList,
};
use crate::api::ApiClient;
use crate::error::ApiError;
use crate::models::{
    CreateTagRequest, Document, DownloadedFile, FileQuery, LoginRequest, Page,
    SavedSearchCondition, SavedSearchInput, SessionUser, Tag, TrashQuery, UpdateFileRequest,
    UpdateTagRequest, UploadRequest,
};
use crate::utils::mime;

/// The live backend: adapters over the service's REST surface.
pub struct HttpRepository {
    client: ApiClient,
}

impl HttpRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait]
impl FileRepository for HttpRepository {
    async fn list_files(&self, query: &FileQuery) -> Result<Page<Document>, ApiError> {
        let list: WireFileList = self.client.get_json(&["api", "files"], &query.to_query_pairs()).await?;
        page_from_wire(list)
    }

    async fn get_file(&self, id: &str) -> Result<Document, ApiError> {
        let wire: WireFile = self.client.get_json(&["api", "files", id], &[]).await?;
        document_from_wire(wire)
    }

    async fn upload_file(&self, request: UploadRequest) -> Result<Document, ApiError> {
        let length = request.data.len() as u64;
        let part = multipart::Part::stream_with_length(request.data, length)
            .file_name(request.file_name.clone())
            .mime_str(&request.mime_type)?;
        let mut form = multipart::Form::new().part("file", part);
        if let Some(description) = request.description {
            form = form.text("description", description);
        }
        let wire: WireFile = self.client.post_multipart(&["api", "files"], form).await?;
        info!("Uploaded {} as {}", request.file_name, wire.id);
        document_from_wire(wire)
    }

    async fn update_file(&self, id: &str, request: &UpdateFileRequest) -> Result<Document, ApiError> {
        let wire: WireFile = self
            .client
            .send_json(Method::PATCH, &["api", "files", id], request)
            .await?;
        document_from_wire(wire)
    }

    async fn delete_file(&self, id: &str) -> Result<(), ApiError> {
        self.client.call_empty(Method::DELETE, &["api", "files", id]).await
    }

    async fn download_file(&self, id: &str) -> Result<DownloadedFile, ApiError> {
        let response = self.client.get_bytes(&["api", "files", id, "download"]).await?;
        Ok(DownloadedFile {
            file_name: response.file_name.unwrap_or_else(|| id.to_string()),
            mime_type: response
                .content_type
                .unwrap_or_else(|| mime::OCTET_STREAM.to_string()),
            data: response.data,
        })
    }
}

#[async_trait]
impl TrashRepository for HttpRepository {
    async fn list_trash(&self, query: &TrashQuery) -> Result<Page<Document>, ApiError> {
        let list: WireFileList = self.client.get_json(&["api", "trash"], &query.to_query_pairs()).await?;
        page_from_wire(list)
    }

    async fn restore_file(&self, id: &str) -> Result<Document, ApiError> {
        let wire: WireFile = self
            .client
            .call(Method::POST, &["api", "trash", id, "restore"])
            .await?;
        document_from_wire(wire)
    }

    async fn permanently_delete_file(&self, id: &str) -> Result<(), ApiError> {
        self.client.call_empty(Method::DELETE, &["api", "trash", id]).await
    }
}

#[async_trait]
impl TagRepository for HttpRepository {
    async fn list_tags(&self) -> Result<Vec<Tag>, ApiError> {
        let list: WireTagList = self.client.get_json(&["api", "tags"], &[]).await?;
        tags_from_wire(list.tags)
    }

    async fn create_tag(&self, request: &CreateTagRequest) -> Result<Tag, ApiError> {
        let wire: WireTag = self.client.send_json(Method::POST, &["api", "tags"], request).await?;
        tag_from_wire(wire)
    }

    async fn update_tag(&self, id: &str, request: &UpdateTagRequest) -> Result<Tag, ApiError> {
        let wire: WireTag = self
            .client
            .send_json(Method::PUT, &["api", "tags", id], request)
            .await?;
        tag_from_wire(wire)
    }

    async fn delete_tag(&self, id: &str) -> Result<(), ApiError> {
        self.client.call_empty(Method::DELETE, &["api", "tags", id]).await
    }
}

#[async_trait]
impl SavedSearchRepository for HttpRepository {
    async fn list_saved_searches(&self) -> Result<Vec<SavedSearchCondition>, ApiError> {
        let list: WireSavedSearchList = self.client.get_json(&["api", "saved-searches"], &[]).await?;
        list.conditions.into_iter().map(saved_search_from_wire).collect()
    }

    async fn create_saved_search(&self, input: &SavedSearchInput) -> Result<SavedSearchCondition, ApiError> {
        let wire: WireSavedSearch = self
            .client
            .send_json(Method::POST, &["api", "saved-searches"], input)
            .await?;
        saved_search_from_wire(wire)
    }

    async fn update_saved_search(
        &self,
        id: &str,
        input: &SavedSearchInput,
    ) -> Result<SavedSearchCondition, ApiError> {
        let wire: WireSavedSearch = self
            .client
            .send_json(Method::PUT, &["api", "saved-searches", id], input)
            .await?;
        saved_search_from_wire(wire)
    }

    async fn delete_saved_search(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .call_empty(Method::DELETE, &["api", "saved-searches", id])
            .await
    }
}

#[async_trait]
impl SessionRepository for HttpRepository {
    async fn login(&self, request: &LoginRequest) -> Result<SessionUser, ApiError> {
        let (wire, cookie): (WireSession, _) = self
            .client
            .post_form(&["auth", "login"], &request.form_fields())
            .await?;
        if cookie.is_some() {
            self.client.set_session_cookie(cookie).await;
        }
        info!("Logged in as {}", wire.user_id);
        Ok(session_from_wire(wire))
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let result = self.client.call_empty(Method::POST, &["auth", "logout"]).await;
        // Cleared even when the call fails.
        self.client.set_session_cookie(None).await;
        result
    }

    async fn current_session(&self) -> Result<SessionUser, ApiError> {
        let wire: WireSession = self.client.get_json(&["auth", "session"], &[]).await?;
        Ok(session_from_wire(wire))
    }

    async fn session_token(&self) -> Option<String> {
        self.client.session_cookie().await
    }

    async fn restore_session_token(&self, token: Option<String>) {
        self.client.set_session_cookie(token).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stub::{Reply, Server};
    use std::time::Duration;

    const WIRE_FILE: &str = r#"{"id":"f1","name":"report.pdf","size":8,"mimeType":"application/pdf","description":"Quarterly","uploadedAt":"2024-01-15T10:30:00.000Z","downloadUrl":"/api/files/f1/download"}"#;

    fn repo(server: &Server) -> HttpRepository {
        HttpRepository::new(ApiClient::new(&server.base_url(), Duration::from_secs(5)).unwrap())
    }

    #[tokio::test]
    async fn upload_sends_file_and_description_parts() {
        let server = Server::start(vec![Reply::json(201, WIRE_FILE)]).await;
        let repo = repo(&server);
        let request = UploadRequest::new("report.pdf", mime::PDF, b"%PDF-1.7".to_vec()).with_description("Quarterly");

        let document = repo.upload_file(request).await.unwrap();
        assert_eq!(document.id, "f1");
        assert_eq!(document.description.as_deref(), Some("Quarterly"));

        let sent = server.next_request().await;
        assert_eq!(sent.request_line(), "POST /api/files HTTP/1.1");
        let content_type = sent.header("content-type").unwrap_or_default();
        assert!(content_type.starts_with("multipart/form-data; boundary="), "{}", content_type);
        let body = sent.body_text();
        assert!(body.contains(r#"name="file"; filename="report.pdf""#), "{}", body);
        assert!(body.to_ascii_lowercase().contains("content-type: application/pdf"), "{}", body);
        assert!(body.contains("%PDF-1.7"));
        assert!(body.contains("name=\"description\"\r\n\r\nQuarterly"), "{}", body);
        assert_eq!(sent.header("content-length"), Some(sent.body().len().to_string()));
    }

    #[tokio::test]
    async fn login_sends_the_form_and_replays_the_cookie() {
        let server = Server::start(vec![
            Reply::json(200, r#"{"userId":"demo","displayName":"Demo User"}"#)
                .with_header("Set-Cookie", "connect.sid=s%3Aabc; Path=/; HttpOnly"),
            Reply::json(200, r#"{"userId":"demo","displayName":"Demo User"}"#),
            Reply::json(500, r#"{"message":"logout failed"}"#),
        ])
        .await;
        let repo = repo(&server);

        let user = repo
            .login(&LoginRequest {
                user_id: "demo".into(),
                password: "password".into(),
                remember_me: true,
            })
            .await
            .unwrap();
        assert_eq!(user.display_name.as_deref(), Some("Demo User"));
        assert_eq!(repo.session_token().await.as_deref(), Some("connect.sid=s%3Aabc"));
        let login = server.next_request().await;
        assert_eq!(login.request_line(), "POST /auth/login HTTP/1.1");
        assert_eq!(login.body_text(), "userId=demo&password=password&rememberMe=true");

        repo.current_session().await.unwrap();
        let session = server.next_request().await;
        assert_eq!(session.header("cookie").as_deref(), Some("connect.sid=s%3Aabc"));

        let err = repo.logout().await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(repo.session_token().await, None);
        assert_eq!(server.next_request().await.request_line(), "POST /auth/logout HTTP/1.1");
    }

    #[tokio::test]
    async fn failed_delete_surfaces_the_status() {
        let server = Server::start(vec![Reply::json(500, r#"{"message":"boom"}"#)]).await;
        let repo = repo(&server);
        let err = repo.delete_file("f1").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Status {
                status: 500,
                body: Some(serde_json::json!({ "message": "boom" })),
            }
        );
        assert_eq!(server.next_request().await.request_line(), "DELETE /api/files/f1 HTTP/1.1");
    }

    #[tokio::test]
    async fn ids_cannot_reach_other_endpoints() {
        let server = Server::start(vec![Reply::empty(204)]).await;
        let repo = repo(&server);

        let err = repo.delete_file("..").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)), "{:?}", err);

        repo.delete_file("../tags/t1").await.unwrap();
        assert_eq!(
            server.next_request().await.request_line(),
            "DELETE /api/files/..%2Ftags%2Ft1 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn list_filters_travel_as_query_parameters() {
        let server = Server::start(vec![Reply::json(
            200,
            &format!(r#"{{"files":[{}],"total":1,"page":2,"limit":20}}"#, WIRE_FILE),
        )])
        .await;
        let repo = repo(&server);
        let query = FileQuery {
            search: Some("q1 report".into()),
            tag_ids: vec!["t1".into(), "t2".into()],
            page: 2,
            limit: 20,
            ..FileQuery::default()
        };
        let page = repo.list_files(&query).await.unwrap();
        assert_eq!((page.total, page.page, page.items.len()), (1, 2, 1));
        assert_eq!(
            server.next_request().await.request_line(),
            "GET /api/files?search=q1+report&tagIds=t1&tagIds=t2&page=2&limit=20 HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn download_keeps_the_served_name_and_type() {
        let server = Server::start(vec![Reply::bytes(200, "application/pdf", b"%PDF-1.7")
            .with_header("Content-Disposition", "attachment; filename=\"report.pdf\"")])
        .await;
        let repo = repo(&server);
        let file = repo.download_file("f1").await.unwrap();
        assert_eq!(file.file_name, "report.pdf");
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(&file.data[..], b"%PDF-1.7");
        assert_eq!(
            server.next_request().await.request_line(),
            "GET /api/files/f1/download HTTP/1.1"
        );
    }
}
