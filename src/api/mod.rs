use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};
use reqwest::{header, multipart, Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::ApiError;

#[cfg(test)]
pub(crate) mod stub;
pub mod wire;

/// Thin JSON-over-HTTP transport for the document service.
///
/// Holds the session cookie handed out by the login endpoint and replays it
/// on every request. Every non-2xx response becomes an [`ApiError`]; nothing
/// here retries or caches.
///
/// Paths are given as segments and each one is percent-encoded on its own,
/// so an id can never reach another endpoint.
pub struct ApiClient {
    http: Client,
    base: Url,
    base_url: String,
    session_cookie: RwLock<Option<String>>,
}

/// Raw body of a download plus the headers describing it.
pub struct BinaryResponse {
    pub data: Bytes,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let base = Url::parse(&base_url)
            .map_err(|e| ApiError::InvalidRequest(format!("invalid base url {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidRequest(format!("{} cannot be a base url", base_url)));
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base,
            base_url,
            session_cookie: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn session_cookie(&self) -> Option<String> {
        self.session_cookie.read().await.clone()
    }

    pub async fn set_session_cookie(&self, cookie: Option<String>) {
        *self.session_cookie.write().await = cookie;
    }

    /// Appends `segments` to the base path. Empty and dot segments are refused.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidRequest(format!("{} cannot be a base url", self.base_url)))?;
            path.pop_if_empty();
            for segment in segments {
                if matches!(*segment, "" | "." | "..") {
                    return Err(ApiError::InvalidRequest(format!("invalid path segment '{}'", segment)));
                }
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn request(&self, method: Method, path: &[&str]) -> Result<RequestBuilder, ApiError> {
        let mut builder = self.http.request(method, self.url(path)?);
        if let Some(cookie) = self.session_cookie.read().await.as_deref() {
            builder = builder.header(header::COOKIE, cookie);
        }
        Ok(builder)
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let request = builder.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();
        metrics::counter!("docs_api_requests_total").increment(1);
        debug!("{} {}", method, path);

        let response = self.http.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.json::<Value>().await.ok();
        warn!("{} {} returned {}", method, path, status);
        Err(ApiError::from_status(status.as_u16(), body))
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &[&str],
        query: &[(String, String)],
    ) -> Result<T, ApiError> {
        let builder = self.request(Method::GET, path).await?.query(query);
        let response = self.execute(builder).await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &[&str],
        body: &B,
    ) -> Result<T, ApiError> {
        let builder = self.request(method, path).await?.json(body);
        let response = self.execute(builder).await?;
        Ok(response.json::<T>().await?)
    }

    /// Bodiless request whose JSON response is decoded.
    pub async fn call<T: DeserializeOwned>(&self, method: Method, path: &[&str]) -> Result<T, ApiError> {
        let builder = self.request(method, path).await?;
        let response = self.execute(builder).await?;
        Ok(response.json::<T>().await?)
    }

    /// Bodiless request whose response body is ignored.
    pub async fn call_empty(&self, method: Method, path: &[&str]) -> Result<(), ApiError> {
        let builder = self.request(method, path).await?;
        self.execute(builder).await?;
        Ok(())
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &[&str],
        form: multipart::Form,
    ) -> Result<T, ApiError> {
        let builder = self.request(Method::POST, path).await?.multipart(form);
        let response = self.execute(builder).await?;
        Ok(response.json::<T>().await?)
    }

    /// URL-encoded form post. Returns the decoded body and the `name=value`
    /// part of a `Set-Cookie` header when the server sent one.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        path: &[&str],
        fields: &[(&str, String)],
    ) -> Result<(T, Option<String>), ApiError> {
        let builder = self.request(Method::POST, path).await?.form(fields);
        let response = self.execute(builder).await?;
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|raw| raw.split(';').next())
            .map(|pair| pair.trim().to_string())
            .filter(|pair| !pair.is_empty());
        let body = response.json::<T>().await?;
        Ok((body, cookie))
    }

    pub async fn get_bytes(&self, path: &[&str]) -> Result<BinaryResponse, ApiError> {
        let builder = self.request(Method::GET, path).await?;
        let response = self.execute(builder).await?;
        let headers = response.headers();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let file_name = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_file_name);
        let data = response.bytes().await?;
        Ok(BinaryResponse {
            data,
            content_type,
            file_name,
        })
    }
}

fn disposition_file_name(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
