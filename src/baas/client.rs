//! HTTP implementation of the backend traits.
//!
//! Thin `reqwest` wrapper over the backend REST API. Server calls carry the
//! project id and API key; calls on behalf of a user carry the session secret
//! instead. Response parsing and URL building are pure functions for
//! testability.

use std::time::Duration;

use reqwest::header::{CONTENT_RANGE, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use super::types::{
    Account, BaasError, DocumentList, FileList, FileUpload, Preferences, PreviewOptions, RawDocument, Session,
    StoredFile,
};
use super::{Accounts, Databases, Query, Storage};
use crate::config::BackendConfig;

const PROJECT_HEADER: &str = "X-Appwrite-Project";
const KEY_HEADER: &str = "X-Appwrite-Key";
const SESSION_HEADER: &str = "X-Appwrite-Session";
const UPLOAD_ID_HEADER: &str = "x-appwrite-id";

/// Uploads larger than this are sent as sequential `Content-Range` chunks.
pub const UPLOAD_CHUNK_SIZE: usize = 5 * 1024 * 1024;

// =============================================================================
// CLIENT
// =============================================================================

pub struct BaasClient {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    api_key: String,
    database_id: String,
    bucket_id: String,
}

/// Who a request is made as.
#[derive(Clone, Copy)]
enum Caller<'a> {
    Server,
    User(&'a str),
}

impl BaasClient {
    /// Build a client from backend config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &BackendConfig) -> Result<Self, BaasError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| BaasError::HttpClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
            database_id: config.database_id.clone(),
            bucket_id: config.bucket_id.clone(),
        })
    }

    fn request(&self, method: Method, path: &str, caller: Caller<'_>) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{path}", self.endpoint))
            .header(PROJECT_HEADER, &self.project_id);
        match caller {
            Caller::Server => builder.header(KEY_HEADER, &self.api_key),
            Caller::User(session) => builder.header(SESSION_HEADER, session),
        }
    }

    fn documents_path(&self, collection: &str) -> String {
        format!(
            "/databases/{}/collections/{}/documents",
            urlencoding::encode(&self.database_id),
            urlencoding::encode(collection)
        )
    }

    fn files_path(&self) -> String {
        format!("/storage/buckets/{}/files", urlencoding::encode(&self.bucket_id))
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, BaasError> {
        let text = Self::send_raw(builder).await?;
        parse_body(&text)
    }

    async fn send_empty(builder: RequestBuilder) -> Result<(), BaasError> {
        Self::send_raw(builder).await.map(|_| ())
    }

    async fn send_raw(builder: RequestBuilder) -> Result<String, BaasError> {
        let response = builder
            .send()
            .await
            .map_err(|e| BaasError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| BaasError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(BaasError::from_response(status, &text));
        }
        Ok(text)
    }
}

// =============================================================================
// ACCOUNTS
// =============================================================================

#[async_trait::async_trait]
impl Accounts for BaasClient {
    async fn create_account(
        &self,
        user_id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Account, BaasError> {
        let body = json!({ "userId": user_id, "email": email, "password": password, "name": name });
        Self::send(self.request(Method::POST, "/account", Caller::Server).json(&body)).await
    }

    async fn create_email_session(&self, email: &str, password: &str) -> Result<Session, BaasError> {
        let body = json!({ "email": email, "password": password });
        Self::send(
            self.request(Method::POST, "/account/sessions/email", Caller::Server)
                .json(&body),
        )
        .await
    }

    async fn create_token_session(&self, user_id: &str, secret: &str) -> Result<Session, BaasError> {
        let body = json!({ "userId": user_id, "secret": secret });
        Self::send(
            self.request(Method::POST, "/account/sessions/token", Caller::Server)
                .json(&body),
        )
        .await
    }

    async fn get_account(&self, session: &str) -> Result<Account, BaasError> {
        Self::send(self.request(Method::GET, "/account", Caller::User(session))).await
    }

    async fn delete_session(&self, session: &str, session_id: &str) -> Result<(), BaasError> {
        let path = format!("/account/sessions/{}", urlencoding::encode(session_id));
        Self::send_empty(self.request(Method::DELETE, &path, Caller::User(session))).await
    }

    async fn get_prefs(&self, session: &str) -> Result<Preferences, BaasError> {
        Self::send(self.request(Method::GET, "/account/prefs", Caller::User(session))).await
    }

    async fn update_prefs(&self, session: &str, prefs: &Preferences) -> Result<Preferences, BaasError> {
        let body = json!({ "prefs": prefs });
        let account: Account = Self::send(
            self.request(Method::PATCH, "/account/prefs", Caller::User(session))
                .json(&body),
        )
        .await?;
        Ok(account.prefs)
    }

    fn oauth2_url(&self, provider: &str, success: &str, failure: &str) -> String {
        oauth2_url(&self.endpoint, &self.project_id, provider, success, failure)
    }
}

// =============================================================================
// DATABASES
// =============================================================================

#[async_trait::async_trait]
impl Databases for BaasClient {
    async fn create_document(
        &self,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> Result<RawDocument, BaasError> {
        let body = json!({ "documentId": document_id, "data": data });
        Self::send(
            self.request(Method::POST, &self.documents_path(collection), Caller::Server)
                .json(&body),
        )
        .await
    }

    async fn get_document(&self, collection: &str, document_id: &str) -> Result<RawDocument, BaasError> {
        let path = format!("{}/{}", self.documents_path(collection), urlencoding::encode(document_id));
        Self::send(self.request(Method::GET, &path, Caller::Server)).await
    }

    async fn update_document(
        &self,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> Result<RawDocument, BaasError> {
        let path = format!("{}/{}", self.documents_path(collection), urlencoding::encode(document_id));
        let body = json!({ "data": data });
        Self::send(self.request(Method::PATCH, &path, Caller::Server).json(&body)).await
    }

    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<(), BaasError> {
        let path = format!("{}/{}", self.documents_path(collection), urlencoding::encode(document_id));
        Self::send_empty(self.request(Method::DELETE, &path, Caller::Server)).await
    }

    async fn list_documents(
        &self,
        collection: &str,
        queries: &[Query],
    ) -> Result<DocumentList<Map<String, Value>>, BaasError> {
        Self::send(
            self.request(Method::GET, &self.documents_path(collection), Caller::Server)
                .query(&query_params(queries)),
        )
        .await
    }
}

// =============================================================================
// STORAGE
// =============================================================================

#[async_trait::async_trait]
impl Storage for BaasClient {
    async fn create_file(
        &self,
        file_id: &str,
        file: FileUpload,
        permissions: &[String],
    ) -> Result<StoredFile, BaasError> {
        let total = file.bytes.len();
        let path = self.files_path();
        let mut stored = None;

        for (start, end) in chunk_ranges(total, UPLOAD_CHUNK_SIZE) {
            let chunk = file.bytes.get(start..end).unwrap_or_default().to_vec();
            let part = Part::bytes(chunk)
                .file_name(file.name.clone())
                .mime_str(&file.content_type)
                .map_err(|e| BaasError::Request(e.to_string()))?;
            let form = permissions
                .iter()
                .fold(Form::new().text("fileId", file_id.to_owned()), |form, p| {
                    form.text("permissions[]", p.clone())
                })
                .part("file", part);

            let mut builder = self
                .request(Method::POST, &path, Caller::Server)
                .multipart(form);
            if total > UPLOAD_CHUNK_SIZE {
                let range = format!("bytes {start}-{}/{total}", end.saturating_sub(1));
                let value = HeaderValue::from_str(&range).map_err(|e| BaasError::Request(e.to_string()))?;
                builder = builder.header(CONTENT_RANGE, value);
                if start > 0 {
                    builder = builder.header(UPLOAD_ID_HEADER, file_id);
                }
            }

            tracing::debug!(file_id, start, end, total, "uploading file chunk");
            stored = Some(Self::send::<StoredFile>(builder).await?);
        }

        stored.ok_or_else(|| BaasError::Request("empty upload".into()))
    }

    async fn get_file(&self, file_id: &str) -> Result<StoredFile, BaasError> {
        let path = format!("{}/{}", self.files_path(), urlencoding::encode(file_id));
        Self::send(self.request(Method::GET, &path, Caller::Server)).await
    }

    async fn list_files(&self, queries: &[Query]) -> Result<FileList, BaasError> {
        Self::send(
            self.request(Method::GET, &self.files_path(), Caller::Server)
                .query(&query_params(queries)),
        )
        .await
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), BaasError> {
        let path = format!("{}/{}", self.files_path(), urlencoding::encode(file_id));
        Self::send_empty(self.request(Method::DELETE, &path, Caller::Server)).await
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, BaasError> {
        let path = format!("{}/{}/download", self.files_path(), urlencoding::encode(file_id));
        let response = self
            .request(Method::GET, &path, Caller::Server)
            .send()
            .await
            .map_err(|e| BaasError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let text = response.text().await.unwrap_or_default();
            return Err(BaasError::from_response(status, &text));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BaasError::Request(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn preview_url(&self, file_id: &str, options: PreviewOptions) -> String {
        preview_url(&self.endpoint, &self.project_id, &self.bucket_id, file_id, options)
    }

    fn view_url(&self, file_id: &str) -> String {
        format!(
            "{}/storage/buckets/{}/files/{}/view?project={}",
            self.endpoint,
            urlencoding::encode(&self.bucket_id),
            urlencoding::encode(file_id),
            urlencoding::encode(&self.project_id)
        )
    }
}

// =============================================================================
// PURE HELPERS
// =============================================================================

fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T, BaasError> {
    serde_json::from_str(text).map_err(|e| BaasError::Parse(e.to_string()))
}

fn query_params(queries: &[Query]) -> Vec<(&'static str, String)> {
    queries.iter().map(|q| ("queries[]", q.to_param())).collect()
}

/// Half-open byte ranges covering `total` bytes in `chunk`-sized pieces.
/// An empty payload still yields one (empty) range so the request is sent.
fn chunk_ranges(total: usize, chunk: usize) -> Vec<(usize, usize)> {
    if total == 0 || chunk == 0 {
        return vec![(0, total)];
    }
    (0..total)
        .step_by(chunk)
        .map(|start| (start, (start + chunk).min(total)))
        .collect()
}

fn oauth2_url(endpoint: &str, project_id: &str, provider: &str, success: &str, failure: &str) -> String {
    format!(
        "{endpoint}/account/tokens/oauth2/{}?project={}&success={}&failure={}",
        urlencoding::encode(provider),
        urlencoding::encode(project_id),
        urlencoding::encode(success),
        urlencoding::encode(failure)
    )
}

fn preview_url(endpoint: &str, project_id: &str, bucket_id: &str, file_id: &str, options: PreviewOptions) -> String {
    let mut url = format!(
        "{endpoint}/storage/buckets/{}/files/{}/preview?width={}&height={}&quality={}",
        urlencoding::encode(bucket_id),
        urlencoding::encode(file_id),
        options.width,
        options.height,
        options.quality
    );
    if options.crop {
        url.push_str("&gravity=");
        url.push_str(options.gravity.as_str());
    }
    url.push_str("&project=");
    url.push_str(&urlencoding::encode(project_id));
    url
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
