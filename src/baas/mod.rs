//! Backend-as-a-service client.
//!
//! DESIGN
//! ======
//! The backend owns every durable entity: accounts, sessions, preferences,
//! documents, and stored files. This module exposes it through three
//! object-safe traits so services depend on `Arc<dyn Backend>` instead of a
//! global client, and tests substitute [`memory::MemoryBackend`].
//!
//! Calls made on behalf of a signed-in user take the session secret
//! explicitly; everything else runs with the server API key.

pub mod client;
pub mod collection;
pub mod query;
pub mod types;

#[cfg(test)]
pub mod memory;

use serde_json::{Map, Value};

pub use client::BaasClient;
pub use collection::Collection;
pub use query::{Page, Query};
pub use types::{
    Account, BaasError, Document, DocumentList, FileList, FileUpload, Preferences, PreviewOptions, RawDocument,
    Session, StoredFile, owner_permissions,
};

/// Session id accepted by the backend for "the session making this call".
pub const CURRENT_SESSION: &str = "current";

/// Generate a backend-compatible unique id (≤ 36 chars, alphanumeric).
#[must_use]
pub fn unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// =============================================================================
// TRAITS
// =============================================================================

/// Account, session, and preference operations.
#[async_trait::async_trait]
pub trait Accounts: Send + Sync {
    async fn create_account(&self, user_id: &str, email: &str, password: &str, name: &str)
    -> Result<Account, BaasError>;

    /// Create an email/password session. The returned session carries its secret.
    async fn create_email_session(&self, email: &str, password: &str) -> Result<Session, BaasError>;

    /// Exchange an OAuth token (`userId` + `secret` from the success redirect)
    /// for a session.
    async fn create_token_session(&self, user_id: &str, secret: &str) -> Result<Session, BaasError>;

    /// Session introspection: resolve the account that owns `session`.
    async fn get_account(&self, session: &str) -> Result<Account, BaasError>;

    async fn delete_session(&self, session: &str, session_id: &str) -> Result<(), BaasError>;

    async fn get_prefs(&self, session: &str) -> Result<Preferences, BaasError>;

    /// Replace the preference blob.
    async fn update_prefs(&self, session: &str, prefs: &Preferences) -> Result<Preferences, BaasError>;

    /// URL the browser is sent to in order to start an OAuth2 login.
    fn oauth2_url(&self, provider: &str, success: &str, failure: &str) -> String;
}

/// Document operations on a named collection of the configured database.
#[async_trait::async_trait]
pub trait Databases: Send + Sync {
    async fn create_document(
        &self,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> Result<RawDocument, BaasError>;

    async fn get_document(&self, collection: &str, document_id: &str) -> Result<RawDocument, BaasError>;

    /// Partial update: only keys present in `data` change.
    async fn update_document(
        &self,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> Result<RawDocument, BaasError>;

    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<(), BaasError>;

    async fn list_documents(
        &self,
        collection: &str,
        queries: &[Query],
    ) -> Result<DocumentList<Map<String, Value>>, BaasError>;
}

/// File operations on the configured bucket.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Store `file` with the given permission strings (see
    /// [`types::owner_permissions`]).
    async fn create_file(&self, file_id: &str, file: FileUpload, permissions: &[String])
    -> Result<StoredFile, BaasError>;

    async fn get_file(&self, file_id: &str) -> Result<StoredFile, BaasError>;

    async fn list_files(&self, queries: &[Query]) -> Result<FileList, BaasError>;

    async fn delete_file(&self, file_id: &str) -> Result<(), BaasError>;

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, BaasError>;

    /// Public preview URL with size/crop/quality parameters embedded.
    fn preview_url(&self, file_id: &str, options: PreviewOptions) -> String;

    /// Public URL for the original file.
    fn view_url(&self, file_id: &str) -> String;
}

/// The full backend surface used by services.
pub trait Backend: Accounts + Databases + Storage {}

impl<T: Accounts + Databases + Storage> Backend for T {}
