//! In-memory backend for tests.
//!
//! Implements accounts, sessions, preferences, documents (with query
//! evaluation), and files. Collections and files can be switched into a
//! failing mode to exercise best-effort paths, and every trait call is
//! counted so tests can assert that validation rejected input before any
//! backend traffic.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Map, Value};

use super::types::{FileList, FileUpload, PreviewOptions, StoredFile};
use super::{
    Account, Accounts, BaasError, Databases, DocumentList, Preferences, Query, RawDocument, Session, Storage, unique_id,
};

struct StoredAccount {
    account: Account,
    password: String,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, StoredAccount>,
    /// session secret -> session
    sessions: HashMap<String, Session>,
    /// (user id, token secret) -> provider access token
    oauth_tokens: HashMap<(String, String), String>,
    collections: HashMap<String, Vec<RawDocument>>,
    files: HashMap<String, (StoredFile, Vec<u8>)>,
    failing_collections: HashSet<String>,
    failing_updates: HashSet<String>,
    failing_files: HashSet<String>,
    failing_prefs: bool,
    seq: u64,
}

impl Inner {
    fn next_timestamp(&mut self) -> String {
        self.seq += 1;
        format!("2024-01-01T00:00:00.{:06}+00:00", self.seq)
    }

    fn check_collection(&self, collection: &str) -> Result<(), BaasError> {
        if self.failing_collections.contains(collection) {
            return Err(BaasError::Request(format!("injected failure for {collection}")));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    calls: AtomicUsize,
    downloads_in_flight: AtomicUsize,
    max_downloads_in_flight: AtomicUsize,
}

fn api_error(status: u16, kind: &str, message: &str) -> BaasError {
    BaasError::Api { status, kind: kind.to_owned(), message: message.to_owned() }
}

fn unauthorized() -> BaasError {
    api_error(401, "user_unauthorized", "The current user is not authorized to perform the requested action.")
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.lock().unwrap()
    }

    /// Highest number of `download_file` calls that were running at once.
    pub fn max_concurrent_downloads(&self) -> usize {
        self.max_downloads_in_flight.load(Ordering::SeqCst)
    }

    /// Number of trait calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    // -------------------------------------------------------------------------
    // seeding and inspection (not counted as calls)
    // -------------------------------------------------------------------------

    /// Create an account and an email session for it; returns the session secret.
    pub fn seed_user(&self, user_id: &str, name: &str, email: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        let created_at = inner.next_timestamp();
        inner.accounts.insert(
            user_id.to_owned(),
            StoredAccount {
                account: Account {
                    id: user_id.to_owned(),
                    name: name.to_owned(),
                    email: email.to_owned(),
                    email_verification: false,
                    created_at,
                    prefs: Preferences::default(),
                },
                password: "password123".into(),
            },
        );
        let secret = format!("secret-{}", unique_id());
        inner.sessions.insert(
            secret.clone(),
            Session {
                id: unique_id(),
                user_id: user_id.to_owned(),
                provider: "email".into(),
                secret: secret.clone(),
                expire: "2030-01-01T00:00:00.000+00:00".into(),
                provider_access_token: String::new(),
                current: true,
            },
        );
        secret
    }

    /// Register a pending OAuth token for an existing user.
    pub fn issue_oauth_token(&self, user_id: &str, provider_access_token: &str) -> String {
        let secret = format!("oauth-{}", unique_id());
        self.inner
            .lock()
            .unwrap()
            .oauth_tokens
            .insert((user_id.to_owned(), secret.clone()), provider_access_token.to_owned());
        secret
    }

    pub fn insert_document(&self, collection: &str, data: Value) -> String {
        let mut inner = self.inner.lock().unwrap();
        let id = unique_id();
        let created_at = inner.next_timestamp();
        let Value::Object(data) = data else {
            panic!("document body must be an object");
        };
        inner
            .collections
            .entry(collection.to_owned())
            .or_default()
            .push(RawDocument {
                id: id.clone(),
                collection_id: collection.to_owned(),
                database_id: "test".into(),
                created_at: created_at.clone(),
                updated_at: created_at,
                data,
            });
        id
    }

    pub fn insert_file(&self, file_id: &str, name: &str, mime_type: &str, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        let created_at = inner.next_timestamp();
        inner.files.insert(
            file_id.to_owned(),
            (
                StoredFile {
                    id: file_id.to_owned(),
                    bucket_id: "test".into(),
                    name: name.to_owned(),
                    mime_type: mime_type.to_owned(),
                    size_original: bytes.len() as u64,
                    created_at,
                    permissions: Vec::new(),
                },
                bytes.to_vec(),
            ),
        );
    }

    /// Record `user_id` as the uploader of an inserted file.
    pub fn set_file_owner(&self, file_id: &str, user_id: &str) {
        if let Some((meta, _)) = self.inner.lock().unwrap().files.get_mut(file_id) {
            meta.permissions = super::owner_permissions(user_id);
        }
    }

    pub fn documents(&self, collection: &str) -> Vec<RawDocument> {
        self.inner
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<RawDocument> {
        self.documents(collection).into_iter().find(|d| d.id == id)
    }

    pub fn has_file(&self, file_id: &str) -> bool {
        self.inner.lock().unwrap().files.contains_key(file_id)
    }

    pub fn file_count(&self) -> usize {
        self.inner.lock().unwrap().files.len()
    }

    pub fn file_meta(&self, file_id: &str) -> Option<StoredFile> {
        self.inner
            .lock()
            .unwrap()
            .files
            .get(file_id)
            .map(|(meta, _)| meta.clone())
    }

    pub fn has_session(&self, secret: &str) -> bool {
        self.inner.lock().unwrap().sessions.contains_key(secret)
    }

    pub fn prefs_of(&self, user_id: &str) -> Preferences {
        self.inner
            .lock()
            .unwrap()
            .accounts
            .get(user_id)
            .map(|a| a.account.prefs.clone())
            .unwrap_or_default()
    }

    pub fn fail_collection(&self, collection: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_collections
            .insert(collection.to_owned());
    }

    /// Fail only `update_document` calls on `collection`.
    pub fn fail_updates(&self, collection: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_updates
            .insert(collection.to_owned());
    }

    /// Fail every preference read and write.
    pub fn fail_prefs(&self) {
        self.inner.lock().unwrap().failing_prefs = true;
    }

    pub fn fail_file(&self, file_id: &str) {
        self.inner
            .lock()
            .unwrap()
            .failing_files
            .insert(file_id.to_owned());
    }
}

// =============================================================================
// QUERY EVALUATION
// =============================================================================

fn attribute(doc: &RawDocument, name: &str) -> Option<Value> {
    match name {
        "$id" => Some(Value::String(doc.id.clone())),
        "$createdAt" => Some(Value::String(doc.created_at.clone())),
        "$updatedAt" => Some(Value::String(doc.updated_at.clone())),
        other => doc.data.get(other).cloned(),
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .unwrap_or(0.0)
            .total_cmp(&y.as_f64().unwrap_or(0.0)),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        _ => std::cmp::Ordering::Equal,
    }
}

fn matches_filter(doc: &RawDocument, query: &Query) -> bool {
    match query {
        Query::Equal { attribute: attr, values } => attribute(doc, attr).is_some_and(|v| values.contains(&v)),
        Query::Search { attribute: attr, values } => {
            let Some(Value::String(haystack)) = attribute(doc, attr) else {
                return false;
            };
            let haystack = haystack.to_lowercase();
            values
                .iter()
                .filter_map(Value::as_str)
                .any(|needle| haystack.contains(&needle.to_lowercase()))
        }
        _ => true,
    }
}

fn apply_queries(docs: &[RawDocument], queries: &[Query]) -> (u64, Vec<RawDocument>) {
    let mut selected: Vec<RawDocument> = docs
        .iter()
        .filter(|d| queries.iter().all(|q| matches_filter(d, q)))
        .cloned()
        .collect();
    let total = selected.len() as u64;

    for query in queries.iter().rev() {
        match query {
            Query::OrderAsc { attribute: attr } => {
                selected.sort_by(|a, b| compare(attribute(a, attr).as_ref(), attribute(b, attr).as_ref()));
            }
            Query::OrderDesc { attribute: attr } => {
                selected.sort_by(|a, b| compare(attribute(b, attr).as_ref(), attribute(a, attr).as_ref()));
            }
            _ => {}
        }
    }

    let offset = queries
        .iter()
        .find_map(|q| match q {
            Query::Offset { values: [n] } => Some(*n),
            _ => None,
        })
        .unwrap_or(0);
    let limit = queries
        .iter()
        .find_map(|q| match q {
            Query::Limit { values: [n] } => Some(*n),
            _ => None,
        })
        .unwrap_or(25);

    let page = selected
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect();
    (total, page)
}

// =============================================================================
// TRAIT IMPLS
// =============================================================================

#[async_trait::async_trait]
impl Accounts for MemoryBackend {
    async fn create_account(
        &self,
        user_id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Account, BaasError> {
        let mut inner = self.lock();
        if inner.accounts.values().any(|a| a.account.email == email) {
            return Err(api_error(409, "user_already_exists", "A user with the same email already exists."));
        }
        let created_at = inner.next_timestamp();
        let account = Account {
            id: user_id.to_owned(),
            name: name.to_owned(),
            email: email.to_owned(),
            email_verification: false,
            created_at,
            prefs: Preferences::default(),
        };
        inner
            .accounts
            .insert(user_id.to_owned(), StoredAccount { account: account.clone(), password: password.to_owned() });
        Ok(account)
    }

    async fn create_email_session(&self, email: &str, password: &str) -> Result<Session, BaasError> {
        let mut inner = self.lock();
        let Some(user_id) = inner
            .accounts
            .values()
            .find(|a| a.account.email == email && a.password == password)
            .map(|a| a.account.id.clone())
        else {
            return Err(api_error(401, "user_invalid_credentials", "Invalid credentials."));
        };
        let secret = format!("secret-{}", unique_id());
        let session = Session {
            id: unique_id(),
            user_id,
            provider: "email".into(),
            secret: secret.clone(),
            expire: "2030-01-01T00:00:00.000+00:00".into(),
            provider_access_token: String::new(),
            current: true,
        };
        inner.sessions.insert(secret, session.clone());
        Ok(session)
    }

    async fn create_token_session(&self, user_id: &str, secret: &str) -> Result<Session, BaasError> {
        let mut inner = self.lock();
        let Some(access_token) = inner
            .oauth_tokens
            .remove(&(user_id.to_owned(), secret.to_owned()))
        else {
            return Err(api_error(401, "user_invalid_token", "Invalid token passed in the request."));
        };
        let session_secret = format!("secret-{}", unique_id());
        let session = Session {
            id: unique_id(),
            user_id: user_id.to_owned(),
            provider: "google".into(),
            secret: session_secret.clone(),
            expire: "2030-01-01T00:00:00.000+00:00".into(),
            provider_access_token: access_token,
            current: true,
        };
        inner.sessions.insert(session_secret, session.clone());
        Ok(session)
    }

    async fn get_account(&self, session: &str) -> Result<Account, BaasError> {
        let inner = self.lock();
        let user_id = &inner.sessions.get(session).ok_or_else(unauthorized)?.user_id;
        inner
            .accounts
            .get(user_id)
            .map(|a| a.account.clone())
            .ok_or_else(unauthorized)
    }

    async fn delete_session(&self, session: &str, session_id: &str) -> Result<(), BaasError> {
        let mut inner = self.lock();
        let current_id = inner.sessions.get(session).ok_or_else(unauthorized)?.id.clone();
        if session_id == super::CURRENT_SESSION || session_id == current_id {
            inner.sessions.remove(session);
            return Ok(());
        }
        inner.sessions.retain(|_, s| s.id != session_id);
        Ok(())
    }

    async fn get_prefs(&self, session: &str) -> Result<Preferences, BaasError> {
        let inner = self.lock();
        if inner.failing_prefs {
            return Err(BaasError::Request("injected failure for prefs".into()));
        }
        let user_id = &inner.sessions.get(session).ok_or_else(unauthorized)?.user_id;
        Ok(inner
            .accounts
            .get(user_id)
            .map(|a| a.account.prefs.clone())
            .unwrap_or_default())
    }

    async fn update_prefs(&self, session: &str, prefs: &Preferences) -> Result<Preferences, BaasError> {
        let mut inner = self.lock();
        if inner.failing_prefs {
            return Err(BaasError::Request("injected failure for prefs".into()));
        }
        let user_id = inner.sessions.get(session).ok_or_else(unauthorized)?.user_id.clone();
        let stored = inner.accounts.get_mut(&user_id).ok_or_else(unauthorized)?;
        stored.account.prefs = prefs.clone();
        Ok(prefs.clone())
    }

    fn oauth2_url(&self, provider: &str, success: &str, failure: &str) -> String {
        format!("memory://oauth2/{provider}?success={success}&failure={failure}")
    }
}

#[async_trait::async_trait]
impl Databases for MemoryBackend {
    async fn create_document(
        &self,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> Result<RawDocument, BaasError> {
        let mut inner = self.lock();
        inner.check_collection(collection)?;
        let created_at = inner.next_timestamp();
        let doc = RawDocument {
            id: document_id.to_owned(),
            collection_id: collection.to_owned(),
            database_id: "test".into(),
            created_at: created_at.clone(),
            updated_at: created_at,
            data,
        };
        inner
            .collections
            .entry(collection.to_owned())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn get_document(&self, collection: &str, document_id: &str) -> Result<RawDocument, BaasError> {
        let inner = self.lock();
        inner.check_collection(collection)?;
        inner
            .collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == document_id))
            .cloned()
            .ok_or_else(|| api_error(404, "document_not_found", "Document with the requested ID could not be found."))
    }

    async fn update_document(
        &self,
        collection: &str,
        document_id: &str,
        data: Map<String, Value>,
    ) -> Result<RawDocument, BaasError> {
        let mut inner = self.lock();
        inner.check_collection(collection)?;
        if inner.failing_updates.contains(collection) {
            return Err(BaasError::Request(format!("injected update failure for {collection}")));
        }
        let updated_at = inner.next_timestamp();
        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == document_id))
            .ok_or_else(|| api_error(404, "document_not_found", "Document with the requested ID could not be found."))?;
        for (key, value) in data {
            doc.data.insert(key, value);
        }
        doc.updated_at = updated_at;
        Ok(doc.clone())
    }

    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<(), BaasError> {
        let mut inner = self.lock();
        inner.check_collection(collection)?;
        let docs = inner.collections.entry(collection.to_owned()).or_default();
        let before = docs.len();
        docs.retain(|d| d.id != document_id);
        if docs.len() == before {
            return Err(api_error(404, "document_not_found", "Document with the requested ID could not be found."));
        }
        Ok(())
    }

    async fn list_documents(
        &self,
        collection: &str,
        queries: &[Query],
    ) -> Result<DocumentList<Map<String, Value>>, BaasError> {
        let inner = self.lock();
        inner.check_collection(collection)?;
        let docs = inner
            .collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let (total, documents) = apply_queries(docs, queries);
        Ok(DocumentList { total, documents })
    }
}

#[async_trait::async_trait]
impl Storage for MemoryBackend {
    async fn create_file(
        &self,
        file_id: &str,
        file: FileUpload,
        permissions: &[String],
    ) -> Result<StoredFile, BaasError> {
        let mut inner = self.lock();
        let created_at = inner.next_timestamp();
        let stored = StoredFile {
            id: file_id.to_owned(),
            bucket_id: "test".into(),
            name: file.name,
            mime_type: file.content_type,
            size_original: file.bytes.len() as u64,
            created_at,
            permissions: permissions.to_vec(),
        };
        inner
            .files
            .insert(file_id.to_owned(), (stored.clone(), file.bytes));
        Ok(stored)
    }

    async fn get_file(&self, file_id: &str) -> Result<StoredFile, BaasError> {
        let inner = self.lock();
        inner
            .files
            .get(file_id)
            .map(|(meta, _)| meta.clone())
            .ok_or_else(|| api_error(404, "storage_file_not_found", "The requested file could not be found."))
    }

    async fn list_files(&self, queries: &[Query]) -> Result<FileList, BaasError> {
        let inner = self.lock();
        let as_docs: Vec<RawDocument> = inner
            .files
            .values()
            .map(|(meta, _)| RawDocument {
                id: meta.id.clone(),
                collection_id: String::new(),
                database_id: String::new(),
                created_at: meta.created_at.clone(),
                updated_at: meta.created_at.clone(),
                data: Map::from_iter([("name".to_owned(), Value::String(meta.name.clone()))]),
            })
            .collect();
        let (total, page) = apply_queries(&as_docs, queries);
        let files = page
            .iter()
            .filter_map(|d| inner.files.get(&d.id).map(|(meta, _)| meta.clone()))
            .collect();
        Ok(FileList { total, files })
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), BaasError> {
        let mut inner = self.lock();
        inner
            .files
            .remove(file_id)
            .map(|_| ())
            .ok_or_else(|| api_error(404, "storage_file_not_found", "The requested file could not be found."))
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, BaasError> {
        let in_flight = self.downloads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_downloads_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        // Let other downloads start before this one completes.
        tokio::task::yield_now().await;

        let result = {
            let inner = self.lock();
            if inner.failing_files.contains(file_id) {
                Err(BaasError::Request(format!("injected failure for file {file_id}")))
            } else {
                inner
                    .files
                    .get(file_id)
                    .map(|(_, bytes)| bytes.clone())
                    .ok_or_else(|| api_error(404, "storage_file_not_found", "The requested file could not be found."))
            }
        };
        self.downloads_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn preview_url(&self, file_id: &str, options: PreviewOptions) -> String {
        format!("memory://preview/{file_id}?width={}&height={}", options.width, options.height)
    }

    fn view_url(&self, file_id: &str) -> String {
        format!("memory://view/{file_id}")
    }
}
