//! Typed view over one collection.
//!
//! `Databases` moves untyped JSON maps; `Collection<T>` encodes bodies on the
//! way in and decodes every returned document into `Document<T>`, so a
//! document that does not match `T` fails here with [`BaasError::Parse`].

use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::{Backend, BaasError, Document, DocumentList, Query, RawDocument, unique_id};

pub struct Collection<'a, T> {
    backend: &'a dyn Backend,
    id: &'a str,
    _body: PhantomData<fn() -> T>,
}

impl<'a, T> Collection<'a, T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    #[must_use]
    pub fn new(backend: &'a dyn Backend, id: &'a str) -> Self {
        Self { backend, id, _body: PhantomData }
    }

    /// Create a document with a freshly generated id.
    pub async fn create(&self, body: &T) -> Result<Document<T>, BaasError> {
        let data = encode(body)?;
        let raw = self
            .backend
            .create_document(self.id, &unique_id(), data)
            .await?;
        decode(raw)
    }

    pub async fn get(&self, document_id: &str) -> Result<Document<T>, BaasError> {
        decode(self.backend.get_document(self.id, document_id).await?)
    }

    /// Like [`get`](Self::get), but a missing document is `Ok(None)`.
    pub async fn find(&self, document_id: &str) -> Result<Option<Document<T>>, BaasError> {
        match self.get(document_id).await {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn update(&self, document_id: &str, patch: Map<String, Value>) -> Result<Document<T>, BaasError> {
        decode(
            self.backend
                .update_document(self.id, document_id, patch)
                .await?,
        )
    }

    pub async fn delete(&self, document_id: &str) -> Result<(), BaasError> {
        self.backend.delete_document(self.id, document_id).await
    }

    pub async fn list(&self, queries: &[Query]) -> Result<DocumentList<T>, BaasError> {
        let raw = self.backend.list_documents(self.id, queries).await?;
        let documents = raw
            .documents
            .into_iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DocumentList { total: raw.total, documents })
    }

    /// First document matching `filters`, if any.
    pub async fn first(&self, filters: Vec<Query>) -> Result<Option<Document<T>>, BaasError> {
        let mut queries = filters;
        queries.push(Query::limit(1));
        Ok(self.list(&queries).await?.documents.into_iter().next())
    }

    /// Number of documents matching `filters`.
    pub async fn count(&self, filters: Vec<Query>) -> Result<u64, BaasError> {
        let mut queries = filters;
        queries.push(Query::limit(1));
        Ok(self
            .backend
            .list_documents(self.id, &queries)
            .await?
            .total)
    }
}

pub(crate) fn encode<T: Serialize>(body: &T) -> Result<Map<String, Value>, BaasError> {
    match serde_json::to_value(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(BaasError::Parse(format!("document body must be an object, got {other}"))),
        Err(e) => Err(BaasError::Parse(e.to_string())),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(raw: RawDocument) -> Result<Document<T>, BaasError> {
    let data = serde_json::from_value(Value::Object(raw.data))
        .map_err(|e| BaasError::Parse(format!("document {}: {e}", raw.id)))?;
    Ok(Document {
        id: raw.id,
        collection_id: raw.collection_id,
        database_id: raw.database_id,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
        data,
    })
}
