use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Document};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("document conversion failed: {0}")]
    Serialization(String),

    #[error("unexpected store response: {0}")]
    Backend(String),
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<mongodb::bson::de::Error> for StoreError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Find query with clauses applied in order: filter, sort, projection, skip, limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

impl FindQuery {
    pub fn filter(filter: Document) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// Document database operations used by the repositories.
///
/// Every update is a single-document (or filtered multi-document) atomic
/// operation on the server side; nothing here spans collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document, generating an `_id` when it has none.
    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<ObjectId>;

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Document>,
    ) -> StoreResult<Option<Document>>;

    async fn find(&self, collection: &str, query: &FindQuery) -> StoreResult<Vec<Document>>;

    /// Counts documents matching the filter. Sort, projection, skip and
    /// limit are ignored.
    async fn count(&self, collection: &str, query: &FindQuery) -> StoreResult<u64>;

    /// Applies `update` to the first matching document. Returns whether a
    /// document matched.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<bool>;

    /// Applies `update` and returns the document as it is after the update.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<Option<Document>>;

    /// Returns the number of modified documents.
    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<u64>;

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
    ) -> StoreResult<Option<Document>>;

    async fn ping(&self) -> StoreResult<()>;
}
