pub mod store;
pub mod tasks;
pub mod users;

#[cfg(test)]
pub mod memory;

pub use store::{DocumentStore, FindQuery, StoreError, StoreResult};
pub use tasks::TaskRepository;
pub use users::UserRepository;

use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use std::error::Error;
use std::sync::Arc;

const DEFAULT_DATABASE: &str = "task_service";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Shared application data: both repositories over one store connection.
#[derive(Clone)]
pub struct Repositories {
    pub store: Arc<dyn DocumentStore>,
    pub tasks: TaskRepository,
    pub users: UserRepository,
}

impl Repositories {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            tasks: TaskRepository::new(store.clone()),
            users: UserRepository::new(store.clone()),
            store,
        }
    }
}

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str, max_pool_size: u32) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let mut client_options = mongodb::options::ClientOptions::parse(uri).await?;

        client_options.max_pool_size = Some(max_pool_size);
        client_options.min_pool_size = Some(max_pool_size.min(5));
        client_options.max_idle_time = Some(std::time::Duration::from_secs(300));

        client_options.connect_timeout = Some(std::time::Duration::from_secs(5));
        client_options.server_selection_timeout = Some(std::time::Duration::from_secs(5));

        // Database name comes from the URI path, e.g. mongodb://host:27017/tasks
        let db_name = client_options
            .default_database
            .clone()
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&db_name);

        db.list_collection_names().await?;

        let mongodb = Self { client, db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    async fn ensure_indexes(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        log::info!("🔧 Creating database indexes...");

        let users = self.collection(UserRepository::COLLECTION);
        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        // Fails when existing users already share an email.
        users.create_index(email_index).await?;
        log::info!("   ✅ Index ready: users(email) unique");

        let tasks = self.collection(TaskRepository::COLLECTION);
        let assignee_index = IndexModel::builder()
            .keys(doc! { "assignedUser": 1, "completed": 1 })
            .build();

        match tasks.create_index(assignee_index).await {
            Ok(_) => log::info!("   ✅ Index ready: tasks(assignedUser, completed)"),
            Err(e) => log::debug!("   ℹ️  Index already exists: {}", e),
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection(name)
    }

    /// Closes pooled connections. Called once the HTTP server has stopped.
    pub async fn shutdown(self) {
        log::info!("🔌 Closing MongoDB connections");
        self.client.shutdown().await;
    }

    pub fn into_store(self) -> Arc<dyn DocumentStore> {
        Arc::new(self)
    }
}

fn map_write_error(err: mongodb::error::Error) -> StoreError {
    let duplicate = matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    );

    if duplicate {
        StoreError::DuplicateKey(err.to_string())
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl DocumentStore for MongoDB {
    async fn insert_one(&self, collection: &str, document: Document) -> StoreResult<ObjectId> {
        let result = self
            .collection(collection)
            .insert_one(document)
            .await
            .map_err(map_write_error)?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| StoreError::Backend("inserted _id is not an ObjectId".to_string()))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Document>,
    ) -> StoreResult<Option<Document>> {
        let collection = self.collection(collection);
        let mut action = collection.find_one(filter);
        if let Some(projection) = projection {
            action = action.projection(projection);
        }
        Ok(action.await?)
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> StoreResult<Vec<Document>> {
        let collection = self.collection(collection);
        let mut action = collection.find(query.filter.clone());
        if let Some(sort) = &query.sort {
            action = action.sort(sort.clone());
        }
        if let Some(projection) = &query.projection {
            action = action.projection(projection.clone());
        }
        if let Some(skip) = query.skip {
            action = action.skip(skip);
        }
        if let Some(limit) = query.limit {
            action = action.limit(limit);
        }

        let cursor = action.await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count(&self, collection: &str, query: &FindQuery) -> StoreResult<u64> {
        let collection = self.collection(collection);
        Ok(collection.count_documents(query.filter.clone()).await?)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<bool> {
        let result = self
            .collection(collection)
            .update_one(filter, update)
            .await
            .map_err(map_write_error)?;
        Ok(result.matched_count > 0)
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<Option<Document>> {
        self.collection(collection)
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(map_write_error)
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> StoreResult<u64> {
        let result = self
            .collection(collection)
            .update_many(filter, update)
            .await
            .map_err(map_write_error)?;
        Ok(result.modified_count)
    }

    async fn find_one_and_delete(
        &self,
        collection: &str,
        filter: Document,
    ) -> StoreResult<Option<Document>> {
        Ok(self.collection(collection).find_one_and_delete(filter).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
