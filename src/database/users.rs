use super::{DocumentStore, FindQuery, StoreResult};
use crate::models::User;
use mongodb::bson::{self, doc, oid::ObjectId, Document};
use std::sync::Arc;

/// Typed access to the `users` collection.
#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn DocumentStore>,
}

impl UserRepository {
    pub const COLLECTION: &'static str = "users";

    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn insert(&self, mut user: User) -> StoreResult<User> {
        user.id = None;
        let id = self
            .store
            .insert_one(Self::COLLECTION, bson::to_document(&user)?)
            .await?;
        user.id = Some(id);
        Ok(user)
    }

    pub async fn get(&self, id: &ObjectId) -> StoreResult<Option<User>> {
        self.find_one(doc! { "_id": *id }).await
    }

    pub async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_one(doc! { "email": email }).await
    }

    async fn find_one(&self, filter: Document) -> StoreResult<Option<User>> {
        self.store
            .find_one(Self::COLLECTION, filter, None)
            .await?
            .map(|document| bson::from_document(document).map_err(Into::into))
            .transpose()
    }

    pub async fn get_projected(
        &self,
        id: &ObjectId,
        projection: Option<Document>,
    ) -> StoreResult<Option<Document>> {
        self.store
            .find_one(Self::COLLECTION, doc! { "_id": *id }, projection)
            .await
    }

    pub async fn find(&self, query: &FindQuery) -> StoreResult<Vec<Document>> {
        self.store.find(Self::COLLECTION, query).await
    }

    pub async fn count(&self, query: &FindQuery) -> StoreResult<u64> {
        self.store.count(Self::COLLECTION, query).await
    }

    pub async fn all(&self) -> StoreResult<Vec<User>> {
        self.store
            .find(Self::COLLECTION, &FindQuery::default())
            .await?
            .into_iter()
            .map(|document| bson::from_document(document).map_err(Into::into))
            .collect()
    }

    /// Writes name, email and pending list. Returns the stored user, or
    /// `None` if it no longer exists.
    pub async fn replace(&self, user: &User) -> StoreResult<Option<User>> {
        let Some(id) = user.id else {
            return Ok(None);
        };

        let update = doc! {
            "$set": {
                "name": user.name.as_str(),
                "email": user.email.as_str(),
                "pendingTasks": user.pending_tasks.clone(),
            }
        };

        self.store
            .find_one_and_update(Self::COLLECTION, doc! { "_id": id }, update)
            .await?
            .map(|document| bson::from_document(document).map_err(Into::into))
            .transpose()
    }

    pub async fn delete(&self, id: &ObjectId) -> StoreResult<Option<User>> {
        self.store
            .find_one_and_delete(Self::COLLECTION, doc! { "_id": *id })
            .await?
            .map(|document| bson::from_document(document).map_err(Into::into))
            .transpose()
    }

    /// Adds `task_id` to the user's pending list unless already present.
    /// Returns `false` when the user does not exist.
    pub async fn add_pending_task(&self, user_id: &ObjectId, task_id: &ObjectId) -> StoreResult<bool> {
        self.store
            .update_one(
                Self::COLLECTION,
                doc! { "_id": *user_id },
                doc! { "$addToSet": { "pendingTasks": *task_id } },
            )
            .await
    }

    /// Removes `task_id` from the user's pending list.
    /// Returns `false` when the user does not exist.
    pub async fn remove_pending_task(
        &self,
        user_id: &ObjectId,
        task_id: &ObjectId,
    ) -> StoreResult<bool> {
        self.store
            .update_one(
                Self::COLLECTION,
                doc! { "_id": *user_id },
                doc! { "$pull": { "pendingTasks": *task_id } },
            )
            .await
    }

    /// Replaces the pending list only if it still equals `expected`, element
    /// for element. Returns `false` when it changed in the meantime.
    pub async fn replace_pending_tasks_if(
        &self,
        user_id: &ObjectId,
        expected: &[ObjectId],
        task_ids: &[ObjectId],
    ) -> StoreResult<bool> {
        self.store
            .update_one(
                Self::COLLECTION,
                doc! { "_id": *user_id, "pendingTasks": expected.to_vec() },
                doc! { "$set": { "pendingTasks": task_ids.to_vec() } },
            )
            .await
    }
}
