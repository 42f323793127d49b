use super::{DocumentStore, FindQuery, StoreResult};
use crate::models::Task;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use std::sync::Arc;

/// Typed access to the `tasks` collection.
#[derive(Clone)]
pub struct TaskRepository {
    store: Arc<dyn DocumentStore>,
}

impl TaskRepository {
    pub const COLLECTION: &'static str = "tasks";

    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn insert(&self, mut task: Task) -> StoreResult<Task> {
        task.id = None;
        let id = self
            .store
            .insert_one(Self::COLLECTION, bson::to_document(&task)?)
            .await?;
        task.id = Some(id);
        Ok(task)
    }

    pub async fn get(&self, id: &ObjectId) -> StoreResult<Option<Task>> {
        self.store
            .find_one(Self::COLLECTION, doc! { "_id": *id }, None)
            .await?
            .map(|document| bson::from_document(document).map_err(Into::into))
            .transpose()
    }

    /// Raw document for `GET /tasks/{id}`, honouring `select`.
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

    pub async fn find_by_ids(&self, ids: &[ObjectId]) -> StoreResult<Vec<Task>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.find_typed(FindQuery::filter(doc! { "_id": { "$in": ids.to_vec() } }))
            .await
    }

    pub async fn all(&self) -> StoreResult<Vec<Task>> {
        self.find_typed(FindQuery::default()).await
    }

    async fn find_typed(&self, query: FindQuery) -> StoreResult<Vec<Task>> {
        self.store
            .find(Self::COLLECTION, &query)
            .await?
            .into_iter()
            .map(|document| bson::from_document(document).map_err(Into::into))
            .collect()
    }

    /// Writes every mutable field of `task`. Returns the stored task, or
    /// `None` if it no longer exists.
    pub async fn replace(&self, task: &Task) -> StoreResult<Option<Task>> {
        let Some(id) = task.id else {
            return Ok(None);
        };

        let mut fields = bson::to_document(task)?;
        fields.remove("_id");
        fields.remove("dateCreated");

        self.store
            .find_one_and_update(Self::COLLECTION, doc! { "_id": id }, doc! { "$set": fields })
            .await?
            .map(|document| bson::from_document(document).map_err(Into::into))
            .transpose()
    }

    pub async fn delete(&self, id: &ObjectId) -> StoreResult<Option<Task>> {
        self.store
            .find_one_and_delete(Self::COLLECTION, doc! { "_id": *id })
            .await?
            .map(|document| bson::from_document(document).map_err(Into::into))
            .transpose()
    }

    /// Sets or clears the assignment of a single task.
    pub async fn set_assignee(
        &self,
        task_id: &ObjectId,
        assignee: Option<(&ObjectId, &str)>,
    ) -> StoreResult<bool> {
        let (user, name) = match assignee {
            Some((user, name)) => (Bson::ObjectId(*user), Bson::String(name.to_string())),
            None => (Bson::Null, Bson::Null),
        };

        self.store
            .update_one(
                Self::COLLECTION,
                doc! { "_id": *task_id },
                doc! { "$set": { "assignedUser": user, "assignedUserName": name } },
            )
            .await
    }

    /// Clears the assignment only while the task still carries `user_id`
    /// and `user_name`. Returns `false` when it changed in the meantime.
    pub async fn clear_assignee_if(
        &self,
        task_id: &ObjectId,
        user_id: Option<&ObjectId>,
        user_name: Option<&str>,
    ) -> StoreResult<bool> {
        let filter = doc! {
            "_id": *task_id,
            "assignedUser": Bson::from(user_id.copied()),
            "assignedUserName": Bson::from(user_name),
        };

        self.store
            .update_one(
                Self::COLLECTION,
                filter,
                doc! { "$set": { "assignedUser": Bson::Null, "assignedUserName": Bson::Null } },
            )
            .await
    }

    /// Replaces `stale_name` with `name` while the task is still assigned to
    /// `user_id` under `stale_name`. The assignee itself is never written.
    pub async fn rename_assignee_if(
        &self,
        task_id: &ObjectId,
        user_id: &ObjectId,
        stale_name: Option<&str>,
        name: &str,
    ) -> StoreResult<bool> {
        let filter = doc! {
            "_id": *task_id,
            "assignedUser": *user_id,
            "assignedUserName": Bson::from(stale_name),
        };

        self.store
            .update_one(
                Self::COLLECTION,
                filter,
                doc! { "$set": { "assignedUserName": name } },
            )
            .await
    }

    /// Clears the assignment on every task that references `user_id`.
    pub async fn unassign_all(&self, user_id: &ObjectId) -> StoreResult<u64> {
        self.store
            .update_many(
                Self::COLLECTION,
                doc! { "assignedUser": *user_id },
                doc! { "$set": { "assignedUser": Bson::Null, "assignedUserName": Bson::Null } },
            )
            .await
    }

    /// Rewrites `assignedUserName` on every task assigned to `user_id`.
    pub async fn rename_assignee(&self, user_id: &ObjectId, name: &str) -> StoreResult<u64> {
        self.store
            .update_many(
                Self::COLLECTION,
                doc! { "assignedUser": *user_id },
                doc! { "$set": { "assignedUserName": name } },
            )
            .await
    }
}
