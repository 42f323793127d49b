use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User as stored in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub name: String,

    pub email: String,

    /// Incomplete tasks assigned to this user
    #[serde(default)]
    pub pending_tasks: Vec<ObjectId>,

    #[serde(default = "DateTime::now")]
    pub date_created: DateTime,
}

/// Body of `POST /users` and `PUT /users/{id}`.
///
/// `pendingTasks` is ignored on create; on update it replaces the list and
/// reassigns the referenced tasks.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub name: Option<String>,

    pub email: Option<String>,

    pub pending_tasks: Option<Vec<String>>,
}
