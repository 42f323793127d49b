use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Task as stored in the `tasks` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub deadline: DateTime,

    #[serde(default)]
    pub completed: bool,

    /// Referenced user, `null` when unassigned
    #[serde(default)]
    pub assigned_user: Option<ObjectId>,

    /// Copy of the assignee's name
    #[serde(default)]
    pub assigned_user_name: Option<String>,

    #[serde(default = "DateTime::now")]
    pub date_created: DateTime,
}

impl Task {
    /// The user whose `pendingTasks` should list this task, if any.
    pub fn pending_for(&self) -> Option<ObjectId> {
        if self.completed {
            None
        } else {
            self.assigned_user
        }
    }
}

/// Body of `POST /tasks` and `PUT /tasks/{id}`.
///
/// On update, absent fields keep their stored value. `assignedUser` and
/// `assignedUserName` distinguish "absent" from an explicit `null`, which
/// clears the assignment.
#[derive(Debug, Default, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    pub name: Option<String>,

    pub description: Option<String>,

    /// RFC 3339 timestamp, `YYYY-MM-DD` date or epoch milliseconds
    #[schema(value_type = Option<String>, example = "2025-01-01")]
    pub deadline: Option<serde_json::Value>,

    pub completed: Option<bool>,

    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, nullable)]
    pub assigned_user: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<String>, nullable)]
    pub assigned_user_name: Option<Option<String>>,
}

/// Marks a field as present even when its value is `null`.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
