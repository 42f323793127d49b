// ==================== TASKS ====================
// Validação, persistência e efeitos colaterais de consistência das tasks

use crate::{
    database::Repositories,
    models::{Task, TaskRequest},
    services::{
        consistency,
        parse_object_id, parse_reference,
        query::{self, ListParams, ListRequest},
        tolerate_invalid_reference,
    },
    utils::{document_to_json, documents_to_json, ApiError, ApiResult},
};
use chrono::{NaiveDate, NaiveDateTime};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde_json::Value;

pub const TASK_NOT_FOUND: &str = "Task not found";
const NAME_AND_DEADLINE_REQUIRED: &str = "Name and deadline are required.";

/// Parses a deadline given as RFC 3339, `YYYY-MM-DD`, a naive
/// `YYYY-MM-DDTHH:MM:SS` timestamp or epoch milliseconds.
pub fn parse_deadline(value: &Value) -> ApiResult<DateTime> {
    let invalid = || ApiError::Validation(format!("Invalid deadline '{}'.", value));

    let millis = match value {
        Value::Number(n) => n.as_i64().ok_or_else(invalid)?,
        Value::String(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(ApiError::Validation(NAME_AND_DEADLINE_REQUIRED.to_string()));
            }
            if let Ok(millis) = raw.parse::<i64>() {
                millis
            } else if let Ok(date) = chrono::DateTime::parse_from_rfc3339(raw) {
                date.timestamp_millis()
            } else if let Ok(date) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
                date.and_utc().timestamp_millis()
            } else if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                date.and_hms_opt(0, 0, 0)
                    .ok_or_else(invalid)?
                    .and_utc()
                    .timestamp_millis()
            } else {
                return Err(invalid());
            }
        }
        _ => return Err(invalid()),
    };

    Ok(DateTime::from_millis(millis))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Lists tasks, or counts them when `count=true`.
pub async fn list_tasks(
    repos: &Repositories,
    params: &ListParams,
    default_limit: Option<i64>,
) -> ApiResult<Value> {
    match query::translate(params, default_limit)? {
        ListRequest::Rows(query) => Ok(documents_to_json(repos.tasks.find(&query).await?)),
        ListRequest::Count(query) => Ok(Value::from(repos.tasks.count(&query).await?)),
    }
}

pub async fn get_task(repos: &Repositories, id: &str, select: Option<&str>) -> ApiResult<Value> {
    let projection = query::parse_projection(select)?;
    let id = parse_object_id(id, TASK_NOT_FOUND)?;

    repos
        .tasks
        .get_projected(&id, projection)
        .await?
        .map(document_to_json)
        .ok_or_else(|| ApiError::NotFound(TASK_NOT_FOUND.to_string()))
}

/// POST /tasks
pub async fn create_task(repos: &Repositories, request: TaskRequest) -> ApiResult<Task> {
    let name = non_blank(request.name);
    let deadline = request.deadline.filter(|v| !v.is_null());
    let (Some(name), Some(deadline)) = (name, deadline) else {
        return Err(ApiError::Validation(NAME_AND_DEADLINE_REQUIRED.to_string()));
    };
    let deadline = parse_deadline(&deadline)?;

    let assigned_user = parse_reference("assignedUser", request.assigned_user.flatten())?;
    let assignment = consistency::resolve_assignment(
        repos,
        assigned_user,
        request.assigned_user_name.flatten().as_deref(),
    )
    .await?;

    let task = Task {
        id: None,
        name,
        description: request.description.unwrap_or_default(),
        deadline,
        completed: request.completed.unwrap_or(false),
        assigned_user: assignment.as_ref().map(|a| a.user_id),
        assigned_user_name: assignment.map(|a| a.user_name),
        date_created: DateTime::now(),
    };

    let task = repos.tasks.insert(task).await?;
    tolerate_invalid_reference(consistency::on_task_create(repos, &task).await)?;

    log::info!("✅ Task created: {:?}", task.id);
    Ok(task)
}

/// PUT /tasks/{id}
///
/// Absent fields keep their stored value; `name` and `deadline` cannot be
/// blanked. An explicit `assignedUser: null` unassigns the task.
pub async fn update_task(repos: &Repositories, id: &str, request: TaskRequest) -> ApiResult<Task> {
    let id = parse_object_id(id, TASK_NOT_FOUND)?;

    let name = match request.name {
        Some(name) => match non_blank(Some(name)) {
            Some(name) => Some(name),
            None => return Err(ApiError::Validation(NAME_AND_DEADLINE_REQUIRED.to_string())),
        },
        None => None,
    };
    let deadline = match &request.deadline {
        Some(Value::Null) => {
            return Err(ApiError::Validation(NAME_AND_DEADLINE_REQUIRED.to_string()))
        }
        Some(value) => Some(parse_deadline(value)?),
        None => None,
    };

    let old = repos
        .tasks
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(TASK_NOT_FOUND.to_string()))?;

    let (assigned_user, assigned_user_name) =
        match (request.assigned_user, request.assigned_user_name) {
            (None, None) => (old.assigned_user, old.assigned_user_name.clone()),
            (user, user_name) => {
                let user: Option<ObjectId> = match user {
                    Some(raw) => parse_reference("assignedUser", raw)?,
                    None => old.assigned_user,
                };
                let assignment = consistency::resolve_assignment(
                    repos,
                    user,
                    user_name.flatten().as_deref(),
                )
                .await?;
                match assignment {
                    Some(a) => (Some(a.user_id), Some(a.user_name)),
                    None => (None, None),
                }
            }
        };

    let new = Task {
        id: Some(id),
        name: name.unwrap_or_else(|| old.name.clone()),
        description: request
            .description
            .unwrap_or_else(|| old.description.clone()),
        deadline: deadline.unwrap_or(old.deadline),
        completed: request.completed.unwrap_or(old.completed),
        assigned_user,
        assigned_user_name,
        date_created: old.date_created,
    };

    let stored = repos
        .tasks
        .replace(&new)
        .await?
        .ok_or_else(|| ApiError::NotFound(TASK_NOT_FOUND.to_string()))?;
    tolerate_invalid_reference(consistency::on_task_update(repos, &old, &stored).await)?;

    log::info!("✏️  Task updated: {}", id);
    Ok(stored)
}

/// DELETE /tasks/{id}
pub async fn delete_task(repos: &Repositories, id: &str) -> ApiResult<Task> {
    let id = parse_object_id(id, TASK_NOT_FOUND)?;

    let deleted = repos
        .tasks
        .delete(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(TASK_NOT_FOUND.to_string()))?;
    tolerate_invalid_reference(consistency::on_task_delete(repos, &deleted).await)?;

    log::info!("🗑️  Task deleted: {}", id);
    Ok(deleted)
}
