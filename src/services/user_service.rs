// ==================== USERS ====================
// Validação, persistência e efeitos colaterais de consistência dos usuários

use crate::{
    database::{Repositories, StoreError},
    models::{User, UserRequest},
    services::{
        consistency, parse_object_id,
        query::{self, ListParams, ListRequest},
        tolerate_invalid_reference,
    },
    utils::{document_to_json, documents_to_json, ApiError, ApiResult},
};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde_json::Value;

pub const USER_NOT_FOUND: &str = "User not found";
const NAME_AND_EMAIL_REQUIRED: &str = "Name and email are required.";
const DUPLICATE_EMAIL: &str = "A user with that email already exists.";
const INVALID_PENDING_TASKS: &str = "One or more pendingTasks IDs are invalid.";

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The unique email index may still reject a write that passed the lookup.
fn duplicate_email(err: StoreError) -> ApiError {
    match err {
        StoreError::DuplicateKey(_) => ApiError::Validation(DUPLICATE_EMAIL.to_string()),
        other => other.into(),
    }
}

pub async fn list_users(repos: &Repositories, params: &ListParams) -> ApiResult<Value> {
    match query::translate(params, None)? {
        ListRequest::Rows(query) => Ok(documents_to_json(repos.users.find(&query).await?)),
        ListRequest::Count(query) => Ok(Value::from(repos.users.count(&query).await?)),
    }
}

pub async fn get_user(repos: &Repositories, id: &str, select: Option<&str>) -> ApiResult<Value> {
    let projection = query::parse_projection(select)?;
    let id = parse_object_id(id, USER_NOT_FOUND)?;

    repos
        .users
        .get_projected(&id, projection)
        .await?
        .map(document_to_json)
        .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))
}

/// POST /users. Any `pendingTasks` in the body is ignored.
pub async fn create_user(repos: &Repositories, request: UserRequest) -> ApiResult<User> {
    let (Some(name), Some(email)) = (
        non_blank(request.name.as_deref()),
        non_blank(request.email.as_deref()),
    ) else {
        return Err(ApiError::Validation(NAME_AND_EMAIL_REQUIRED.to_string()));
    };

    if repos.users.find_by_email(&email).await?.is_some() {
        return Err(ApiError::Validation(DUPLICATE_EMAIL.to_string()));
    }

    let user = User {
        id: None,
        name,
        email,
        pending_tasks: Vec::new(),
        date_created: DateTime::now(),
    };

    let user = repos.users.insert(user).await.map_err(duplicate_email)?;
    log::info!("✅ User created: {:?}", user.id);
    Ok(user)
}

/// PUT /users/{id}
///
/// Absent fields keep their stored value. A `pendingTasks` list replaces
/// the stored one after every id is checked, and the referenced tasks are
/// reassigned to match.
pub async fn update_user(repos: &Repositories, id: &str, request: UserRequest) -> ApiResult<User> {
    let id = parse_object_id(id, USER_NOT_FOUND)?;

    let name = match request.name.as_deref() {
        Some(raw) => Some(
            non_blank(Some(raw))
                .ok_or_else(|| ApiError::Validation(NAME_AND_EMAIL_REQUIRED.to_string()))?,
        ),
        None => None,
    };
    let email = match request.email.as_deref() {
        Some(raw) => Some(
            non_blank(Some(raw))
                .ok_or_else(|| ApiError::Validation(NAME_AND_EMAIL_REQUIRED.to_string()))?,
        ),
        None => None,
    };

    let pending_tasks = match &request.pending_tasks {
        Some(raw_ids) => {
            let ids = raw_ids
                .iter()
                .map(|raw| ObjectId::parse_str(raw.trim()))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| ApiError::Validation(INVALID_PENDING_TASKS.to_string()))?;
            Some(consistency::validate_pending_tasks(repos, &ids).await?)
        }
        None => None,
    };

    let old = repos
        .users
        .get(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))?;

    if let Some(email) = email.as_deref().filter(|email| *email != old.email) {
        if let Some(owner) = repos.users.find_by_email(email).await? {
            if owner.id != Some(id) {
                return Err(ApiError::Validation(DUPLICATE_EMAIL.to_string()));
            }
        }
    }

    let new = User {
        id: Some(id),
        name: name.unwrap_or_else(|| old.name.clone()),
        email: email.unwrap_or_else(|| old.email.clone()),
        pending_tasks: pending_tasks.unwrap_or_else(|| old.pending_tasks.clone()),
        date_created: old.date_created,
    };

    let stored = repos
        .users
        .replace(&new)
        .await
        .map_err(duplicate_email)?
        .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))?;
    tolerate_invalid_reference(consistency::on_user_update(repos, &old, &stored).await)?;

    log::info!("✏️  User updated: {}", id);
    Ok(stored)
}

/// DELETE /users/{id}
pub async fn delete_user(repos: &Repositories, id: &str) -> ApiResult<User> {
    let id = parse_object_id(id, USER_NOT_FOUND)?;

    let deleted = repos
        .users
        .delete(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))?;
    consistency::on_user_delete(repos, &deleted).await?;

    log::info!("🗑️  User deleted: {}", id);
    Ok(deleted)
}
