// ==================== ASSIGNMENT CONSISTENCY ====================
// Mantém Task.assignedUser e User.pendingTasks consistentes entre si.
// Cada alteração de lista é um update atômico de um único documento
// ($addToSet / $pull); nada aqui é transacional entre coleções.

use crate::{
    database::{Repositories, StoreError},
    models::{Task, User},
};
use mongodb::bson::oid::ObjectId;
use std::collections::HashSet;
use thiserror::Error;

/// Placeholder name clients send for "no assignee".
const UNASSIGNED: &str = "unassigned";

#[derive(Debug, Error)]
pub enum ConsistencyError {
    #[error("User {0} does not exist.")]
    UnknownUser(ObjectId),

    #[error("Task {0} does not exist.")]
    UnknownTask(ObjectId),

    #[error("assignedUserName '{given}' does not match the name of the assigned user '{expected}'.")]
    NameMismatch { given: String, expected: String },

    #[error("assignedUserName '{0}' requires an assignedUser.")]
    NameWithoutUser(String),

    #[error("Task {0} is completed and cannot be pending.")]
    CompletedTask(ObjectId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ConsistencyError {
    /// True for reference problems the caller may choose to tolerate.
    pub fn is_invalid_reference(&self) -> bool {
        !matches!(self, ConsistencyError::Store(_))
    }
}

pub type ConsistencyResult<T> = Result<T, ConsistencyError>;

/// Canonical assignment of a task: the user id and that user's name.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub user_id: ObjectId,
    pub user_name: String,
}

/// Resolves a requested assignment before anything is written.
///
/// A missing `assigned_user_name` is filled in from the user; a given one
/// must match. A name without a user is only accepted when it is empty or
/// the `"unassigned"` placeholder.
pub async fn resolve_assignment(
    repos: &Repositories,
    assigned_user: Option<ObjectId>,
    assigned_user_name: Option<&str>,
) -> ConsistencyResult<Option<Assignment>> {
    let given_name = assigned_user_name
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let Some(user_id) = assigned_user else {
        return match given_name {
            Some(name) if name != UNASSIGNED => {
                Err(ConsistencyError::NameWithoutUser(name.to_string()))
            }
            _ => Ok(None),
        };
    };

    let user = repos
        .users
        .get(&user_id)
        .await?
        .ok_or(ConsistencyError::UnknownUser(user_id))?;

    if let Some(name) = given_name {
        if name != user.name {
            return Err(ConsistencyError::NameMismatch {
                given: name.to_string(),
                expected: user.name,
            });
        }
    }

    Ok(Some(Assignment {
        user_id,
        user_name: user.name,
    }))
}

/// Lists a newly created, incomplete, assigned task on its assignee.
pub async fn on_task_create(repos: &Repositories, task: &Task) -> ConsistencyResult<()> {
    let (Some(task_id), Some(user_id)) = (task.id, task.pending_for()) else {
        return Ok(());
    };

    if !repos.users.add_pending_task(&user_id, &task_id).await? {
        return Err(ConsistencyError::UnknownUser(user_id));
    }
    log::debug!("📌 Task {} added to pending list of user {}", task_id, user_id);
    Ok(())
}

/// Moves the task between pending lists after `old` was replaced by `new`.
///
/// Covers reassignment, unassignment, completion and reopening: the task
/// leaves the old assignee's list unless it is still pending for that same
/// user, and joins the new assignee's list while it is incomplete.
pub async fn on_task_update(repos: &Repositories, old: &Task, new: &Task) -> ConsistencyResult<()> {
    let Some(task_id) = new.id.or(old.id) else {
        return Ok(());
    };
    let pending_for = new.pending_for();

    if let Some(previous) = old.assigned_user {
        if Some(previous) != pending_for {
            // The previous user may have been deleted meanwhile; nothing to pull then.
            repos.users.remove_pending_task(&previous, &task_id).await?;
            log::debug!("📤 Task {} removed from pending list of user {}", task_id, previous);
        }
    }

    if let Some(user_id) = pending_for {
        if !repos.users.add_pending_task(&user_id, &task_id).await? {
            return Err(ConsistencyError::UnknownUser(user_id));
        }
        log::debug!("📌 Task {} pending for user {}", task_id, user_id);
    }

    Ok(())
}

/// Removes a deleted task from its assignee's pending list.
pub async fn on_task_delete(repos: &Repositories, task: &Task) -> ConsistencyResult<()> {
    let (Some(task_id), Some(user_id)) = (task.id, task.assigned_user) else {
        return Ok(());
    };

    repos.users.remove_pending_task(&user_id, &task_id).await?;
    Ok(())
}

/// Clears the assignment on every task of a deleted user. Returns the
/// number of tasks unassigned.
pub async fn on_user_delete(repos: &Repositories, user: &User) -> ConsistencyResult<u64> {
    let Some(user_id) = user.id else {
        return Ok(0);
    };

    let unassigned = repos.tasks.unassign_all(&user_id).await?;
    log::info!("🧹 {} task(s) unassigned after deleting user {}", unassigned, user_id);
    Ok(unassigned)
}

/// Checks an explicit `pendingTasks` list: every id must name an existing,
/// incomplete task. Returns the ids with duplicates removed, order kept.
pub async fn validate_pending_tasks(
    repos: &Repositories,
    task_ids: &[ObjectId],
) -> ConsistencyResult<Vec<ObjectId>> {
    let mut seen = HashSet::new();
    let unique: Vec<ObjectId> = task_ids
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();

    let tasks = repos.tasks.find_by_ids(&unique).await?;

    for id in &unique {
        match tasks.iter().find(|task| task.id == Some(*id)) {
            None => return Err(ConsistencyError::UnknownTask(*id)),
            Some(task) if task.completed => return Err(ConsistencyError::CompletedTask(*id)),
            Some(_) => {}
        }
    }

    Ok(unique)
}

/// Propagates a user update to the tasks side.
///
/// Tasks added to `pendingTasks` are assigned to the user and pulled from
/// their previous assignee's list; tasks dropped from it are unassigned. A
/// name change is copied into `assignedUserName` of every assigned task.
pub async fn on_user_update(repos: &Repositories, old: &User, new: &User) -> ConsistencyResult<()> {
    let Some(user_id) = new.id.or(old.id) else {
        return Ok(());
    };

    if old.pending_tasks != new.pending_tasks {
        let before: HashSet<&ObjectId> = old.pending_tasks.iter().collect();
        let after: HashSet<&ObjectId> = new.pending_tasks.iter().collect();

        let added: Vec<ObjectId> = new
            .pending_tasks
            .iter()
            .filter(|id| !before.contains(id))
            .copied()
            .collect();
        let removed: Vec<ObjectId> = old
            .pending_tasks
            .iter()
            .filter(|id| !after.contains(id))
            .copied()
            .collect();

        for task in repos.tasks.find_by_ids(&added).await? {
            let Some(task_id) = task.id else { continue };
            if let Some(previous) = task.assigned_user.filter(|previous| *previous != user_id) {
                repos.users.remove_pending_task(&previous, &task_id).await?;
            }
            repos
                .tasks
                .set_assignee(&task_id, Some((&user_id, new.name.as_str())))
                .await?;
        }

        for task in repos.tasks.find_by_ids(&removed).await? {
            let Some(task_id) = task.id else { continue };
            // Only unassign tasks that still point at this user.
            if task.assigned_user == Some(user_id) {
                repos.tasks.set_assignee(&task_id, None).await?;
            }
        }

        log::info!(
            "🔁 User {} pending list updated: {} added, {} removed",
            user_id,
            added.len(),
            removed.len()
        );
    }

    if old.name != new.name {
        let renamed = repos.tasks.rename_assignee(&user_id, &new.name).await?;
        log::info!("✏️  assignedUserName rewritten on {} task(s) of user {}", renamed, user_id);
    }

    Ok(())
}
