// ==================== RECONCILIATION ====================
// Repara divergências entre tasks e users deixadas por falhas parciais:
// referências para usuários removidos, nomes desatualizados e listas
// pendingTasks que não batem com as tasks.

use crate::{
    database::{Repositories, StoreResult},
    models::User,
};
use mongodb::bson::oid::ObjectId;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub users_repaired: usize,
    pub tasks_renamed: usize,
    pub tasks_unassigned: usize,
    /// Repairs not written because the document changed after it was read
    pub repairs_skipped: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self == &ReconcileReport::default()
    }

    fn applied(&mut self, applied: bool) -> bool {
        if !applied {
            self.repairs_skipped += 1;
        }
        applied
    }
}

/// Runs one full pass over both collections.
///
/// Tasks are fixed first, so pending lists are rebuilt from the repaired
/// assignments. Entries already in a user's list keep their order; missing
/// ones are appended.
///
/// Requests keep running during a pass. Every repair is conditional on the
/// document still holding the value that was read, so a concurrent write
/// wins and the repair is left to the next pass.
pub async fn reconcile(repos: &Repositories) -> StoreResult<ReconcileReport> {
    let mut report = ReconcileReport::default();

    let users = repos.users.all().await?;
    let names: HashMap<ObjectId, &str> = users
        .iter()
        .filter_map(|user| user.id.map(|id| (id, user.name.as_str())))
        .collect();

    let mut tasks = repos.tasks.all().await?;
    for task in tasks.iter_mut() {
        let Some(task_id) = task.id else { continue };
        let stale_name = task.assigned_user_name.clone();

        match task.assigned_user {
            Some(user_id) => match names.get(&user_id) {
                None => {
                    // Users created after the snapshot are not dangling.
                    if repos.users.get(&user_id).await?.is_some() {
                        continue;
                    }
                    let applied = repos
                        .tasks
                        .clear_assignee_if(&task_id, Some(&user_id), stale_name.as_deref())
                        .await?;
                    if report.applied(applied) {
                        report.tasks_unassigned += 1;
                        task.assigned_user = None;
                        task.assigned_user_name = None;
                        log::debug!("   🧹 Task {} pointed at missing user {}", task_id, user_id);
                    }
                }
                Some(name) if stale_name.as_deref() != Some(*name) => {
                    let applied = repos
                        .tasks
                        .rename_assignee_if(&task_id, &user_id, stale_name.as_deref(), name)
                        .await?;
                    if report.applied(applied) {
                        report.tasks_renamed += 1;
                        task.assigned_user_name = Some(name.to_string());
                    }
                }
                Some(_) => {}
            },
            None if stale_name.is_some() => {
                let applied = repos
                    .tasks
                    .clear_assignee_if(&task_id, None, stale_name.as_deref())
                    .await?;
                if report.applied(applied) {
                    report.tasks_unassigned += 1;
                    task.assigned_user_name = None;
                }
            }
            None => {}
        }
    }

    let mut expected: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
    for task in &tasks {
        if let (Some(task_id), Some(user_id)) = (task.id, task.pending_for()) {
            expected.entry(user_id).or_default().push(task_id);
        }
    }

    for user in &users {
        let Some(user_id) = user.id else { continue };
        let wanted = expected.remove(&user_id).unwrap_or_default();
        let repaired = rebuild_pending(user, &wanted);

        if repaired != user.pending_tasks {
            let applied = repos
                .users
                .replace_pending_tasks_if(&user_id, &user.pending_tasks, &repaired)
                .await?;
            if report.applied(applied) {
                report.users_repaired += 1;
                log::debug!(
                    "   🔧 pendingTasks of user {} rebuilt ({} -> {})",
                    user_id,
                    user.pending_tasks.len(),
                    repaired.len()
                );
            }
        }
    }

    Ok(report)
}

fn rebuild_pending(user: &User, wanted: &[ObjectId]) -> Vec<ObjectId> {
    let wanted_set: HashSet<&ObjectId> = wanted.iter().collect();
    let mut seen = HashSet::new();

    let mut pending: Vec<ObjectId> = user
        .pending_tasks
        .iter()
        .filter(|id| wanted_set.contains(id) && seen.insert(**id))
        .copied()
        .collect();
    pending.extend(wanted.iter().filter(|id| seen.insert(**id)).copied());
    pending
}
