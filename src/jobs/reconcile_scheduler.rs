// ==================== RECONCILE SCHEDULER ====================
// Job que reconstrói pendingTasks e corrige referências entre tasks e users.
// Roda uma vez no startup e depois periodicamente, se configurado.

use crate::{database::Repositories, services::reconcile_service};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Spawns the reconcile job. The startup pass runs inside the job, so the
/// server starts listening without waiting for it. With no `period` the job
/// ends after that pass.
pub fn start_reconcile_scheduler(repos: Repositories, period: Option<Duration>) -> JoinHandle<()> {
    match period {
        Some(period) => log::info!("📅 Starting reconcile scheduler (every {}s)", period.as_secs()),
        None => log::info!("ℹ️  Periodic reconcile disabled (RECONCILE_INTERVAL_SECS=0)"),
    }

    tokio::spawn(async move {
        log::info!("🚀 Running initial reconcile pass...");
        run_pass(&repos, "Startup").await;

        let Some(period) = period else { return };

        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately and the startup pass already ran.
        interval.tick().await;

        loop {
            interval.tick().await;
            run_pass(&repos, "Periodic").await;
        }
    })
}

async fn run_pass(repos: &Repositories, label: &str) {
    match reconcile_service::reconcile(repos).await {
        Ok(report) if report.is_clean() => {
            log::debug!("✅ {} reconcile: nothing to repair", label);
        }
        Ok(report) => {
            log::info!(
                "🔧 {} reconcile: {} user(s) repaired, {} task name(s) fixed, {} task(s) unassigned, {} repair(s) deferred",
                label,
                report.users_repaired,
                report.tasks_renamed,
                report.tasks_unassigned,
                report.repairs_skipped
            );
        }
        Err(e) => {
            log::error!("❌ {} reconcile failed: {}", label, e);
        }
    }
}
