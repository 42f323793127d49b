pub mod reconcile_scheduler;

pub use reconcile_scheduler::start_reconcile_scheduler;
