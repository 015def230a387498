//! Background scheduled tasks for the application.
//!
//! The only recurring job here is the tier lifecycle sweep. Call `spawn_all`
//! once during startup to launch it.

use crate::services::SchedulerService;

/// Spawn all background tasks.
///
/// Notes
/// - The sweep is idempotent as implemented in the scheduler service; it can
///   run at any cadence without duplicating notifications or history rows.
/// - This function detaches tasks via `tokio::spawn`; it does not block.
pub fn spawn_all(scheduler_service: SchedulerService, sweep_interval_secs: u64) {
    // 订阅生命周期巡检（默认每 6 小时）
    {
        let svc = scheduler_service.clone();
        tokio::spawn(async move {
            loop {
                let now = chrono::Utc::now();
                match svc.run_once(now).await {
                    Ok(summary) => {
                        if summary.warned + summary.graced + summary.downgraded > 0
                            || !summary.errors.is_empty()
                        {
                            log::info!(
                                "Tier sweep done: scanned={} warned={} graced={} downgraded={} errors={}",
                                summary.scanned,
                                summary.warned,
                                summary.graced,
                                summary.downgraded,
                                summary.errors.len()
                            );
                        }
                    }
                    Err(e) => log::error!("Tier sweep failed: {e:?}"),
                }
                tokio::time::sleep(std::time::Duration::from_secs(sweep_interval_secs)).await;
            }
        });
    }
}
