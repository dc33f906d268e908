use crate::core::etl::EtlEngine;
use crate::domain::model::RefreshReport;
use crate::domain::ports::Pipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Timer entry point. There is no caller to report to, so failures are logged and dropped.
pub async fn run_scheduled<P: Pipeline>(engine: &EtlEngine<P>) -> Option<RefreshReport> {
    tracing::info!("⏰ Running scheduled data update...");

    match engine.run().await {
        Ok(report) => {
            tracing::info!(
                "✅ Stored {} records to {}",
                report.records_stored,
                report.snapshot_key
            );
            Some(report)
        }
        Err(e) => {
            tracing::error!(
                "❌ Scheduled update failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            None
        }
    }
}

/// Refreshes every `period`, starting immediately. Overlapping HTTP-triggered
/// refreshes are not coordinated; the last write wins.
pub fn spawn_refresh_loop<P>(engine: Arc<EtlEngine<P>>, period: Duration) -> JoinHandle<()>
where
    P: Pipeline + 'static,
{
    tracing::info!("Scheduled refresh every {:?}", period);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            run_scheduled(&engine).await;
        }
    })
}
