//! Background escalation loop
//!
//! Runs [`ReviewWorkflowService::run_escalation_tick`] on a fixed interval
//! until told to stop. A failed tick is logged and the loop carries on.

use crate::service::ReviewWorkflowService;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running escalation loop
#[derive(Debug)]
pub struct EscalationLoop {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<u64>,
}

impl EscalationLoop {
    /// Spawn with the service's configured interval
    #[must_use]
    pub fn spawn(service: Arc<ReviewWorkflowService>) -> Self {
        let period = service.config().scheduler.tick_interval();
        Self::spawn_every(service, period)
    }

    /// Spawn with an explicit interval
    #[must_use]
    pub fn spawn_every(service: Arc<ReviewWorkflowService>, period: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks = 0u64;

            tracing::info!("Escalation loop started, every {}s", period.as_secs());
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        ticks += 1;
                        match service.run_escalation_tick().await {
                            Ok(report) if !report.events.is_empty() => {
                                tracing::info!(
                                    "Escalated {} reviews ({} breached, {} at risk)",
                                    report.events.len(),
                                    report.summary.breached,
                                    report.summary.at_risk
                                );
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!("Escalation tick failed: {}", e),
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::info!("Escalation loop stopped after {} ticks", ticks);
            ticks
        });

        Self { shutdown, task }
    }

    /// Signal the loop and wait for it, returning the number of ticks run
    pub async fn stop(self) -> u64 {
        let _ = self.shutdown.send(true);
        match self.task.await {
            Ok(ticks) => ticks,
            Err(e) => {
                tracing::error!("Escalation loop panicked: {}", e);
                0
            }
        }
    }
}
