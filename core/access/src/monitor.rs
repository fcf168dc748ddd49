//! Periodic privilege and session monitoring.

use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::control::AccessControl;

/// Background task calling [`AccessControl::sweep`] every
/// `monitor_interval`.
pub struct AccessMonitor {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl AccessMonitor {
    /// Start monitoring. Must be called inside a tokio runtime.
    pub fn spawn(control: Arc<AccessControl>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let period = control.config().monitor_interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            info!(interval_secs = period.as_secs(), "Access monitor started");
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("Access monitor shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let events = control.sweep().await;
                        if !events.is_empty() {
                            debug!(count = events.len(), "Access monitor published events");
                        }
                    }
                }
            }
        });

        Self { shutdown_tx, task }
    }

    /// Stop the task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccessConfig;
    use crate::control::AccessEvent;
    use crate::privilege::{Elevator, PrivilegeLevel, PrivilegeProbe};
    use crate::store::ProfileAuthenticator;
    use async_trait::async_trait;
    use phantomvault_common::{Error, ProfileId, Result};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct SwitchProbe(AtomicBool);

    impl PrivilegeProbe for SwitchProbe {
        fn detect(&self) -> PrivilegeLevel {
            if self.0.load(Ordering::SeqCst) {
                PrivilegeLevel::Admin
            } else {
                PrivilegeLevel::User
            }
        }
    }

    struct NoElevation;

    impl Elevator for NoElevation {
        fn request(&self, _reason: &str) -> Result<PrivilegeLevel> {
            Err(Error::NotPermitted("no".to_string()))
        }
    }

    struct AcceptAll;

    #[async_trait]
    impl ProfileAuthenticator for AcceptAll {
        async fn authenticate(&self, _profile_id: &ProfileId, _secret: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_reports_privilege_drop() {
        let probe = Arc::new(SwitchProbe(AtomicBool::new(true)));
        let config = AccessConfig {
            monitor_interval: Duration::from_secs(30),
            ..AccessConfig::default()
        };
        let control = Arc::new(AccessControl::new(
            config,
            probe.clone(),
            Arc::new(NoElevation),
            Arc::new(AcceptAll),
        ));
        let mut events = control.subscribe();
        let monitor = AccessMonitor::spawn(Arc::clone(&control));

        probe.0.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(
            events.recv().await.unwrap(),
            AccessEvent::PrivilegeChanged {
                from: PrivilegeLevel::Admin,
                to: PrivilegeLevel::User,
            }
        );
        monitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_sweeps() {
        let probe = Arc::new(SwitchProbe(AtomicBool::new(true)));
        let config = AccessConfig {
            monitor_interval: Duration::from_secs(10),
            ..AccessConfig::default()
        };
        let control = Arc::new(AccessControl::new(
            config,
            probe.clone(),
            Arc::new(NoElevation),
            Arc::new(AcceptAll),
        ));
        let mut events = control.subscribe();

        let monitor = AccessMonitor::spawn(Arc::clone(&control));
        tokio::time::sleep(Duration::from_secs(25)).await;
        monitor.shutdown().await;

        probe.0.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(events.try_recv().is_err());
    }
}
