//! Session teardown
//! Stops scanning, disconnects every device, closes the session and logs out. The stop and
//! disconnect step is retried on failure; the rest always runs.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};

use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::gateway::{Gateway, GatewayError};
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::scanner::AdvertisementScanner;
use crate::error::OrchestratorError;
use crate::state::SharedState;

/// Shown when the session task failed without returning
pub const FAULT_MESSAGE: &str = "Unhandled fault - shutting down.. please wait";
/// Shown when the session ended with an error
pub const ERROR_MESSAGE: &str = "Error! Exiting...";

/// How teardown went
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// Stop/disconnect attempts made; zero when no live session was open
    pub attempts: u32,
    /// The retry budget ran out before stop/disconnect succeeded
    pub retries_exhausted: bool,
}

pub struct ShutdownCoordinator<G: Gateway + ?Sized> {
    gateway: Arc<G>,
    state: SharedState,
    scanner: AdvertisementScanner<G>,
    connections: ConnectionManager<G>,
    notifications: NotificationHandler,
    retry_delay: Duration,
}

impl<G: Gateway + ?Sized> ShutdownCoordinator<G> {
    pub fn new(
        gateway: Arc<G>,
        state: SharedState,
        scanner: AdvertisementScanner<G>,
        connections: ConnectionManager<G>,
        notifications: NotificationHandler,
        retry_delay: Duration,
    ) -> Self {
        Self {
            gateway,
            state,
            scanner,
            connections,
            notifications,
            retry_delay,
        }
    }

    /// Tears the session down. Never fails; problems are logged and teardown moves on.
    ///
    /// Stop/disconnect is attempted once plus up to `retries` more times, `retry_delay` apart.
    pub async fn shutdown(&self, retries: u32, message: &str) -> ShutdownReport {
        info!("{}", message);
        self.state.lock().await.begin_exit();
        let mut report = ShutdownReport::default();

        if self.gateway.is_open() && self.gateway.is_live() {
            let mut remaining = retries;
            loop {
                report.attempts += 1;
                match self.stop_and_disconnect().await {
                    Ok(()) => break,
                    Err(e) if remaining > 0 => {
                        remaining -= 1;
                        warn!("Shutdown step failed: {}. Retrying ({} left)...", e, remaining);
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    Err(last) => {
                        let err = OrchestratorError::ShutdownRetryExhausted {
                            attempts: report.attempts,
                            last,
                        };
                        error!("{}", err);
                        report.retries_exhausted = true;
                        break;
                    }
                }
            }
        } else if self.gateway.is_open() {
            warn!("Gateway unreachable, skipping scan stop and disconnect");
        }

        if self.gateway.is_open() {
            if let Err(e) = self.gateway.close().await {
                warn!("Closing the gateway session failed: {}", e);
            }
        }

        self.state.lock().await.clear_connected();
        if let Err(e) = self.gateway.logout().await {
            warn!("Logout failed: {}", e);
        }
        if let Err(e) = self.notifications.flush() {
            error!("Failed to flush the data file: {}", e);
        }
        report
    }

    async fn stop_and_disconnect(&self) -> Result<(), GatewayError> {
        self.scanner.stop_scan().await?;
        self.connections.disconnect_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::constants::SHUTDOWN_RETRIES;
    use crate::core::bluetooth::gateway::Credentials;
    use crate::core::bluetooth::types::{DeviceId, OrchestratorState, ScanMode};
    use crate::simulator::{DEFAULT_GATEWAY_ID, SimulatedDevice, SimulatedGateway};
    use crate::state::SessionState;

    async fn coordinator(gateway: Arc<SimulatedGateway>) -> (SharedState, ShutdownCoordinator<SimulatedGateway>) {
        gateway
            .login(&Credentials {
                user: "tester".to_string(),
                password: String::new(),
            })
            .await
            .unwrap();
        gateway.select(DEFAULT_GATEWAY_ID).await.unwrap();
        gateway.open().await.unwrap();

        let state = SessionState::shared();
        let coordinator = ShutdownCoordinator::new(
            gateway.clone(),
            state.clone(),
            AdvertisementScanner::new(gateway.clone(), state.clone(), ScanMode::Active, 5),
            ConnectionManager::new(gateway.clone(), state.clone()),
            NotificationHandler::default(),
            Duration::from_millis(100),
        );
        (state, coordinator)
    }

    #[tokio::test(start_paused = true)]
    async fn clean_shutdown_disconnects_and_logs_out() {
        let gateway = Arc::new(SimulatedGateway::new(vec![SimulatedDevice::sensortag("a0")]));
        let (state, coordinator) = coordinator(gateway.clone()).await;
        gateway.force_connected(&DeviceId::new("a0"));

        let report = coordinator.shutdown(SHUTDOWN_RETRIES, "Exiting...").await;

        assert_eq!(report, ShutdownReport { attempts: 1, retries_exhausted: false });
        let counters = gateway.counters();
        assert_eq!(counters.scan_stops, 1);
        assert_eq!(counters.disconnects, 1);
        assert_eq!(counters.closes, 1);
        assert_eq!(counters.logouts, 1);
        assert!(!gateway.is_open());
        let state = state.lock().await;
        assert!(state.is_exiting());
        assert_eq!(state.phase(), OrchestratorState::ShuttingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_failures_still_reach_logout() {
        let gateway = Arc::new(SimulatedGateway::new(vec![SimulatedDevice::sensortag("a0")]));
        let (_state, coordinator) = coordinator(gateway.clone()).await;
        gateway.force_connected(&DeviceId::new("a0"));
        gateway.fail_disconnect_all(true);

        let started = tokio::time::Instant::now();
        let report = coordinator.shutdown(SHUTDOWN_RETRIES, "Exiting...").await;

        assert_eq!(report.attempts, SHUTDOWN_RETRIES + 1);
        assert!(report.retries_exhausted);
        assert!(started.elapsed() >= Duration::from_millis(100) * SHUTDOWN_RETRIES);
        let counters = gateway.counters();
        assert_eq!(counters.disconnects, SHUTDOWN_RETRIES + 1);
        assert_eq!(counters.closes, 1);
        assert_eq!(counters.logouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_scan_stop_is_retried() {
        let gateway = Arc::new(SimulatedGateway::new(vec![]));
        let (_state, coordinator) = coordinator(gateway.clone()).await;
        gateway.fail_scan_stop(true);

        let report = coordinator.shutdown(1, "Exiting...").await;
        assert_eq!(report.attempts, 2);
        assert_eq!(gateway.counters().scan_stops, 2);
        assert_eq!(gateway.counters().logouts, 1);
    }

    #[tokio::test]
    async fn unreachable_gateway_is_still_closed() {
        let gateway = Arc::new(SimulatedGateway::new(vec![SimulatedDevice::sensortag("a0")]));
        let (_state, coordinator) = coordinator(gateway.clone()).await;
        gateway.force_connected(&DeviceId::new("a0"));
        gateway.set_reachable(false);

        let report = coordinator.shutdown(SHUTDOWN_RETRIES, "Exiting...").await;
        assert_eq!(report.attempts, 0);
        let counters = gateway.counters();
        assert_eq!(counters.scan_stops, 0);
        assert_eq!(counters.disconnects, 0);
        assert_eq!(counters.closes, 1);
        assert_eq!(counters.logouts, 1);
        assert!(!gateway.is_open());
    }

    #[tokio::test]
    async fn closed_session_skips_straight_to_logout() {
        let gateway = Arc::new(SimulatedGateway::new(vec![]));
        let (_state, coordinator) = coordinator(gateway.clone()).await;
        gateway.close().await.unwrap();

        let report = coordinator.shutdown(SHUTDOWN_RETRIES, "Exiting...").await;
        assert_eq!(report.attempts, 0);
        let counters = gateway.counters();
        assert_eq!(counters.scan_stops, 0);
        assert_eq!(counters.closes, 1);
        assert_eq!(counters.logouts, 1);
    }
}
