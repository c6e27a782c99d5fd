//! Device lifecycle orchestration
//! This module provides the main session loop: bring the gateway session up, then scan, select,
//! connect, configure and stream notifications until the user exits or something fatal happens.

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::constants::{DEFAULT_SCAN_PERIOD_SECS, GATEWAY_CHANNEL_CAPACITY, VERSION_TIMEOUT_MS};
use crate::core::bluetooth::dispatcher::{Dispatched, Dispatcher};
use crate::core::bluetooth::gateway::{Credentials, Gateway, GatewayError, GatewayMessage};
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::profile::{DeviceFamily, SensorSettings};
use crate::core::bluetooth::scanner::AdvertisementScanner;
use crate::core::bluetooth::selection::DeviceSelector;
use crate::core::bluetooth::shutdown::ShutdownCoordinator;
use crate::core::bluetooth::types::{AdvertisedDevice, OrchestratorState, ScanMode, Selection};
use crate::error::OrchestratorError;
use crate::state::SharedState;

/// Everything one session needs to know up front
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub credentials: Credentials,
    /// Gateway to use; the first one offered at login when unset
    pub gateway_id: Option<String>,
    pub scan_mode: ScanMode,
    pub scan_period_secs: u32,
    pub version_timeout: Duration,
    pub sensors: SensorSettings,
}

impl SessionSettings {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            gateway_id: None,
            scan_mode: ScanMode::Active,
            scan_period_secs: DEFAULT_SCAN_PERIOD_SECS,
            version_timeout: Duration::from_millis(VERSION_TIMEOUT_MS),
            sensors: SensorSettings::default(),
        }
    }
}

/// Why the session loop ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The selector chose to exit
    Selected,
    /// Login offered no gateway to talk to
    NoGateway,
    /// The session was cancelled from outside
    Interrupted,
}

impl ExitReason {
    /// What to tell the user while shutting down
    pub fn message(self) -> &'static str {
        match self {
            Self::Selected => "Shutting down.. please wait",
            Self::NoGateway => "No Gateways Selected. Shutting down...",
            Self::Interrupted => "Received Ctrl-C - shutting down.. please wait",
        }
    }
}

/// Result of one selection cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleOutcome {
    Subscribed,
    Rescan,
    Exit,
}

fn transport_unreachable(err: GatewayError) -> OrchestratorError {
    OrchestratorError::TransportUnreachable(err.to_string())
}

/// Drives the device lifecycle for one gateway session
pub struct Orchestrator<G: Gateway + ?Sized> {
    gateway: Arc<G>,
    state: SharedState,
    scanner: AdvertisementScanner<G>,
    connections: ConnectionManager<G>,
    dispatcher: Dispatcher,
    selector: Arc<dyn DeviceSelector>,
    settings: SessionSettings,
}

impl<G: Gateway + ?Sized> Orchestrator<G> {
    pub fn new(
        gateway: Arc<G>,
        state: SharedState,
        settings: SessionSettings,
        selector: Arc<dyn DeviceSelector>,
        notifications: NotificationHandler,
    ) -> Self {
        let scanner = AdvertisementScanner::new(
            gateway.clone(),
            state.clone(),
            settings.scan_mode,
            settings.scan_period_secs,
        );
        let connections = ConnectionManager::new(gateway.clone(), state.clone());
        let dispatcher = Dispatcher::new(state.clone(), notifications);
        Self {
            gateway,
            state,
            scanner,
            connections,
            dispatcher,
            selector,
            settings,
        }
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Teardown driver sharing this session's gateway and state
    pub fn shutdown_coordinator(&self, retry_delay: Duration) -> ShutdownCoordinator<G> {
        ShutdownCoordinator::new(
            self.gateway.clone(),
            self.state.clone(),
            self.scanner.clone(),
            self.connections.clone(),
            self.dispatcher.notifications().clone(),
            retry_delay,
        )
    }

    /// Brings the session up and starts the first scan.
    ///
    /// Returns the channel the gateway pushes into, or `None` when login offered no gateway.
    pub async fn start_session(&self) -> Result<Option<mpsc::Receiver<GatewayMessage>>, OrchestratorError> {
        let credentials = &self.settings.credentials;
        let login = self.gateway.login(credentials).await.map_err(transport_unreachable)?;
        info!("Logged in as {}", credentials.user);

        let gateway_id = self
            .settings
            .gateway_id
            .clone()
            .or_else(|| login.gateways.first().cloned());
        let Some(gateway_id) = gateway_id else {
            warn!("No Gateways Selected");
            return Ok(None);
        };
        self.gateway.select(&gateway_id).await.map_err(transport_unreachable)?;
        self.gateway.open().await.map_err(transport_unreachable)?;

        let timeout = self.settings.version_timeout;
        let version = tokio::time::timeout(timeout, self.gateway.version())
            .await
            .map_err(|_| {
                OrchestratorError::TransportUnreachable(format!(
                    "gateway {} did not answer within {} ms",
                    gateway_id,
                    timeout.as_millis()
                ))
            })?
            .map_err(transport_unreachable)?;
        info!("Gateway {} is running version {}", gateway_id, version);

        let leftovers = self.connections.disconnect_all().await?;
        if leftovers > 0 {
            info!("Disconnected {} device(s) left over from a previous session", leftovers);
        }
        self.state.lock().await.clear_connected();

        let (sender, receiver) = mpsc::channel(GATEWAY_CHANNEL_CAPACITY);
        self.gateway.attach(sender).await?;
        self.scanner.start_scan().await?;
        Ok(Some(receiver))
    }

    /// Runs the session until the selector exits, `cancel` fires, or a fatal error occurs.
    /// Teardown is left to the caller.
    pub async fn run(&self, cancel: CancellationToken) -> Result<ExitReason, OrchestratorError> {
        let started = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(ExitReason::Interrupted),
            started = self.start_session() => started?,
        };
        let Some(receiver) = started else {
            return Ok(ExitReason::NoGateway);
        };
        self.event_loop(receiver, cancel).await
    }

    /// Dispatches gateway messages while at most one selection cycle is in flight, so
    /// disconnects and notifications keep flowing during connect and configuration.
    async fn event_loop(
        &self,
        mut receiver: mpsc::Receiver<GatewayMessage>,
        cancel: CancellationToken,
    ) -> Result<ExitReason, OrchestratorError> {
        let mut cycle: Option<BoxFuture<'_, Result<CycleOutcome, OrchestratorError>>> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(ExitReason::Interrupted),
                outcome = async {
                    match cycle.as_mut() {
                        Some(running) => running.await,
                        None => std::future::pending().await,
                    }
                } => {
                    cycle = None;
                    match outcome? {
                        CycleOutcome::Subscribed => {}
                        CycleOutcome::Rescan => self.scanner.start_scan().await?,
                        CycleOutcome::Exit => return Ok(ExitReason::Selected),
                    }
                }
                message = receiver.recv() => {
                    let Some(message) = message else {
                        return Err(OrchestratorError::ChannelClosed);
                    };
                    if self.dispatcher.dispatch(message).await? == Dispatched::ScanComplete {
                        if cycle.is_none() {
                            cycle = Some(self.selection_cycle().boxed());
                        } else {
                            debug!("Selection already in progress, scan complete ignored");
                        }
                    }
                }
            }
        }
    }

    /// Selecting -> Connecting -> Resolving/Configuring -> Subscribed
    async fn selection_cycle(&self) -> Result<CycleOutcome, OrchestratorError> {
        let discovered = {
            let mut state = self.state.lock().await;
            state.set_phase(OrchestratorState::Selecting);
            state.discovered_list()
        };

        let ids = match self.selector.select(&discovered).await {
            Selection::Exit => return Ok(CycleOutcome::Exit),
            Selection::Rescan => return Ok(CycleOutcome::Rescan),
            Selection::Connect(ids) => ids,
        };
        let selected: Vec<AdvertisedDevice> = ids
            .iter()
            .filter_map(|id| discovered.iter().find(|d| &d.id == id).cloned())
            .collect();
        if selected.is_empty() {
            warn!("None of the selected devices were discovered, rescanning");
            return Ok(CycleOutcome::Rescan);
        }

        self.state.lock().await.set_phase(OrchestratorState::Connecting);
        let mut pipelines = Vec::new();
        for family in DeviceFamily::ALL {
            let connected = self.connections.connect_family(family, &selected).await;
            if !connected.is_empty() {
                pipelines.push((family, connected));
            }
        }

        let results = join_all(pipelines.iter().map(|(family, connected)| {
            self.connections
                .configure_family(*family, connected, &self.settings.sensors)
        }))
        .await;
        for result in results {
            result?;
        }

        let mut state = self.state.lock().await;
        state.set_phase(OrchestratorState::Subscribed);
        info!("{} device(s) connected", state.connected_count());
        Ok(CycleOutcome::Subscribed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::selection::AutoSelector;
    use crate::core::bluetooth::types::DeviceId;
    use crate::simulator::{SimulatedDevice, SimulatedGateway};
    use crate::state::SessionState;

    fn orchestrator(gateway: Arc<SimulatedGateway>) -> Orchestrator<SimulatedGateway> {
        let settings = SessionSettings::new(Credentials {
            user: "tester".to_string(),
            password: "secret".to_string(),
        });
        Orchestrator::new(
            gateway,
            SessionState::shared(),
            settings,
            Arc::new(AutoSelector::new(0)),
            NotificationHandler::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn silent_version_check_is_unreachable() {
        let gateway = Arc::new(SimulatedGateway::new(vec![]));
        gateway.stall_version(true);
        let err = orchestrator(gateway.clone()).start_session().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::TransportUnreachable(_)));
        assert_eq!(gateway.counters().scans, 0);
    }

    #[tokio::test]
    async fn failed_login_is_unreachable() {
        let gateway = Arc::new(SimulatedGateway::new(vec![]));
        gateway.fail_login(true);
        let err = orchestrator(gateway).start_session().await.unwrap_err();
        assert!(matches!(err, OrchestratorError::TransportUnreachable(_)));
    }

    #[tokio::test]
    async fn no_gateway_ends_the_session() {
        let gateway = Arc::new(SimulatedGateway::new(vec![]).with_gateways(vec![]));
        let orchestrator = orchestrator(gateway.clone());
        assert!(orchestrator.start_session().await.unwrap().is_none());
        assert_eq!(
            orchestrator.run(CancellationToken::new()).await.unwrap(),
            ExitReason::NoGateway
        );
        assert_eq!(gateway.counters().opens, 0);
    }

    #[tokio::test]
    async fn leftover_connections_are_dropped_before_scanning() {
        let gateway = Arc::new(SimulatedGateway::new(vec![SimulatedDevice::sensortag("a0")]));
        gateway.force_connected(&DeviceId::new("a0"));

        let receiver = orchestrator(gateway.clone()).start_session().await.unwrap();
        assert!(receiver.is_some());
        assert!(gateway.connected_ids().is_empty());
        let counters = gateway.counters();
        assert_eq!(counters.disconnects, 1);
        assert_eq!(counters.scans, 1);
        assert_eq!(gateway.selected_gateway().as_deref(), Some(crate::simulator::DEFAULT_GATEWAY_ID));
    }

    #[test]
    fn exit_messages() {
        assert_eq!(ExitReason::Selected.message(), "Shutting down.. please wait");
        assert_eq!(ExitReason::NoGateway.message(), "No Gateways Selected. Shutting down...");
    }

    #[tokio::test]
    async fn cancelled_session_reports_interrupt() {
        let gateway = Arc::new(SimulatedGateway::new(vec![]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(
            orchestrator(gateway).run(cancel).await.unwrap(),
            ExitReason::Interrupted
        );
    }
}
