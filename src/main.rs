use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{Level, error, info, warn};
use tokio_util::sync::CancellationToken;

use gateway_sensor_bridge_lib::config::{AppConfig, CONFIG_FILE_NAME};
use gateway_sensor_bridge_lib::core::bluetooth::shutdown::{ERROR_MESSAGE, FAULT_MESSAGE};
use gateway_sensor_bridge_lib::core::bluetooth::{
    AutoSelector, ExitReason, NotificationHandler, Orchestrator, ScanMode,
};
use gateway_sensor_bridge_lib::logging::ConsoleLogger;
use gateway_sensor_bridge_lib::simulator::SimulatedGateway;
use gateway_sensor_bridge_lib::sink::{self, CsvSink};
use gateway_sensor_bridge_lib::state::SessionState;

/// Connects BLE sensors through a gateway and streams their readings
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file
    #[arg(short, long, default_value = CONFIG_FILE_NAME)]
    config: PathBuf,

    /// Gateway account name
    #[arg(short, long)]
    user: Option<String>,

    /// Gateway account password
    #[arg(short, long, env = "GATEWAY_PASSWORD", hide_env_values = true, default_value = "")]
    password: String,

    /// Gateway id; the first one offered at login when omitted
    #[arg(short, long)]
    gateway: Option<String>,

    /// Passive scanning instead of active
    #[arg(long)]
    passive: bool,

    /// Scan period in seconds
    #[arg(long)]
    period: Option<u32>,

    /// CSV data file for readings
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Write the merged settings back to the config file
    #[arg(long)]
    save_config: bool,

    /// Simulated SensorTags on the gateway
    #[arg(long, default_value_t = 1)]
    sensortags: u16,

    /// Simulated Humigadgets on the gateway
    #[arg(long, default_value_t = 1)]
    humigadgets: u16,
}

impl Cli {
    fn merge_into(&self, config: &mut AppConfig) {
        if let Some(user) = &self.user {
            config.gateway.user = user.clone();
        }
        if let Some(gateway) = &self.gateway {
            config.gateway.gateway_id = Some(gateway.clone());
        }
        if self.passive {
            config.scan.mode = ScanMode::Passive;
        }
        if let Some(period) = self.period {
            config.scan.period_secs = period;
        }
        if let Some(output) = &self.output {
            config.output.file = Some(output.clone());
        }
    }
}

fn setup_logging(level: Level) {
    if std::env::var_os("RUST_LOG").is_some() || ConsoleLogger::init(level).is_err() {
        env_logger::init();
    }
    info!("Logging initialized");
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.log_level);

    let mut config = match AppConfig::load_config(&cli.config).await {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config from {:?}: {}", cli.config, e);
            return ExitCode::FAILURE;
        }
    };
    cli.merge_into(&mut config);
    if cli.save_config {
        if let Err(e) = config.save_config(&cli.config).await {
            warn!("Failed to save config: {}", e);
        }
    }

    let sink = match &config.output.file {
        Some(path) => match CsvSink::open(path).await {
            Ok(csv) => {
                info!("Writing readings to {:?}", csv.path());
                Some(sink::shared(csv))
            }
            Err(e) => {
                error!("Failed to open data file {:?}: {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => None,
    };

    let gateway = Arc::new(SimulatedGateway::fleet(cli.sensortags, cli.humigadgets));
    let orchestrator = Arc::new(Orchestrator::new(
        gateway,
        SessionState::shared(),
        config.session_settings(cli.password.clone()),
        Arc::new(AutoSelector::new(config.selection.max_rescans)),
        NotificationHandler::new(sink),
    ));
    info!(
        "Session for user '{}', {:?} scan of {}s",
        orchestrator.settings().credentials.user,
        orchestrator.settings().scan_mode,
        orchestrator.settings().scan_period_secs
    );

    let cancel = CancellationToken::new();
    let mut session = tokio::spawn({
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        async move { orchestrator.run(cancel).await }
    });

    let outcome = tokio::select! {
        outcome = &mut session => outcome,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            session.await
        }
    };

    let (message, code) = match outcome {
        Ok(Ok(reason)) => (reason.message(), ExitCode::SUCCESS),
        Ok(Err(e)) => {
            error!("{}", e);
            (ERROR_MESSAGE, ExitCode::FAILURE)
        }
        Err(e) => {
            error!("Session task failed: {}", e);
            (FAULT_MESSAGE, ExitCode::FAILURE)
        }
    };

    let report = orchestrator
        .shutdown_coordinator(config.shutdown_retry_delay())
        .shutdown(config.shutdown.retries, message)
        .await;
    if report.retries_exhausted {
        warn!("Some devices may still be connected to the gateway");
    }

    println!("Goodbye!");
    code
}
