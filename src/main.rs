#![forbid(unsafe_code)]

mod capture;
mod config;
mod constants;
mod error;
mod hotkeys;
mod input;
mod logfile;
mod matcher;
mod scanner;
mod supervisor;
mod types;

use clap::Parser;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{Level as TraceLevel, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use capture::{ScreenCapture, XcapScreen};
use config::Settings;
use logfile::ActivityLog;
use supervisor::Supervisor;
use types::{Notice, Severity, SupervisorCommand};

/// Clicks the "Continue generation" button whenever it appears on a
/// monitored screen
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Start with monitoring enabled
    #[arg(long)]
    enabled: bool,

    /// Print enumerated monitor geometries and exit
    #[arg(long)]
    list_monitors: bool,

    /// Override the scan interval in seconds (persisted, clamped to [1, 60])
    #[arg(long)]
    interval: Option<u64>,

    /// Override the monitor selection, e.g. "0,2" or "-1" for all monitors
    /// (persisted)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    monitors: Option<Vec<i32>>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    if args.list_monitors {
        let monitors = XcapScreen::new().monitors()?;
        for monitor in &monitors {
            println!(
                "monitor {}: {}x{} at ({}, {})",
                monitor.index + 1,
                monitor.width,
                monitor.height,
                monitor.x,
                monitor.y
            );
        }
        return Ok(());
    }

    let settings = Settings::load();

    let activity_log = ActivityLog::open_default();
    info!(path = %activity_log.path().display(), "activity log");

    let (notice_tx, notice_rx) = mpsc::channel();
    let mut supervisor = Supervisor::new(settings, Settings::config_path(), activity_log, notice_tx);

    if let Some(seconds) = args.interval {
        supervisor.set_interval(seconds);
    }
    if let Some(indices) = args.monitors {
        supervisor.set_selected_monitors(indices);
    }
    info!(settings = ?supervisor.settings(), "effective settings");

    // SIGINT/SIGTERM request a clean shutdown via a shared flag
    let shutdown = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        signal_hook::flag::register(signal_hook::consts::SIGINT, shutdown.clone())?;
        signal_hook::flag::register(signal_hook::consts::SIGTERM, shutdown.clone())?;
    }

    // Channel for hotkey threads → shell loop
    let (hotkey_tx, hotkey_rx) = mpsc::channel();

    // Spawn hotkey listeners (optional - skip if permissions denied)
    let _hotkey_handles = if hotkeys::check_permissions() {
        match hotkeys::spawn_listener(hotkey_tx) {
            Ok(handles) => {
                info!("Hotkey support enabled (Ctrl+Alt+E / Ctrl+Alt+N)");
                Some(handles)
            }
            Err(e) => {
                error!("Failed to start hotkey listener: {}", e);
                hotkeys::print_permission_error();
                None
            }
        }
    } else {
        hotkeys::print_permission_error();
        None
    };

    if args.enabled {
        if let Err(e) = supervisor.start() {
            error!(error = %e, "Failed to start monitoring");
        }
    }

    info!("Application started");

    let watchdog_period = Duration::from_secs(constants::monitoring::WATCHDOG_PERIOD_SECS);
    let mut last_watchdog = Instant::now();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!("Shutdown requested");
            if supervisor.is_running() {
                supervisor.stop();
            }
            break;
        }

        // Hotkey commands (non-blocking)
        while let Ok(command) = hotkey_rx.try_recv() {
            info!(command = ?command, "Received hotkey command");
            match command {
                SupervisorCommand::ToggleMonitoring => supervisor.toggle_monitoring(),
                SupervisorCommand::ToggleNotifications => supervisor.toggle_notifications(),
            }
        }

        supervisor.pump_events();

        while let Ok(notice) = notice_rx.try_recv() {
            deliver(&notice);
        }

        if last_watchdog.elapsed() >= watchdog_period {
            supervisor.check_worker();
            last_watchdog = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(100));
    }

    info!("Application exited");
    Ok(())
}

/// Notification delivery stand-in: the core emits (title, message,
/// severity) triples and this shell surfaces them as log lines. A tray or
/// desktop-notification frontend would consume the same channel.
fn deliver(notice: &Notice) {
    match notice.severity {
        Severity::Info => info!(title = %notice.title, "{}", notice.message),
        Severity::Warning => warn!(title = %notice.title, "{}", notice.message),
        Severity::Error | Severity::Critical => {
            error!(title = %notice.title, severity = notice.severity.as_str(), "{}", notice.message)
        }
    }
}
