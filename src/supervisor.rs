//! Loop lifecycle, configuration ownership and event fan-out
//!
//! The supervisor owns at most one monitor loop at a time. Every mutating
//! setter persists the settings file; setters that affect a running loop
//! restart it (stop-join, then start) so a loop always holds an immutable
//! snapshot of its configuration. A periodic watchdog reconciles the
//! user-facing running flag with the worker thread's actual liveness.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::capture::XcapScreen;
use crate::config::{self, Settings};
use crate::constants::notify;
use crate::input::MouseDispatcher;
use crate::logfile::ActivityLog;
use crate::matcher::Template;
use crate::scanner::{LoopConfig, MonitorLoop};
use crate::types::{LoopEvent, MonitorSelection, Notice, Severity};

struct WorkerHandle {
    join: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

pub struct Supervisor {
    settings: Settings,
    settings_path: PathBuf,
    running: bool,
    worker: Option<WorkerHandle>,
    events_tx: Sender<LoopEvent>,
    events_rx: Receiver<LoopEvent>,
    notices: Sender<Notice>,
    log: ActivityLog,
}

impl Supervisor {
    pub fn new(
        settings: Settings,
        settings_path: PathBuf,
        log: ActivityLog,
        notices: Sender<Notice>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            settings,
            settings_path,
            running: false,
            worker: None,
            events_tx,
            events_rx,
            notices,
            log,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Launch a monitor loop with a snapshot of the current settings.
    /// No-op when one is already running.
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }

        let loop_config = LoopConfig {
            interval: Duration::from_secs(self.settings.interval),
            notifications_enabled: self.settings.notifications_enabled,
            selection: self.settings.selected_monitors.clone(),
        };
        let events = self.events_tx.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let template_path = config::template_path();

        let join = thread::Builder::new()
            .name("monitor-loop".into())
            .spawn(move || {
                // A bad template is a configuration error, but it must not
                // crash startup: the loop runs template-less and fails each
                // tick until the ceiling trips.
                let template = match Template::load(&template_path) {
                    Ok(template) => Some(template),
                    Err(e) => {
                        error!(path = %template_path.display(), error = %e, "Failed to load button template");
                        let _ = events.send(LoopEvent::Error(format!(
                            "Failed to load button template: {e}"
                        )));
                        None
                    }
                };
                MonitorLoop::new(
                    loop_config,
                    template,
                    XcapScreen::new(),
                    MouseDispatcher::new(),
                    events,
                    worker_stop,
                    Arc::new(AtomicU32::new(0)),
                )
                .run();
            })
            .context("Failed to spawn monitor loop thread")?;

        self.worker = Some(WorkerHandle { join, stop });
        self.running = true;
        info!("Monitoring enabled");
        self.log.append(Severity::Info, "Monitoring enabled");
        if self.settings.notifications_enabled {
            self.notify(Severity::Info, "Monitoring enabled.");
        }
        Ok(())
    }

    /// Request the loop to stop and block until it has fully quiesced.
    /// Idempotent.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::SeqCst);
            if worker.join.join().is_err() {
                error!("monitor loop thread panicked during shutdown");
            }
        }
        if self.running {
            self.running = false;
            info!("Monitoring disabled");
            self.log.append(Severity::Info, "Monitoring disabled");
            if self.settings.notifications_enabled {
                self.notify(Severity::Info, "Monitoring disabled.");
            }
        }
    }

    pub fn toggle_monitoring(&mut self) {
        if self.running {
            self.stop();
        } else if let Err(e) = self.start() {
            error!(error = %e, "Failed to start monitoring");
        }
        self.persist();
    }

    pub fn toggle_notifications(&mut self) {
        self.settings.notifications_enabled = !self.settings.notifications_enabled;
        info!(
            enabled = self.settings.notifications_enabled,
            "Notifications toggled"
        );
        self.log.append(
            Severity::Info,
            if self.settings.notifications_enabled {
                "Notifications enabled"
            } else {
                "Notifications disabled"
            },
        );
        self.persist();
        self.restart_if_running();
    }

    /// Set the scan interval in seconds, clamped to the allowed range
    pub fn set_interval(&mut self, seconds: u64) {
        self.settings.interval = seconds;
        self.settings.validate_and_clamp();
        info!(interval = self.settings.interval, "Interval updated");
        self.log.append(
            Severity::Info,
            &format!("Interval set to {} seconds", self.settings.interval),
        );
        self.persist();
        self.restart_if_running();
    }

    pub fn set_selected_monitors(&mut self, indices: Vec<i32>) {
        self.settings.selected_monitors = MonitorSelection::new(indices);
        info!(selection = ?self.settings.selected_monitors, "Monitor selection updated");
        self.log.append(Severity::Info, "Monitor selection updated");
        self.persist();
        self.restart_if_running();
    }

    /// Drain pending worker events. Called from the shell loop; also run
    /// before the watchdog check so a fatal signal is never mistaken for a
    /// silent death.
    pub fn pump_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
    }

    /// Watchdog: reconcile the running flag with worker liveness. A loop
    /// that died without reporting (a panic rather than the error channel)
    /// is force-stopped and restarted.
    pub fn check_worker(&mut self) {
        self.pump_events();

        let alive = self
            .worker
            .as_ref()
            .is_some_and(|worker| !worker.join.is_finished());
        if self.running && !alive {
            warn!("Monitoring thread stopped unexpectedly, restarting");
            self.log.append(
                Severity::Warning,
                "Monitoring thread stopped unexpectedly, restarting",
            );
            self.stop();
            if let Err(e) = self.start() {
                error!(error = %e, "Failed to restart monitoring");
            }
        } else if !self.running && self.worker.is_some() {
            self.stop();
        }
    }

    fn handle_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::Log(message) => {
                info!("{message}");
                self.log.append(Severity::Info, &message);
            }
            LoopEvent::Notification(notice) => {
                let _ = self.notices.send(notice);
            }
            LoopEvent::Error(message) => {
                error!("{message}");
                self.log.append(Severity::Error, &message);
                if self.settings.notifications_enabled {
                    self.notify(Severity::Error, &message);
                }
            }
            LoopEvent::Fatal(message) => {
                error!("{message}");
                self.log.append(Severity::Critical, &message);
                // The loop stopped itself; reap the thread and reflect the
                // disabled state so the user sees monitoring is off. The
                // critical notice is sent regardless of the notification
                // toggle: a silent stop must not stay silent.
                if let Some(worker) = self.worker.take() {
                    worker.stop.store(true, Ordering::SeqCst);
                    let _ = worker.join.join();
                }
                self.running = false;
                self.notify(Severity::Critical, &message);
            }
        }
    }

    fn restart_if_running(&mut self) {
        if self.running {
            self.stop();
            if let Err(e) = self.start() {
                error!(error = %e, "Failed to restart monitoring after settings change");
            }
        }
    }

    fn persist(&self) {
        if let Err(e) = self.settings.save_to(&self.settings_path) {
            error!(error = %e, "Failed to save settings");
        }
    }

    fn notify(&self, severity: Severity, message: &str) {
        let _ = self.notices.send(Notice {
            title: notify::TITLE.to_string(),
            message: message.to_string(),
            severity,
        });
    }
}
