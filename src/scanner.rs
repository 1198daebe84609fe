//! The monitor loop
//!
//! A long-lived worker that sweeps the selected monitors once per tick:
//! capture, match against the button template, click on a confident hit.
//! Errors are contained per tick; a run of consecutive failed ticks trips
//! the ceiling and the loop stops itself with a single fatal signal.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;
use tracing::{error, info};

use crate::capture::ScreenCapture;
use crate::constants::{monitoring, notify};
use crate::error::ScanError;
use crate::input::Dispatcher;
use crate::matcher::{self, Template};
use crate::types::{LoopEvent, MonitorGeometry, MonitorSelection, Notice, Severity};

/// Read-only configuration snapshot handed to a loop at construction.
/// A running loop never observes live settings changes; the supervisor
/// restarts it instead.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub interval: Duration,
    pub notifications_enabled: bool,
    pub selection: MonitorSelection,
}

pub struct MonitorLoop<S: ScreenCapture, D: Dispatcher> {
    config: LoopConfig,
    /// None when the template asset failed to decode; every tick then
    /// fails through the normal error chain until the ceiling trips.
    template: Option<Template>,
    screen: S,
    dispatcher: D,
    events: Sender<LoopEvent>,
    stop: Arc<AtomicBool>,
    consecutive_errors: Arc<AtomicU32>,
}

impl<S: ScreenCapture, D: Dispatcher> MonitorLoop<S, D> {
    pub fn new(
        config: LoopConfig,
        template: Option<Template>,
        screen: S,
        dispatcher: D,
        events: Sender<LoopEvent>,
        stop: Arc<AtomicBool>,
        consecutive_errors: Arc<AtomicU32>,
    ) -> Self {
        Self {
            config,
            template,
            screen,
            dispatcher,
            events,
            stop,
            consecutive_errors,
        }
    }

    /// Tick until stopped or the failure ceiling is reached. Strictly
    /// sequential: the next tick never starts before this one, including
    /// its error handling, has finished.
    pub fn run(mut self) {
        info!(interval = ?self.config.interval, "monitor loop started");
        while !self.stop.load(Ordering::SeqCst) {
            match self.scan_cycle() {
                Ok(()) => {
                    self.consecutive_errors.store(0, Ordering::SeqCst);
                }
                Err(e) => {
                    if self.handle_error(&e) {
                        break;
                    }
                }
            }
            self.sleep_between_ticks();
        }
        info!("monitor loop exited");
    }

    /// One sweep over the currently enumerated monitors. The selection is
    /// resolved against a fresh enumeration so hot-plugged monitors are
    /// picked up without a restart. The first failing monitor aborts the
    /// remainder of the sweep for this tick only.
    fn scan_cycle(&mut self) -> Result<(), ScanError> {
        let monitors = self.screen.monitors()?;
        for monitor in &monitors {
            if self.config.selection.includes(monitor.index) {
                self.scan_monitor(monitor)
                    .map_err(|e| e.on_monitor(monitor.index))?;
            }
        }
        Ok(())
    }

    fn scan_monitor(&mut self, monitor: &MonitorGeometry) -> Result<(), ScanError> {
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| ScanError::Template("no usable button template loaded".into()))?;

        let snapshot = self.screen.capture(monitor)?;
        let result = matcher::match_template(&snapshot, template)?;
        if !result.is_actionable() {
            return Ok(());
        }

        let point = result.click_point(monitor, template);
        self.dispatcher.click(point)?;

        let display_index = monitor.index + 1;
        info!(
            monitor = display_index,
            x = point.x,
            y = point.y,
            confidence = result.confidence,
            "clicked continue button"
        );
        let _ = self.events.send(LoopEvent::Log(format!(
            "Clicked 'Continue generation' button on monitor {display_index}"
        )));
        if self.config.notifications_enabled {
            let _ = self.events.send(LoopEvent::Notification(Notice {
                title: notify::TITLE.to_string(),
                message: format!("Clicked button on monitor {display_index}"),
                severity: Severity::Info,
            }));
        }
        Ok(())
    }

    /// Count the failure and report it. Returns true once the ceiling is
    /// reached, after emitting the single fatal signal.
    fn handle_error(&mut self, err: &ScanError) -> bool {
        let failures = self.consecutive_errors.fetch_add(1, Ordering::SeqCst) + 1;
        error!(failures = failures, error = %err, "scan cycle failed");
        let _ = self
            .events
            .send(LoopEvent::Error(format!("Error in monitoring: {err}")));

        if failures >= monitoring::MAX_CONSECUTIVE_ERRORS {
            let message = format!("Stopping monitoring due to {failures} consecutive errors");
            error!("{message}");
            let _ = self.events.send(LoopEvent::Fatal(message));
            return true;
        }
        false
    }

    /// Wall-clock delay after each cycle, not a fixed-rate schedule: a slow
    /// tick pushes later ticks out instead of overlapping them. Sliced into
    /// short polls so a stop request does not wait out the full interval.
    fn sleep_between_ticks(&self) {
        let slice = Duration::from_millis(monitoring::STOP_POLL_MS);
        let mut remaining = self.config.interval;
        while !remaining.is_zero() && !self.stop.load(Ordering::SeqCst) {
            let nap = remaining.min(slice);
            std::thread::sleep(nap);
            remaining -= nap;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClickPoint;
    use image::{GrayImage, Luma};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::mpsc::{self, Receiver};

    fn geometry(index: usize, x: i32, y: i32) -> MonitorGeometry {
        MonitorGeometry {
            index,
            x,
            y,
            width: 100,
            height: 100,
        }
    }

    /// One entry per expected monitors() call; `None` entries fail the
    /// cycle. When the script is exhausted the screen raises the stop flag
    /// so `run()` returns.
    struct ScriptedScreen {
        script: VecDeque<Option<Vec<MonitorGeometry>>>,
        canvas: GrayImage,
        captured: Arc<Mutex<Vec<usize>>>,
        stop: Arc<AtomicBool>,
    }

    impl ScriptedScreen {
        fn new(
            script: Vec<Option<Vec<MonitorGeometry>>>,
            canvas: GrayImage,
            stop: Arc<AtomicBool>,
        ) -> (Self, Arc<Mutex<Vec<usize>>>) {
            let captured = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    script: script.into(),
                    canvas,
                    captured: captured.clone(),
                    stop,
                },
                captured,
            )
        }
    }

    impl ScreenCapture for ScriptedScreen {
        fn monitors(&mut self) -> Result<Vec<MonitorGeometry>, ScanError> {
            match self.script.pop_front() {
                Some(Some(monitors)) => Ok(monitors),
                Some(None) => Err(ScanError::Capture("scripted failure".into())),
                None => {
                    self.stop.store(true, Ordering::SeqCst);
                    Ok(Vec::new())
                }
            }
        }

        fn capture(&mut self, region: &MonitorGeometry) -> Result<GrayImage, ScanError> {
            self.captured.lock().unwrap().push(region.index);
            Ok(self.canvas.clone())
        }
    }

    #[derive(Clone)]
    struct RecordingDispatcher {
        clicks: Arc<Mutex<Vec<ClickPoint>>>,
    }

    impl RecordingDispatcher {
        fn new() -> Self {
            Self {
                clicks: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl Dispatcher for RecordingDispatcher {
        fn click(&mut self, point: ClickPoint) -> Result<(), ScanError> {
            self.clicks.lock().unwrap().push(point);
            Ok(())
        }
    }

    fn test_config(selection: MonitorSelection) -> LoopConfig {
        LoopConfig {
            interval: Duration::from_millis(1),
            notifications_enabled: true,
            selection,
        }
    }

    fn white_template(size: u32) -> Template {
        Template::from_image(GrayImage::from_pixel(size, size, Luma([220]))).unwrap()
    }

    fn black_canvas() -> GrayImage {
        GrayImage::from_pixel(100, 100, Luma([0]))
    }

    fn drain(events: &Receiver<LoopEvent>) -> (usize, usize, Vec<String>) {
        let mut errors = 0;
        let mut fatals = 0;
        let mut messages = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                LoopEvent::Error(msg) => {
                    errors += 1;
                    messages.push(msg);
                }
                LoopEvent::Fatal(msg) => {
                    fatals += 1;
                    messages.push(msg);
                }
                _ => {}
            }
        }
        (errors, fatals, messages)
    }

    #[test]
    fn test_failure_ceiling_stops_loop_with_single_fatal() {
        let stop = Arc::new(AtomicBool::new(false));
        let failures = Arc::new(AtomicU32::new(0));
        let (events_tx, events_rx) = mpsc::channel();
        // More failures scripted than the ceiling allows; the loop must
        // never reach the extras.
        let (screen, _) = ScriptedScreen::new(vec![None; 8], black_canvas(), stop.clone());

        MonitorLoop::new(
            test_config(MonitorSelection::all()),
            Some(white_template(8)),
            screen,
            RecordingDispatcher::new(),
            events_tx,
            stop,
            failures.clone(),
        )
        .run();

        let (errors, fatals, _) = drain(&events_rx);
        assert_eq!(errors, 5);
        assert_eq!(fatals, 1);
        assert_eq!(failures.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_failure_counter_resets_on_success() {
        let stop = Arc::new(AtomicBool::new(false));
        let failures = Arc::new(AtomicU32::new(0));
        let (events_tx, events_rx) = mpsc::channel();
        // fail, fail, success, then five consecutive failures: the loop
        // must survive the first two and only trip after the post-reset run.
        let script = vec![
            None,
            None,
            Some(Vec::new()),
            None,
            None,
            None,
            None,
            None,
        ];
        let (screen, _) = ScriptedScreen::new(script, black_canvas(), stop.clone());

        MonitorLoop::new(
            test_config(MonitorSelection::all()),
            Some(white_template(8)),
            screen,
            RecordingDispatcher::new(),
            events_tx,
            stop,
            failures,
        )
        .run();

        let (errors, fatals, _) = drain(&events_rx);
        assert_eq!(errors, 7);
        assert_eq!(fatals, 1);
    }

    #[test]
    fn test_selection_filters_scanned_monitors() {
        let stop = Arc::new(AtomicBool::new(false));
        let monitors = vec![
            geometry(0, 0, 0),
            geometry(1, 100, 0),
            geometry(2, 200, 0),
            geometry(3, 300, 0),
        ];
        let (screen, captured) =
            ScriptedScreen::new(vec![Some(monitors)], black_canvas(), stop.clone());
        let (events_tx, _events_rx) = mpsc::channel();

        MonitorLoop::new(
            test_config(MonitorSelection::new(vec![0, 2])),
            Some(white_template(8)),
            screen,
            RecordingDispatcher::new(),
            events_tx,
            stop,
            Arc::new(AtomicU32::new(0)),
        )
        .run();

        assert_eq!(*captured.lock().unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_all_sentinel_scans_everything_despite_concrete_indices() {
        let stop = Arc::new(AtomicBool::new(false));
        let monitors = vec![geometry(0, 0, 0), geometry(1, 100, 0), geometry(2, 200, 0)];
        let (screen, captured) =
            ScriptedScreen::new(vec![Some(monitors)], black_canvas(), stop.clone());
        let (events_tx, _events_rx) = mpsc::channel();

        MonitorLoop::new(
            test_config(MonitorSelection::new(vec![1, -1])),
            Some(white_template(8)),
            screen,
            RecordingDispatcher::new(),
            events_tx,
            stop,
            Arc::new(AtomicU32::new(0)),
        )
        .run();

        assert_eq!(*captured.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_confident_match_dispatches_click_at_global_center() {
        let stop = Arc::new(AtomicBool::new(false));
        let template = white_template(8);
        let mut canvas = black_canvas();
        for j in 0..8 {
            for i in 0..8 {
                canvas.put_pixel(30 + i, 40 + j, Luma([220]));
            }
        }
        let (screen, _) = ScriptedScreen::new(
            vec![Some(vec![geometry(0, 10, 20)])],
            canvas,
            stop.clone(),
        );
        let dispatcher = RecordingDispatcher::new();
        let clicks = dispatcher.clicks.clone();
        let (events_tx, events_rx) = mpsc::channel();

        MonitorLoop::new(
            test_config(MonitorSelection::all()),
            Some(template),
            screen,
            dispatcher,
            events_tx,
            stop,
            Arc::new(AtomicU32::new(0)),
        )
        .run();

        // monitor origin + match offset + half the template size
        assert_eq!(*clicks.lock().unwrap(), vec![ClickPoint { x: 44, y: 64 }]);

        let mut saw_log = false;
        let mut saw_notification = false;
        while let Ok(event) = events_rx.try_recv() {
            match event {
                LoopEvent::Log(msg) => {
                    saw_log = true;
                    assert!(msg.contains("monitor 1"));
                }
                LoopEvent::Notification(notice) => {
                    saw_notification = true;
                    assert_eq!(notice.severity, Severity::Info);
                    assert!(notice.message.contains("monitor 1"));
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(saw_log);
        assert!(saw_notification);
    }

    #[test]
    fn test_notifications_suppressed_when_disabled() {
        let stop = Arc::new(AtomicBool::new(false));
        let template = white_template(8);
        let mut canvas = black_canvas();
        for j in 0..8 {
            for i in 0..8 {
                canvas.put_pixel(30 + i, 40 + j, Luma([220]));
            }
        }
        let (screen, _) = ScriptedScreen::new(
            vec![Some(vec![geometry(0, 0, 0)])],
            canvas,
            stop.clone(),
        );
        let (events_tx, events_rx) = mpsc::channel();
        let mut config = test_config(MonitorSelection::all());
        config.notifications_enabled = false;

        MonitorLoop::new(
            config,
            Some(template),
            screen,
            RecordingDispatcher::new(),
            events_tx,
            stop,
            Arc::new(AtomicU32::new(0)),
        )
        .run();

        while let Ok(event) = events_rx.try_recv() {
            assert!(
                !matches!(event, LoopEvent::Notification(_)),
                "no notification expected when disabled"
            );
        }
    }

    #[test]
    fn test_missing_template_fails_every_tick_until_ceiling() {
        let stop = Arc::new(AtomicBool::new(false));
        let script = (0..5).map(|_| Some(vec![geometry(0, 0, 0)])).collect();
        let (screen, _) = ScriptedScreen::new(script, black_canvas(), stop.clone());
        let (events_tx, events_rx) = mpsc::channel();

        MonitorLoop::new(
            test_config(MonitorSelection::all()),
            None,
            screen,
            RecordingDispatcher::new(),
            events_tx,
            stop,
            Arc::new(AtomicU32::new(0)),
        )
        .run();

        let (errors, fatals, messages) = drain(&events_rx);
        assert_eq!(errors, 5);
        assert_eq!(fatals, 1);
        // Per-monitor failures are wrapped with the 1-based monitor index
        assert!(messages[0].contains("monitor 1"));
        assert!(messages[0].contains("template"));
    }

    #[test]
    fn test_stop_request_quiesces_loop() {
        let stop = Arc::new(AtomicBool::new(false));
        let failures = Arc::new(AtomicU32::new(0));
        let (events_tx, _events_rx) = mpsc::channel();
        // Unscripted screen succeeds forever without raising the shared
        // stop flag; only the external request ends the loop.
        let screen = ScriptedScreen {
            script: VecDeque::new(),
            canvas: black_canvas(),
            captured: Arc::new(Mutex::new(Vec::new())),
            stop: Arc::new(AtomicBool::new(false)),
        };

        let monitor_loop = MonitorLoop::new(
            test_config(MonitorSelection::all()),
            Some(white_template(8)),
            screen,
            RecordingDispatcher::new(),
            events_tx,
            stop.clone(),
            failures.clone(),
        );
        let handle = std::thread::spawn(move || monitor_loop.run());

        std::thread::sleep(Duration::from_millis(20));
        stop.store(true, Ordering::SeqCst);
        handle.join().unwrap();

        assert_eq!(failures.load(Ordering::SeqCst), 0);
    }
}
