use anyhow::{Context, Result};
use evdev::{Device, EventType, InputEventKind, Key};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, error, info, warn};

use crate::constants::{input, paths, permissions};
use crate::types::SupervisorCommand;

/// Find all keyboard devices that expose the toggle keys
fn find_all_keyboard_devices() -> Result<Vec<Device>> {
    info!(path = %paths::DEV_INPUT, "Scanning for keyboard devices...");

    let mut devices = Vec::new();

    for entry in std::fs::read_dir(paths::DEV_INPUT).context(format!(
        "Failed to read {} - are you in the '{}' group?",
        paths::DEV_INPUT,
        permissions::INPUT_GROUP
    ))? {
        let entry = entry?;
        let path = entry.path();

        if let Ok(device) = Device::open(&path) {
            // A device carrying E and N alongside Ctrl is a keyboard
            if let Some(keys) = device.supported_keys() {
                if keys.contains(Key::KEY_E)
                    && keys.contains(Key::KEY_N)
                    && keys.contains(Key::KEY_LEFTCTRL)
                {
                    info!(device_path = %path.display(), name = ?device.name(), "Found keyboard device");
                    devices.push(device);
                }
            }
        }
    }

    if devices.is_empty() {
        anyhow::bail!(
            "No keyboard device found. Ensure you're in '{}' group:\n\
             {}\n\
             Then log out and back in.",
            permissions::INPUT_GROUP,
            permissions::ADD_TO_INPUT_GROUP
        )
    }

    info!(count = devices.len(), "Listening on keyboard device(s)");

    Ok(devices)
}

/// Spawn background threads listening for Ctrl+Alt+E (toggle monitoring)
/// and Ctrl+Alt+N (toggle notifications) on all keyboard devices
pub fn spawn_listener(sender: Sender<SupervisorCommand>) -> Result<Vec<thread::JoinHandle<()>>> {
    let devices = find_all_keyboard_devices()?;
    let mut handles = Vec::new();

    for device in devices {
        let sender = sender.clone();
        let handle = thread::spawn(move || {
            info!(device = ?device.name(), "Hotkey listener started");
            if let Err(e) = listen_for_hotkeys(device, sender) {
                error!(error = %e, "Hotkey listener error");
            }
        });
        handles.push(handle);
    }

    Ok(handles)
}

/// Listen for the toggle chords on a single device
fn listen_for_hotkeys(mut device: Device, sender: Sender<SupervisorCommand>) -> Result<()> {
    loop {
        let events = device.fetch_events().context("Failed to fetch events")?;

        // Collect trigger-key presses first; the events iterator must be
        // finished with before the key state can be queried
        let mut presses = Vec::new();

        for event in events {
            if event.event_type() != EventType::KEY {
                continue;
            }

            if let InputEventKind::Key(key) = event.kind() {
                debug!(key = ?key, value = event.value(), "Key event");
                let pressed = event.value() == input::KEY_PRESS;

                if pressed && (key == Key::KEY_E || key == Key::KEY_N) {
                    presses.push(key);
                }
            }
        }

        // Check modifier state at dispatch time rather than tracking it
        // through batched events
        for key in presses {
            let key_state = device
                .get_key_state()
                .context("Failed to get keyboard state")?;

            let ctrl_held = key_state.contains(Key::KEY_LEFTCTRL)
                || key_state.contains(Key::KEY_RIGHTCTRL);
            let alt_held = key_state.contains(Key::KEY_LEFTALT)
                || key_state.contains(Key::KEY_RIGHTALT);

            if !(ctrl_held && alt_held) {
                continue;
            }

            let command = if key == Key::KEY_E {
                SupervisorCommand::ToggleMonitoring
            } else {
                SupervisorCommand::ToggleNotifications
            };

            info!(command = ?command, "Hotkey chord pressed, sending command");

            sender.send(command).context("Failed to send command")?;
        }
    }
}

/// Check if hotkeys are available (user has input group permissions)
pub fn check_permissions() -> bool {
    std::fs::read_dir(paths::DEV_INPUT).is_ok()
}

/// Print helpful error message if permissions missing
pub fn print_permission_error() {
    error!(path = %paths::DEV_INPUT, "Cannot access input devices");
    error!(group = %permissions::INPUT_GROUP, "Hotkeys require group membership");
    error!(command = %permissions::ADD_TO_INPUT_GROUP, "Add user to input group");
    error!("  Then log out and back in");
    warn!(continuing = true, "Continuing without hotkey support...");
}
