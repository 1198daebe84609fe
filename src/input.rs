//! Synthetic mouse input
//!
//! Fire-and-forget left clicks at global screen coordinates. The enigo
//! handle is created lazily so a platform rejection (e.g. no X session)
//! surfaces as a per-tick dispatch error instead of a constructor crash.

use enigo::{Button, Coordinate, Direction, Enigo, Mouse, Settings};
use tracing::debug;

use crate::error::ScanError;
use crate::types::ClickPoint;

pub trait Dispatcher {
    /// Press-and-release the left button at `point`. No verification that
    /// the click landed.
    fn click(&mut self, point: ClickPoint) -> Result<(), ScanError>;
}

pub struct MouseDispatcher {
    enigo: Option<Enigo>,
}

impl MouseDispatcher {
    pub fn new() -> Self {
        Self { enigo: None }
    }

    fn handle(&mut self) -> Result<&mut Enigo, ScanError> {
        if self.enigo.is_none() {
            let enigo = Enigo::new(&Settings::default())
                .map_err(|e| ScanError::Dispatch(e.to_string()))?;
            self.enigo = Some(enigo);
        }
        Ok(self.enigo.as_mut().expect("initialized above"))
    }
}

impl Default for MouseDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for MouseDispatcher {
    fn click(&mut self, point: ClickPoint) -> Result<(), ScanError> {
        let enigo = self.handle()?;
        enigo
            .move_mouse(point.x, point.y, Coordinate::Abs)
            .map_err(|e| ScanError::Dispatch(e.to_string()))?;
        enigo
            .button(Button::Left, Direction::Click)
            .map_err(|e| ScanError::Dispatch(e.to_string()))?;
        debug!(x = point.x, y = point.y, "dispatched left click");
        Ok(())
    }
}
