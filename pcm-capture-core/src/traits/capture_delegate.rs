use crate::models::error::CaptureError;
use crate::models::state::CaptureState;

/// Event delegate for capture notifications.
///
/// State changes may arrive from the capture thread, not the caller's thread.
/// Implementations should marshal to the UI thread if needed.
pub trait CaptureDelegate: Send + Sync {
    /// Called when the capture loop changes state.
    fn on_state_changed(&self, state: CaptureState);

    /// Called after a device switch with the newly selected device.
    ///
    /// Intended for toast or window-title updates.
    fn on_device_changed(&self, index: i32, name: &str);

    /// Called once per failed open or capture error.
    fn on_error(&self, error: &CaptureError);
}
