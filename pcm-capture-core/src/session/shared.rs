use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::models::audio_models::{DeviceList, DEFAULT_DEVICE_INDEX};
use crate::models::error::CaptureError;
use crate::models::state::CaptureState;
use crate::traits::capture_delegate::CaptureDelegate;

/// Capture state shared by the control path, the capture thread and the
/// hot-plug watcher.
///
/// Flags and the selected ordinal are atomics. The current device ID is the
/// only locked field and is never held across an OS call.
pub struct CaptureShared {
    is_capturing: AtomicBool,
    restart_requested: AtomicBool,
    selection: AtomicI32,
    state: AtomicU8,
    device_id: Mutex<Option<String>>,
    delegate: RwLock<Option<Arc<dyn CaptureDelegate>>>,
}

impl CaptureShared {
    pub fn new() -> Self {
        Self {
            is_capturing: AtomicBool::new(false),
            restart_requested: AtomicBool::new(false),
            selection: AtomicI32::new(DEFAULT_DEVICE_INDEX),
            state: AtomicU8::new(CaptureState::Idle.as_u8()),
            device_id: Mutex::new(None),
            delegate: RwLock::new(None),
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }

    pub fn set_capturing(&self, capturing: bool) {
        self.is_capturing.store(capturing, Ordering::SeqCst);
    }

    pub fn selection(&self) -> i32 {
        self.selection.load(Ordering::SeqCst)
    }

    pub fn set_selection(&self, index: i32) {
        self.selection.store(index, Ordering::SeqCst);
    }

    /// Replaces the selection only if it still equals `expected`, so a
    /// concurrent manual switch is never overwritten by a stale ordinal.
    pub fn replace_selection(&self, expected: i32, index: i32) -> bool {
        self.selection
            .compare_exchange(expected, index, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn request_restart(&self) {
        self.restart_requested.store(true, Ordering::SeqCst);
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested.load(Ordering::SeqCst)
    }

    /// Clears and returns the restart flag.
    pub fn take_restart(&self) -> bool {
        self.restart_requested.swap(false, Ordering::SeqCst)
    }

    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Records a state transition and tells the delegate if it changed.
    pub fn set_state(&self, state: CaptureState) {
        let previous = self.state.swap(state.as_u8(), Ordering::SeqCst);
        if previous != state.as_u8() {
            if let Some(delegate) = self.delegate() {
                delegate.on_state_changed(state);
            }
        }
    }

    pub fn device_id(&self) -> Option<String> {
        self.device_id.lock().clone()
    }

    pub fn set_device_id(&self, id: Option<String>) {
        *self.device_id.lock() = id;
    }

    pub fn delegate(&self) -> Option<Arc<dyn CaptureDelegate>> {
        self.delegate.read().clone()
    }

    pub fn set_delegate(&self, delegate: Option<Arc<dyn CaptureDelegate>>) {
        *self.delegate.write() = delegate;
    }

    pub fn report_error(&self, error: &CaptureError) {
        if let Some(delegate) = self.delegate() {
            delegate.on_error(error);
        }
    }

    /// Ordinal to reopen after a hot-plug restart.
    ///
    /// The default selection stays default. An explicit selection follows
    /// the open device's identity into the fresh snapshot, and falls back
    /// to the default when that device is gone.
    pub fn restart_index(&self, list: &DeviceList) -> i32 {
        let selection = self.selection();
        if selection == DEFAULT_DEVICE_INDEX {
            return DEFAULT_DEVICE_INDEX;
        }
        let resolved = match self.device_id() {
            Some(id) => list.index_of_id(&id).unwrap_or(DEFAULT_DEVICE_INDEX),
            None if list.contains_index(selection) => selection,
            None => DEFAULT_DEVICE_INDEX,
        };
        if resolved != selection {
            self.replace_selection(selection, resolved);
        }
        resolved
    }
}

impl Default for CaptureShared {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::Endpoint;

    fn list() -> DeviceList {
        DeviceList::from_endpoints(
            "Default",
            vec![
                Endpoint::new("spk", "Speakers", true),
                Endpoint::new("mic", "Microphone", false),
            ],
        )
    }

    #[test]
    fn restart_follows_device_identity() {
        let shared = CaptureShared::new();
        shared.set_selection(0);
        shared.set_device_id(Some("mic".into()));

        assert_eq!(shared.restart_index(&list()), 1);
        assert_eq!(shared.selection(), 1);
    }

    #[test]
    fn restart_falls_back_when_device_gone() {
        let shared = CaptureShared::new();
        shared.set_selection(1);
        shared.set_device_id(Some("usb-headset".into()));

        assert_eq!(shared.restart_index(&list()), -1);
        assert_eq!(shared.selection(), -1);
    }

    #[test]
    fn default_selection_stays_default() {
        let shared = CaptureShared::new();
        shared.set_device_id(Some("spk".into()));

        assert_eq!(shared.restart_index(&list()), -1);
    }

    #[test]
    fn stale_replace_is_rejected() {
        let shared = CaptureShared::new();
        shared.set_selection(2);

        assert!(!shared.replace_selection(0, 1));
        assert_eq!(shared.selection(), 2);
        assert!(shared.replace_selection(2, 1));
        assert_eq!(shared.selection(), 1);
    }

    #[test]
    fn take_restart_clears_flag() {
        let shared = CaptureShared::new();
        shared.request_restart();

        assert!(shared.take_restart());
        assert!(!shared.take_restart());
    }
}
