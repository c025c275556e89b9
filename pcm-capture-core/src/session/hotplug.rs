use std::sync::Arc;

use crate::models::audio_models::{DataFlow, DEFAULT_DEVICE_INDEX};
use crate::session::enumerator::DeviceEnumerator;
use crate::session::shared::CaptureShared;
use crate::traits::notification::{DeviceNotification, NotificationSink};

const LOG_TARGET: &str = "pcm_capture::hotplug";

/// Turns OS device notifications into restart or no-op decisions.
///
/// Never touches the stream itself: it only updates the shared selection
/// and raises the restart flag, which the capture loop (pull) or the next
/// `fill_buffer` call (push) acts on.
pub struct HotplugWatcher {
    shared: Arc<CaptureShared>,
    enumerator: DeviceEnumerator,
}

impl HotplugWatcher {
    pub fn new(shared: Arc<CaptureShared>, enumerator: DeviceEnumerator) -> Self {
        Self { shared, enumerator }
    }

    fn on_state_changed(&self, device_id: &str) {
        let Some(current_id) = self.shared.device_id() else {
            return;
        };

        let selection = self.shared.selection();
        let list = self.enumerator.list();
        let current_index = list.index_of_id(&current_id);

        if selection == DEFAULT_DEVICE_INDEX {
            // Default selections follow default-change notifications, except
            // when the concrete device behind the default disappears.
            if device_id == current_id && current_index.is_none() && self.shared.is_capturing() {
                log::info!(
                    target: LOG_TARGET,
                    "Default audio device {} is gone, restarting capture.",
                    current_id
                );
                self.shared.request_restart();
            }
            return;
        }

        match current_index {
            Some(index) => {
                if index != selection && self.shared.replace_selection(selection, index) {
                    log::debug!(
                        target: LOG_TARGET,
                        "Audio device {} moved from index {} to {}.",
                        current_id,
                        selection,
                        index
                    );
                }
            }
            None => {
                if self.shared.replace_selection(selection, DEFAULT_DEVICE_INDEX) {
                    log::info!(
                        target: LOG_TARGET,
                        "Audio device {} (ID {}) is gone, falling back to the default device.",
                        current_id,
                        selection
                    );
                }
                if self.shared.is_capturing() {
                    self.shared.request_restart();
                }
            }
        }
    }

    fn on_default_changed(&self, flow: DataFlow) {
        if flow != DataFlow::Render || self.shared.selection() != DEFAULT_DEVICE_INDEX {
            return;
        }
        if self.shared.is_capturing() {
            log::info!(target: LOG_TARGET, "Default playback device changed, restarting capture.");
            self.shared.request_restart();
        }
    }
}

impl NotificationSink for HotplugWatcher {
    fn notify(&self, notification: DeviceNotification) {
        match notification {
            DeviceNotification::StateChanged { device_id, state } => {
                log::trace!(
                    target: LOG_TARGET,
                    "Audio device state changed for device ID {}: {:?}",
                    device_id,
                    state
                );
                self.on_state_changed(&device_id);
            }
            DeviceNotification::DefaultChanged { flow, role, device_id } => {
                log::trace!(
                    target: LOG_TARGET,
                    "Default {:?}/{:?} audio device changed to ID {}",
                    flow,
                    role,
                    device_id.as_deref().unwrap_or("<none>")
                );
                self.on_default_changed(flow);
            }
            // Arrival and removal are always followed by a state change.
            DeviceNotification::Added { device_id } => {
                log::trace!(target: LOG_TARGET, "Audio device added: {}", device_id);
            }
            DeviceNotification::Removed { device_id } => {
                log::trace!(target: LOG_TARGET, "Audio device removed: {}", device_id);
            }
            DeviceNotification::PropertyChanged { device_id } => {
                log::trace!(
                    target: LOG_TARGET,
                    "Audio device property changed for device ID {}",
                    device_id
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::SimulatedBackend;
    use crate::models::audio_models::{DeviceRole, DeviceState};
    use crate::traits::capture_backend::CaptureModel;

    fn setup() -> (Arc<SimulatedBackend>, Arc<CaptureShared>, HotplugWatcher) {
        let backend = SimulatedBackend::new(CaptureModel::Pull);
        backend.add_device("spk", "Speakers", true);
        backend.add_device("mic-1", "Microphone", false);
        backend.add_device("mic-2", "Line In", false);
        let shared = Arc::new(CaptureShared::new());
        let watcher = HotplugWatcher::new(Arc::clone(&shared), DeviceEnumerator::new(backend.clone()));
        (backend, shared, watcher)
    }

    fn state_changed(id: &str, state: DeviceState) -> DeviceNotification {
        DeviceNotification::StateChanged {
            device_id: id.to_string(),
            state,
        }
    }

    #[test]
    fn unrelated_device_change_only_refreshes_ordinal() {
        let (backend, shared, watcher) = setup();
        shared.set_capturing(true);
        shared.set_selection(2);
        shared.set_device_id(Some("mic-2".into()));

        backend.set_device_active("mic-1", false);
        watcher.notify(state_changed("mic-1", DeviceState::Unplugged));

        assert_eq!(shared.selection(), 1);
        assert!(!shared.restart_requested());
    }

    #[test]
    fn vanished_current_device_requests_restart_to_default() {
        let (backend, shared, watcher) = setup();
        shared.set_capturing(true);
        shared.set_selection(1);
        shared.set_device_id(Some("mic-1".into()));

        backend.set_device_active("mic-1", false);
        watcher.notify(state_changed("mic-1", DeviceState::NotPresent));

        assert_eq!(shared.selection(), -1);
        assert!(shared.restart_requested());
    }

    #[test]
    fn default_change_restarts_only_default_render_selection() {
        let (_backend, shared, watcher) = setup();
        shared.set_capturing(true);
        let render = DeviceNotification::DefaultChanged {
            flow: DataFlow::Render,
            role: DeviceRole::Console,
            device_id: Some("spk".into()),
        };
        let capture = DeviceNotification::DefaultChanged {
            flow: DataFlow::Capture,
            role: DeviceRole::Console,
            device_id: Some("mic-1".into()),
        };

        shared.set_selection(1);
        watcher.notify(render.clone());
        assert!(!shared.restart_requested());

        shared.set_selection(-1);
        watcher.notify(capture);
        assert!(!shared.restart_requested());

        watcher.notify(render);
        assert!(shared.restart_requested());
    }

    #[test]
    fn added_and_removed_are_ignored() {
        let (_backend, shared, watcher) = setup();
        shared.set_capturing(true);
        shared.set_selection(0);
        shared.set_device_id(Some("spk".into()));

        watcher.notify(DeviceNotification::Removed {
            device_id: "spk".into(),
        });
        watcher.notify(DeviceNotification::Added {
            device_id: "new".into(),
        });

        assert_eq!(shared.selection(), 0);
        assert!(!shared.restart_requested());
    }

    #[test]
    fn idle_facade_is_not_restarted() {
        let (backend, shared, watcher) = setup();
        shared.set_selection(1);
        shared.set_device_id(Some("mic-1".into()));

        backend.set_device_active("mic-1", false);
        watcher.notify(state_changed("mic-1", DeviceState::Disabled));

        assert_eq!(shared.selection(), -1);
        assert!(!shared.restart_requested());
    }
}
