use crate::models::audio_models::{DataFlow, DeviceRole, DeviceState};

/// An OS device-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceNotification {
    StateChanged {
        device_id: String,
        state: DeviceState,
    },
    DefaultChanged {
        flow: DataFlow,
        role: DeviceRole,
        /// `None` when no default endpoint remains for this flow.
        device_id: Option<String>,
    },
    Added {
        device_id: String,
    },
    Removed {
        device_id: String,
    },
    PropertyChanged {
        device_id: String,
    },
}

/// Receiver of device-change notifications.
///
/// Called on an OS-owned thread. Implementations must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: DeviceNotification);
}

/// A live notification subscription. Dropping it unsubscribes.
pub trait NotificationRegistration {}

impl NotificationRegistration for () {}
