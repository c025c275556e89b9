use std::sync::Arc;

use crate::models::audio_models::{DeviceList, Endpoint};
use crate::traits::capture_backend::CaptureBackend;

const LOG_TARGET: &str = "pcm_capture::enumerator";

/// Produces fresh device snapshots from a backend.
///
/// Nothing is cached: every call enumerates the OS again, so ordinals
/// always reflect the latest hot-plug state.
#[derive(Clone)]
pub struct DeviceEnumerator {
    backend: Arc<dyn CaptureBackend>,
}

impl DeviceEnumerator {
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self { backend }
    }

    /// Lists active devices: loopback-capable endpoints first, then capture
    /// endpoints, each group in OS order. The default entry (`-1`) is implicit.
    ///
    /// Enumeration failures are logged and yield a default-only list.
    pub fn list(&self) -> DeviceList {
        let default_name = self.backend.default_device_name();
        match self.backend.enumerate() {
            Ok(endpoints) => {
                let (loopback, capture): (Vec<Endpoint>, Vec<Endpoint>) =
                    endpoints.into_iter().partition(|ep| ep.is_loopback);
                let list = DeviceList::from_endpoints(default_name, loopback.into_iter().chain(capture));
                for device in list.iter() {
                    log::trace!(
                        target: LOG_TARGET,
                        "Found {} audio device \"{}\" with ID {} (loopback: {})",
                        self.backend.name(),
                        device.name,
                        device.id,
                        device.is_loopback
                    );
                }
                list
            }
            Err(e) => {
                log::error!(
                    target: LOG_TARGET,
                    "Listing {} audio devices failed, only the default device is available: {}",
                    self.backend.name(),
                    e
                );
                DeviceList::default_only(default_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulated::SimulatedBackend;
    use crate::traits::capture_backend::CaptureModel;

    #[test]
    fn loopback_devices_come_first_in_os_order() {
        let backend = SimulatedBackend::new(CaptureModel::Pull);
        backend.add_device("mic-1", "Microphone", false);
        backend.add_device("spk-1", "Speakers", true);
        backend.add_device("mic-2", "Line In", false);
        backend.add_device("spk-2", "Headphones", true);

        let list = DeviceEnumerator::new(backend).list();
        let names: Vec<&str> = list.iter().map(|d| d.name.as_str()).collect();

        assert_eq!(names, vec!["Speakers", "Headphones", "Microphone", "Line In"]);
        assert_eq!(list.index_of_name("Line In"), Some(3));
    }

    #[test]
    fn failure_degrades_to_default_only() {
        let backend = SimulatedBackend::new(CaptureModel::Pull);
        backend.add_device("mic-1", "Microphone", false);
        backend.fail_enumeration(true);

        let list = DeviceEnumerator::new(backend.clone()).list();

        assert!(list.is_empty());
        assert!(list.contains_index(-1));
        assert_eq!(list.default_name(), backend.default_device_name());
    }

    #[test]
    fn inactive_devices_are_not_listed() {
        let backend = SimulatedBackend::new(CaptureModel::Pull);
        backend.add_device("mic-1", "Microphone", false);
        backend.add_device("mic-2", "Line In", false);
        backend.set_device_active("mic-1", false);

        let list = DeviceEnumerator::new(backend).list();

        assert_eq!(list.len(), 1);
        assert_eq!(list.index_of_name("Line In"), Some(0));
    }
}
