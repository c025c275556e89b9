//! cpal implementation of [`CaptureBackend`].

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait};

use pcm_capture_core::models::audio_models::{DeviceTarget, Endpoint, StreamRequest};
use pcm_capture_core::models::error::CaptureError;
use pcm_capture_core::traits::capture_backend::{CaptureBackend, CaptureModel, CaptureStream};
use pcm_capture_core::traits::consumer::SharedConsumer;
use pcm_capture_core::traits::notification::NotificationSink;

use crate::cpal_stream::CpalStream;

const LOG_TARGET: &str = "pcm_capture::portable";

/// PulseAudio and PipeWire expose the mix of each sink as an input
/// source with this prefix.
const MONITOR_PREFIX: &str = "Monitor of";

/// Whether an input device name denotes a playback monitor source.
pub fn is_monitor_source(name: &str) -> bool {
    name.starts_with(MONITOR_PREFIX)
}

/// Callback-driven backend on top of the platform's default cpal host.
///
/// cpal has no stable device identifier, so device names double as ids.
/// Device loss is only observed through the stream error callback; there
/// is no OS notification subscription.
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }

    fn find_input(name: &str) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| CaptureError::EnumerationFailed(e.to_string()))?;
        for device in devices {
            if device.name().map(|n| n == name).unwrap_or(false) {
                return Ok(device);
            }
        }
        Err(CaptureError::DeviceNotAvailable)
    }
}

impl CaptureBackend for CpalBackend {
    fn name(&self) -> &str {
        "portable"
    }

    fn model(&self) -> CaptureModel {
        CaptureModel::Push
    }

    fn default_device_name(&self) -> &str {
        "Default capturing device"
    }

    fn enumerate(&self) -> Result<Vec<Endpoint>, CaptureError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| CaptureError::EnumerationFailed(e.to_string()))?;

        let mut monitors = Vec::new();
        let mut inputs = Vec::new();
        for device in devices {
            let name = match device.name() {
                Ok(name) => name,
                Err(e) => {
                    log::debug!(target: LOG_TARGET, "Skipping input device without a name: {}", e);
                    continue;
                }
            };
            if is_monitor_source(&name) {
                monitors.push(Endpoint::new(name.clone(), name, true));
            } else {
                inputs.push(Endpoint::new(name.clone(), name, false));
            }
        }

        log::trace!(
            target: LOG_TARGET,
            "{} host reports {} monitor and {} input devices.",
            host.id().name(),
            monitors.len(),
            inputs.len()
        );
        monitors.extend(inputs);
        Ok(monitors)
    }

    fn open(
        &self,
        target: &DeviceTarget,
        request: &StreamRequest,
        consumer: SharedConsumer,
        notifications: Arc<dyn NotificationSink>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let (device, id) = match target {
            DeviceTarget::Default => {
                let device = cpal::default_host()
                    .default_input_device()
                    .ok_or(CaptureError::DeviceNotAvailable)?;
                let id = device
                    .name()
                    .map_err(|e| CaptureError::open_failed(self.default_device_name(), e))?;
                (device, id)
            }
            DeviceTarget::Device(selected) => (Self::find_input(&selected.id)?, selected.id.clone()),
        };

        Ok(Box::new(CpalStream::open(&device, id, request, consumer, notifications)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_sources_are_loopback() {
        assert!(is_monitor_source("Monitor of Built-in Audio Analog Stereo"));
        assert!(!is_monitor_source("Built-in Audio Analog Stereo"));
        assert!(!is_monitor_source("USB Monitor of Doom"));
    }

    #[test]
    fn backend_identity() {
        let backend = CpalBackend::new();
        assert_eq!(backend.name(), "portable");
        assert_eq!(backend.model(), CaptureModel::Push);
        assert_eq!(backend.default_device_name(), "Default capturing device");
    }
}
