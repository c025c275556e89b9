//! WASAPI implementation of [`CaptureBackend`].

use std::sync::Arc;

use pcm_capture_core::models::audio_models::{DeviceTarget, Endpoint, StreamRequest};
use pcm_capture_core::models::error::CaptureError;
use pcm_capture_core::traits::capture_backend::{CaptureBackend, CaptureModel, CaptureStream};
use pcm_capture_core::traits::consumer::SharedConsumer;
use pcm_capture_core::traits::notification::{NotificationRegistration, NotificationSink};

use crate::device_enumerator::DeviceEnumerator;
use crate::notification::WasapiRegistration;
use crate::wasapi_stream::WasapiStream;

/// Windows capture backend using the synchronous-pull model.
///
/// Holds no COM objects itself: each call creates what it needs on the
/// calling thread, so the backend can be shared across threads.
#[derive(Debug, Default)]
pub struct WasapiBackend;

impl WasapiBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for WasapiBackend {
    fn name(&self) -> &str {
        "wasapi"
    }

    fn model(&self) -> CaptureModel {
        CaptureModel::Pull
    }

    fn default_device_name(&self) -> &str {
        "System Default Playback Device"
    }

    fn enumerate(&self) -> Result<Vec<Endpoint>, CaptureError> {
        DeviceEnumerator::new()?.list_endpoints()
    }

    fn open(
        &self,
        target: &DeviceTarget,
        _request: &StreamRequest,
        consumer: SharedConsumer,
        _notifications: Arc<dyn NotificationSink>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let enumerator = DeviceEnumerator::new()?;
        let (device, loopback) = match target {
            DeviceTarget::Default => (enumerator.default_render_device()?, true),
            DeviceTarget::Device(device) => (enumerator.device(&device.id)?, device.is_loopback),
        };
        Ok(Box::new(WasapiStream::open(&device, loopback, consumer)?))
    }

    fn register_notifications(
        &self,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Box<dyn NotificationRegistration>, CaptureError> {
        Ok(Box::new(WasapiRegistration::register(sink)?))
    }
}
