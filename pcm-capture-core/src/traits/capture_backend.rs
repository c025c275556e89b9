use std::sync::Arc;

use crate::models::audio_models::{DeviceTarget, Endpoint, StreamFormat, StreamRequest};
use crate::models::error::CaptureError;
use crate::traits::consumer::SharedConsumer;
use crate::traits::notification::{NotificationRegistration, NotificationSink};

/// How a backend delivers audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureModel {
    /// The OS calls back on its own thread whenever a buffer is ready.
    Push,
    /// Audio is queued by the OS and must be drained with [`CaptureStream::pump`].
    Pull,
}

/// An open OS capture stream.
///
/// Pull streams are opened, pumped and closed on the same capture thread,
/// so implementations may hold thread-confined OS handles.
pub trait CaptureStream {
    /// Channel count and sample rate actually granted.
    fn format(&self) -> StreamFormat;

    /// Backend identifier of the device that was opened.
    ///
    /// For the default target this is the concrete device it resolved to.
    fn device_id(&self) -> Option<String>;

    /// Drains every queued packet into the consumer given at open time.
    ///
    /// Packets flagged silent by the OS are released without delivery.
    /// Returns the number of frames delivered. Push streams return `Ok(0)`.
    fn pump(&mut self) -> Result<usize, CaptureError>;

    /// Stops and releases the stream. Safe to call more than once.
    fn close(&mut self);
}

/// Interface for platform-specific capture backends.
///
/// One implementation per OS API, chosen at process startup:
/// - `WasapiBackend` (Windows, pull)
/// - `CpalBackend` (portable, push)
/// - [`SimulatedBackend`](crate::SimulatedBackend) (either model)
pub trait CaptureBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    fn model(&self) -> CaptureModel;

    /// List label of the reserved default entry (index `-1`).
    fn default_device_name(&self) -> &str;

    /// Active endpoints usable for capture.
    ///
    /// Loopback-capable endpoints come first, then true capture endpoints,
    /// each group in OS enumeration order.
    fn enumerate(&self) -> Result<Vec<Endpoint>, CaptureError>;

    /// Opens `target` and negotiates an IEEE float stream.
    ///
    /// Push backends forward device-loss errors raised on their callback
    /// thread to `notifications`.
    fn open(
        &self,
        target: &DeviceTarget,
        request: &StreamRequest,
        consumer: SharedConsumer,
        notifications: Arc<dyn NotificationSink>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;

    /// Subscribes `sink` to OS device-change notifications until the
    /// returned registration is dropped.
    ///
    /// Backends without OS notifications return an inert registration.
    fn register_notifications(
        &self,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Box<dyn NotificationRegistration>, CaptureError> {
        let _ = sink;
        Ok(Box::new(()))
    }
}
