use std::sync::Arc;

use crate::models::audio_models::{
    DeviceList, DeviceTarget, StreamFormat, StreamRequest, DEFAULT_DEVICE_INDEX,
};
use crate::models::error::CaptureError;
use crate::models::format::MixFormat;
use crate::session::shared::CaptureShared;
use crate::traits::capture_backend::{CaptureBackend, CaptureStream};
use crate::traits::consumer::SharedConsumer;
use crate::traits::notification::NotificationSink;

const LOG_TARGET: &str = "pcm_capture::session";

/// Accepts an OS mix format if it carries IEEE float samples.
///
/// Float is accepted directly or as the sub format of an extensible
/// format. Samples must be 32-bit since consumers receive `f32`.
/// Returns the granted channel count and rate, which are the device's own
/// and may differ from anything requested.
pub fn negotiate_format(mix: &MixFormat) -> Result<StreamFormat, CaptureError> {
    if !mix.is_float() {
        return Err(CaptureError::FormatUnsupported(format!(
            "mix format is not IEEE float: {}",
            mix
        )));
    }
    if mix.bits_per_sample != 32 {
        return Err(CaptureError::FormatUnsupported(format!(
            "float samples must be 32-bit: {}",
            mix
        )));
    }
    if mix.channels == 0 || mix.sample_rate == 0 {
        return Err(CaptureError::FormatUnsupported(format!("empty mix format: {}", mix)));
    }
    Ok(StreamFormat {
        channels: mix.channels,
        sample_rate: mix.sample_rate,
    })
}

/// The single open OS stream of a facade.
pub struct CaptureSession {
    selected_index: i32,
    device_name: String,
    device_id: Option<String>,
    format: StreamFormat,
    stream: Box<dyn CaptureStream>,
    is_open: bool,
}

impl CaptureSession {
    /// Resolves `index` against `list` and opens it.
    ///
    /// Indices outside the snapshot resolve to the default device. The
    /// default device of loopback-first backends is the default render
    /// endpoint opened in loopback mode.
    pub fn open(
        backend: &dyn CaptureBackend,
        list: &DeviceList,
        index: i32,
        request: &StreamRequest,
        consumer: SharedConsumer,
        notifications: Arc<dyn NotificationSink>,
    ) -> Result<Self, CaptureError> {
        let target = list.target(index);
        let device_name = match &target {
            DeviceTarget::Default => list.default_name().to_string(),
            DeviceTarget::Device(device) => device.name.clone(),
        };

        let stream = backend
            .open(&target, request, consumer, notifications)
            .inspect_err(|e| {
                log::error!(
                    target: LOG_TARGET,
                    "Failed to open audio device \"{}\" (ID {}): {}",
                    device_name,
                    target.index(),
                    e
                );
            })?;

        let format = stream.format();
        let device_id = stream.device_id();
        let loopback = matches!(&target, DeviceTarget::Device(d) if d.is_loopback);

        log::info!(
            target: LOG_TARGET,
            "Opened audio recording device \"{}\" (ID {}) with {} channels at {} Hz (loopback: {}).",
            device_name,
            target.index(),
            format.channels,
            format.sample_rate,
            loopback
        );

        Ok(Self {
            selected_index: target.index(),
            device_name,
            device_id,
            format,
            stream,
            is_open: true,
        })
    }

    /// Opens the shared selection, or the device a hot-plug restart should
    /// move to, and records the index actually opened.
    ///
    /// A device that vanished between selection and open falls back to the
    /// default device.
    pub(crate) fn open_selected(
        backend: &dyn CaptureBackend,
        list: &DeviceList,
        shared: &CaptureShared,
        request: &StreamRequest,
        consumer: &SharedConsumer,
        notifications: &Arc<dyn NotificationSink>,
        restarting: bool,
    ) -> Result<Self, CaptureError> {
        let selection = shared.selection();
        let mut index = if restarting {
            shared.restart_index(list)
        } else {
            selection
        };
        if !list.contains_index(index) {
            index = DEFAULT_DEVICE_INDEX;
        }

        let open = |index: i32| {
            Self::open(
                backend,
                list,
                index,
                request,
                Arc::clone(consumer),
                Arc::clone(notifications),
            )
        };

        let session = match open(index) {
            Err(e) if index != DEFAULT_DEVICE_INDEX && (restarting || e == CaptureError::DeviceNotAvailable) => {
                log::warn!(
                    target: LOG_TARGET,
                    "Audio device (ID {}) vanished before it could be opened, using default device: {}",
                    index,
                    e
                );
                open(DEFAULT_DEVICE_INDEX)?
            }
            other => other?,
        };

        let current = shared.selection();
        if current != session.selected_index() {
            shared.replace_selection(current, session.selected_index());
        }
        shared.set_device_id(session.device_id().map(str::to_string));
        Ok(session)
    }

    /// The index this session was opened with; `-1` if it fell back to default.
    pub fn selected_index(&self) -> i32 {
        self.selected_index
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Drains all queued audio to the consumer. No-op once closed.
    pub fn pump(&mut self) -> Result<usize, CaptureError> {
        if !self.is_open {
            return Ok(0);
        }
        let frames = self.stream.pump()?;
        log::trace!(target: LOG_TARGET, "Audio frames delivered: {}", frames);
        Ok(frames)
    }

    /// Stops and releases the stream. Safe to call when already closed.
    pub fn close(&mut self) {
        if !self.is_open {
            return;
        }
        self.stream.close();
        self.is_open = false;
        log::debug!(target: LOG_TARGET, "Audio device \"{}\" closed.", self.device_name);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}
