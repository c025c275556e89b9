//! In-process capture backend with scripted devices.
//!
//! Behaves like an OS backend in either concurrency model: devices can be
//! plugged, unplugged and made default at runtime, each change raising the
//! same notifications a real OS would. Audio is injected with
//! [`SimulatedBackend::push_audio`]. Used by the test suite and by headless
//! runs of the command-line driver.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{
    DataFlow, DeviceRole, DeviceState, DeviceTarget, Endpoint, StreamFormat, StreamRequest,
};
use crate::models::error::CaptureError;
use crate::models::format::{MixFormat, SampleEncoding};
use crate::session::capture_session::negotiate_format;
use crate::traits::capture_backend::{CaptureBackend, CaptureModel, CaptureStream};
use crate::traits::consumer::SharedConsumer;
use crate::traits::notification::{DeviceNotification, NotificationRegistration, NotificationSink};

const LOG_TARGET: &str = "pcm_capture::simulated";

const LOOPBACK_DEFAULT_NAME: &str = "System Default Playback Device";
const CAPTURE_DEFAULT_NAME: &str = "Default capturing device";

struct Packet {
    samples: Vec<f32>,
    silent: bool,
}

struct SimDevice {
    endpoint: Endpoint,
    active: bool,
    format: MixFormat,
    queue: VecDeque<Packet>,
}

struct PushTap {
    stream_id: u64,
    device_id: String,
    channels: u16,
    consumer: SharedConsumer,
}

#[derive(Default)]
struct SimState {
    devices: Vec<SimDevice>,
    default_render: Option<String>,
    default_capture: Option<String>,
    fail_enumeration: bool,
    fail_open: HashSet<String>,
    sinks: Vec<(u64, Arc<dyn NotificationSink>)>,
    taps: Vec<PushTap>,
    next_id: u64,
    open_streams: usize,
    open_history: Vec<String>,
}

impl SimState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn device(&self, id: &str) -> Option<&SimDevice> {
        self.devices.iter().find(|d| d.endpoint.id == id)
    }

    fn device_mut(&mut self, id: &str) -> Option<&mut SimDevice> {
        self.devices.iter_mut().find(|d| d.endpoint.id == id)
    }

    fn is_active(&self, id: &str) -> bool {
        self.device(id).is_some_and(|d| d.active)
    }

    fn resolve_default(&self) -> Option<String> {
        [&self.default_render, &self.default_capture]
            .into_iter()
            .flatten()
            .find(|id| self.is_active(id))
            .cloned()
    }

    fn first_active(&self, loopback: bool, except: &str) -> Option<String> {
        self.devices
            .iter()
            .find(|d| d.active && d.endpoint.is_loopback == loopback && d.endpoint.id != except)
            .map(|d| d.endpoint.id.clone())
    }
}

/// Scripted capture backend.
pub struct SimulatedBackend {
    model: CaptureModel,
    default_name: &'static str,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBackend {
    /// Creates a backend without devices.
    ///
    /// Pull backends label the default entry like a loopback-first OS API,
    /// push backends like an input-first one.
    pub fn new(model: CaptureModel) -> Arc<Self> {
        let default_name = match model {
            CaptureModel::Pull => LOOPBACK_DEFAULT_NAME,
            CaptureModel::Push => CAPTURE_DEFAULT_NAME,
        };
        Arc::new(Self {
            model,
            default_name,
            state: Arc::new(Mutex::new(SimState::default())),
        })
    }

    /// Adds an active stereo 48 kHz float device without notifying.
    ///
    /// The first device of each direction becomes that direction's default.
    pub fn add_device(&self, id: &str, name: &str, is_loopback: bool) {
        let mut state = self.state.lock();
        state.devices.push(SimDevice {
            endpoint: Endpoint::new(id, name, is_loopback),
            active: true,
            format: MixFormat {
                encoding: SampleEncoding::IeeeFloat,
                channels: 2,
                sample_rate: 48000,
                bits_per_sample: 32,
            },
            queue: VecDeque::new(),
        });
        let slot = if is_loopback {
            &mut state.default_render
        } else {
            &mut state.default_capture
        };
        if slot.is_none() {
            *slot = Some(id.to_string());
        }
    }

    /// Changes a device's active state without notifying.
    pub fn set_device_active(&self, id: &str, active: bool) {
        if let Some(device) = self.state.lock().device_mut(id) {
            device.active = active;
        }
    }

    /// Replaces the mix format a device offers.
    pub fn set_device_format(&self, id: &str, format: MixFormat) {
        if let Some(device) = self.state.lock().device_mut(id) {
            device.format = format;
        }
    }

    /// Sets the default device of a direction without notifying.
    pub fn set_default_device(&self, flow: DataFlow, id: &str) {
        let mut state = self.state.lock();
        match flow {
            DataFlow::Render => state.default_render = Some(id.to_string()),
            DataFlow::Capture => state.default_capture = Some(id.to_string()),
        }
    }

    /// Makes enumeration fail until reset.
    pub fn fail_enumeration(&self, fail: bool) {
        self.state.lock().fail_enumeration = fail;
    }

    /// Makes opening the given device fail until reset.
    pub fn fail_open(&self, id: &str, fail: bool) {
        let mut state = self.state.lock();
        if fail {
            state.fail_open.insert(id.to_string());
        } else {
            state.fail_open.remove(id);
        }
    }

    /// Unplugs a device the way an OS reports it.
    ///
    /// If it was the default render device, the next active loopback device
    /// takes over and a default-change notification follows.
    pub fn unplug(&self, id: &str) {
        let new_default = {
            let mut state = self.state.lock();
            let Some(device) = state.device_mut(id) else {
                return;
            };
            device.active = false;
            device.queue.clear();
            if state.default_render.as_deref() == Some(id) {
                let next = state.first_active(true, id);
                state.default_render = next.clone();
                Some(next)
            } else {
                None
            }
        };

        self.notify(DeviceNotification::StateChanged {
            device_id: id.to_string(),
            state: DeviceState::Unplugged,
        });
        if let Some(device_id) = new_default {
            self.notify(DeviceNotification::DefaultChanged {
                flow: DataFlow::Render,
                role: DeviceRole::Console,
                device_id,
            });
        }
    }

    /// Plugs a previously unplugged device back in.
    pub fn replug(&self, id: &str) {
        self.set_device_active(id, true);
        self.notify(DeviceNotification::StateChanged {
            device_id: id.to_string(),
            state: DeviceState::Active,
        });
    }

    /// Makes `id` the default render device and notifies.
    pub fn switch_default_render(&self, id: &str) {
        self.set_default_device(DataFlow::Render, id);
        self.notify(DeviceNotification::DefaultChanged {
            flow: DataFlow::Render,
            role: DeviceRole::Console,
            device_id: Some(id.to_string()),
        });
    }

    /// Delivers a notification to every registered sink.
    pub fn notify(&self, notification: DeviceNotification) {
        let sinks: Vec<Arc<dyn NotificationSink>> =
            self.state.lock().sinks.iter().map(|(_, s)| Arc::clone(s)).collect();
        for sink in sinks {
            sink.notify(notification.clone());
        }
    }

    /// Injects interleaved samples on a device.
    ///
    /// Pull backends queue them until pumped. Push backends call the
    /// consumers of open streams on that device right away, on the caller's
    /// thread; silent blocks are dropped as a callback API would never
    /// report them.
    pub fn push_audio(&self, device_id: &str, samples: &[f32], silent: bool) {
        match self.model {
            CaptureModel::Pull => {
                if let Some(device) = self.state.lock().device_mut(device_id) {
                    if device.active {
                        device.queue.push_back(Packet {
                            samples: samples.to_vec(),
                            silent,
                        });
                    }
                }
            }
            CaptureModel::Push => {
                if silent {
                    return;
                }
                let taps: Vec<(SharedConsumer, u16)> = self
                    .state
                    .lock()
                    .taps
                    .iter()
                    .filter(|t| t.device_id == device_id)
                    .map(|t| (Arc::clone(&t.consumer), t.channels))
                    .collect();
                for (consumer, channels) in taps {
                    consumer.consume(samples, samples.len() / channels as usize, channels);
                }
            }
        }
    }

    /// Streams currently open.
    pub fn open_stream_count(&self) -> usize {
        self.state.lock().open_streams
    }

    /// Device IDs of every stream opened so far, in order.
    pub fn opened_devices(&self) -> Vec<String> {
        self.state.lock().open_history.clone()
    }

    /// Notification subscriptions currently registered.
    pub fn notification_sink_count(&self) -> usize {
        self.state.lock().sinks.len()
    }

    /// Packets waiting to be pumped on a device.
    pub fn queued_packets(&self, device_id: &str) -> usize {
        self.state.lock().device(device_id).map_or(0, |d| d.queue.len())
    }
}

impl CaptureBackend for SimulatedBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn model(&self) -> CaptureModel {
        self.model
    }

    fn default_device_name(&self) -> &str {
        self.default_name
    }

    fn enumerate(&self) -> Result<Vec<Endpoint>, CaptureError> {
        let state = self.state.lock();
        if state.fail_enumeration {
            return Err(CaptureError::EnumerationFailed("simulated enumeration failure".into()));
        }
        Ok(state
            .devices
            .iter()
            .filter(|d| d.active)
            .map(|d| d.endpoint.clone())
            .collect())
    }

    fn open(
        &self,
        target: &DeviceTarget,
        _request: &StreamRequest,
        consumer: SharedConsumer,
        _notifications: Arc<dyn NotificationSink>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let mut state = self.state.lock();

        let device_id = match target {
            DeviceTarget::Default => state.resolve_default().ok_or(CaptureError::DeviceNotAvailable)?,
            DeviceTarget::Device(device) => device.id.clone(),
        };

        let (name, mix) = match state.device(&device_id) {
            Some(device) if device.active => (device.endpoint.name.clone(), device.format),
            _ => return Err(CaptureError::DeviceNotAvailable),
        };
        if state.fail_open.contains(&device_id) {
            return Err(CaptureError::open_failed(name, "simulated activation failure"));
        }
        let format = negotiate_format(&mix)?;

        let stream_id = state.next_id();
        state.open_streams += 1;
        state.open_history.push(device_id.clone());
        if let Some(device) = state.device_mut(&device_id) {
            device.queue.clear();
        }
        if self.model == CaptureModel::Push {
            state.taps.push(PushTap {
                stream_id,
                device_id: device_id.clone(),
                channels: format.channels,
                consumer: Arc::clone(&consumer),
            });
        }

        log::debug!(target: LOG_TARGET, "Opened simulated stream {} on {}", stream_id, device_id);

        Ok(Box::new(SimulatedStream {
            state: Arc::clone(&self.state),
            stream_id,
            device_id,
            format,
            consumer,
            model: self.model,
            closed: false,
        }))
    }

    fn register_notifications(
        &self,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Box<dyn NotificationRegistration>, CaptureError> {
        let mut state = self.state.lock();
        let id = state.next_id();
        state.sinks.push((id, sink));
        Ok(Box::new(SimulatedRegistration {
            state: Arc::clone(&self.state),
            id,
        }))
    }
}

struct SimulatedStream {
    state: Arc<Mutex<SimState>>,
    stream_id: u64,
    device_id: String,
    format: StreamFormat,
    consumer: SharedConsumer,
    model: CaptureModel,
    closed: bool,
}

impl CaptureStream for SimulatedStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn device_id(&self) -> Option<String> {
        Some(self.device_id.clone())
    }

    fn pump(&mut self) -> Result<usize, CaptureError> {
        if self.closed || self.model == CaptureModel::Push {
            return Ok(0);
        }

        let packets: Vec<Packet> = {
            let mut state = self.state.lock();
            match state.device_mut(&self.device_id) {
                Some(device) if device.active => device.queue.drain(..).collect(),
                _ => return Err(CaptureError::DeviceNotAvailable),
            }
        };

        let channels = self.format.channels;
        let mut delivered = 0;
        for packet in packets {
            if packet.silent {
                continue;
            }
            let frames = packet.samples.len() / channels as usize;
            if frames > 0 {
                self.consumer.consume(&packet.samples, frames, channels);
                delivered += frames;
            }
        }
        Ok(delivered)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut state = self.state.lock();
        state.open_streams -= 1;
        let stream_id = self.stream_id;
        state.taps.retain(|t| t.stream_id != stream_id);
    }
}

impl Drop for SimulatedStream {
    fn drop(&mut self) {
        self.close();
    }
}

struct SimulatedRegistration {
    state: Arc<Mutex<SimState>>,
    id: u64,
}

impl NotificationRegistration for SimulatedRegistration {}

impl Drop for SimulatedRegistration {
    fn drop(&mut self) {
        let id = self.id;
        self.state.lock().sinks.retain(|(sink_id, _)| *sink_id != id);
    }
}
