//! # pcm-capture-core
//!
//! Platform-agnostic PCM capture core library.
//!
//! Enumerates capture devices (including playback devices opened in
//! loopback), owns the single open capture stream, and hands raw float
//! frames to a downstream [`Consumer`] at render-loop cadence. OS backends
//! (Windows WASAPI, cpal) implement the [`CaptureBackend`] trait and are
//! chosen at runtime.
//!
//! ## Architecture
//!
//! ```text
//! pcm-capture-core (this crate)
//! ├── traits/    ← CaptureBackend, CaptureStream, Consumer, NotificationSink, CaptureDelegate
//! ├── models/    ← CaptureError, CaptureState, CaptureConfiguration, DeviceList, MixFormat
//! ├── session/   ← DeviceEnumerator, CaptureSession, CaptureThread, HotplugWatcher, AudioCapture
//! ├── sync/      ← binary events, push-callback generation gate
//! └── backends/  ← SimulatedBackend
//! ```

pub mod backends;
pub mod models;
pub mod session;
pub mod sync;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use backends::simulated::SimulatedBackend;
pub use models::audio_models::{
    AudioDevice, DataFlow, DeviceList, DeviceRole, DeviceState, DeviceTarget, Endpoint, StreamFormat,
    StreamRequest, DEFAULT_DEVICE_INDEX, SYSTEM_DEFAULT_NAME,
};
pub use models::config::{CaptureConfiguration, DeviceSelector};
pub use models::error::CaptureError;
pub use models::format::{MixFormat, SampleEncoding, SubFormat};
pub use models::state::CaptureState;
pub use session::capture_session::{negotiate_format, CaptureSession};
pub use session::enumerator::DeviceEnumerator;
pub use session::facade::AudioCapture;
pub use traits::capture_backend::{CaptureBackend, CaptureModel, CaptureStream};
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::consumer::{Consumer, SharedConsumer};
pub use traits::notification::{DeviceNotification, NotificationRegistration, NotificationSink};
