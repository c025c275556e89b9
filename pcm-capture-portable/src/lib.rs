//! # pcm-capture-portable
//!
//! Cross-platform capture backend built on cpal.
//!
//! Audio arrives on cpal's callback thread and is handed to the consumer
//! directly, so the facade runs this backend in push mode and
//! `fill_buffer` does not wait for anything.
//!
//! Playback capture depends on the host: PulseAudio and PipeWire expose
//! "Monitor of ..." sources, which are listed first and flagged as loopback.

pub mod cpal_backend;
pub mod cpal_stream;

pub use cpal_backend::{is_monitor_source, CpalBackend};
pub use cpal_stream::CpalStream;
