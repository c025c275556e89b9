//! # pcm-capture-windows
//!
//! Windows WASAPI backend for pcm-capture.
//!
//! Provides:
//! - `WasapiBackend`: pull-model [`CaptureBackend`](pcm_capture_core::CaptureBackend)
//! - `DeviceEnumerator`: render and capture endpoints via the MMDevice API
//! - `WasapiStream`: shared-mode stream, loopback for render endpoints
//! - `WasapiRegistration`: `IMMNotificationClient` hot-plug forwarding
//!
//! ## Platform Requirements
//! - Windows Vista+ for WASAPI loopback
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use pcm_capture_core::{AudioCapture, CaptureConfiguration};
//! use pcm_capture_windows::WasapiBackend;
//!
//! let mut capture = AudioCapture::new(Arc::new(WasapiBackend::new()), CaptureConfiguration::default())?;
//! capture.start_recording(consumer, -1);
//! loop {
//!     capture.fill_buffer();
//!     // render
//! }
//! ```

#[cfg(target_os = "windows")]
pub mod backend;
#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod notification;
#[cfg(target_os = "windows")]
pub mod wasapi_stream;

#[cfg(target_os = "windows")]
pub use backend::WasapiBackend;
#[cfg(target_os = "windows")]
pub use device_enumerator::DeviceEnumerator;
#[cfg(target_os = "windows")]
pub use notification::WasapiRegistration;
#[cfg(target_os = "windows")]
pub use wasapi_stream::WasapiStream;
