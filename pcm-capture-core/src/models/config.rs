use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::audio_models::{DeviceList, DEFAULT_DEVICE_INDEX};
use super::error::CaptureError;

/// Smallest buffer a push backend requests, enough for 144 FPS at 44.1 kHz.
pub const MIN_BUFFER_FRAMES: u32 = 300;

/// Initial device selection as written in a configuration file.
///
/// Accepts either a JSON number (`"device": 2`) or a string
/// (`"device": "Microphone"` or `"device": "2"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceSelector {
    Index(i32),
    Name(String),
}

impl Default for DeviceSelector {
    fn default() -> Self {
        Self::Index(DEFAULT_DEVICE_INDEX)
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{}", index),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl DeviceSelector {
    /// Parses a command-line value. Numeric text becomes an index.
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<i32>() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Name(value.to_string()),
        }
    }

    /// Resolves this selector against a device snapshot.
    ///
    /// An integer (or integer-looking string) inside the list bounds wins.
    /// Otherwise the raw text is matched exactly, case-sensitively, against
    /// device names. Anything unresolved falls back to the default device.
    pub fn resolve(&self, list: &DeviceList) -> i32 {
        let text = self.to_string();
        let parsed = match self {
            Self::Index(index) => Some(*index),
            Self::Name(name) => name.trim().parse::<i32>().ok(),
        };

        if let Some(index) = parsed {
            if list.contains_index(index) {
                return index;
            }
        }

        if let Some(index) = list.index_of_name(&text) {
            return index;
        }

        log::debug!(
            target: "pcm_capture::facade",
            "Configured audio device \"{}\" not found, using default device.",
            text
        );
        DEFAULT_DEVICE_INDEX
    }
}

/// Configuration for the capture facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfiguration {
    /// Initial device, by index or by name (default: system default).
    pub device: DeviceSelector,

    /// Print the device list when the facade starts.
    pub list_devices: bool,

    /// How long `fill_buffer` waits for the capture thread, in milliseconds (default: 20).
    pub fill_timeout_ms: u64,

    /// How long the capture thread sleeps between fill requests before
    /// re-checking its flags, in milliseconds (default: 500).
    pub capture_wait_ms: u64,

    /// Sample rate requested from push backends (default: 44100).
    pub requested_sample_rate: u32,

    /// Channel count requested from push backends (default: 2).
    pub requested_channels: u16,

    /// Render frame rate the buffer size is derived from (default: 60, 0 = unset).
    pub target_fps: u32,

    /// Upper bound on the requested buffer size in frames (default: 576).
    pub max_buffer_frames: u32,
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            device: DeviceSelector::default(),
            list_devices: false,
            fill_timeout_ms: 20,
            capture_wait_ms: 500,
            requested_sample_rate: 44100,
            requested_channels: 2,
            target_fps: 60,
            max_buffer_frames: 576,
        }
    }
}

impl CaptureConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.fill_timeout_ms == 0 {
            return Err("fill timeout must be positive".into());
        }
        if self.capture_wait_ms == 0 {
            return Err("capture wait must be positive".into());
        }
        if self.requested_sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.requested_channels) {
            return Err(format!("unsupported channel count: {}", self.requested_channels));
        }
        if self.max_buffer_frames < MIN_BUFFER_FRAMES {
            return Err(format!(
                "max buffer frames must be at least {}",
                MIN_BUFFER_FRAMES
            ));
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CaptureError::ConfigurationFailed(format!("invalid configuration: {}", e)))?;
        config.validate().map_err(CaptureError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn fill_timeout(&self) -> Duration {
        Duration::from_millis(self.fill_timeout_ms)
    }

    pub fn capture_wait(&self) -> Duration {
        Duration::from_millis(self.capture_wait_ms)
    }

    /// Buffer size for push backends: one render frame of audio,
    /// bounded to `[MIN_BUFFER_FRAMES, max_buffer_frames]`.
    pub fn requested_buffer_frames(&self) -> u32 {
        let mut frames = self.max_buffer_frames;
        if self.target_fps > 0 {
            frames = (self.requested_sample_rate / self.target_fps).min(frames);
            frames = frames.max(MIN_BUFFER_FRAMES);
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::Endpoint;

    fn list() -> DeviceList {
        DeviceList::from_endpoints(
            "Default",
            vec![
                Endpoint::new("a", "Speakers (loopback)", true),
                Endpoint::new("b", "Microphone", false),
                Endpoint::new("c", "7", false),
            ],
        )
    }

    #[test]
    fn index_in_bounds_resolves() {
        assert_eq!(DeviceSelector::Index(1).resolve(&list()), 1);
        assert_eq!(DeviceSelector::Index(-1).resolve(&list()), -1);
    }

    #[test]
    fn name_resolves_to_same_index_as_number() {
        let list = list();
        assert_eq!(
            DeviceSelector::Name("Microphone".into()).resolve(&list),
            DeviceSelector::Index(1).resolve(&list)
        );
    }

    #[test]
    fn numeric_string_parses_first() {
        assert_eq!(DeviceSelector::Name("0".into()).resolve(&list()), 0);
    }

    #[test]
    fn out_of_range_number_falls_back_to_name_match() {
        assert_eq!(DeviceSelector::Index(7).resolve(&list()), 2);
    }

    #[test]
    fn unknown_selection_falls_back_to_default() {
        let list = list();
        assert_eq!(DeviceSelector::Name("Headset".into()).resolve(&list), -1);
        assert_eq!(DeviceSelector::Name("microphone".into()).resolve(&list), -1);
        assert_eq!(DeviceSelector::Index(42).resolve(&list), -1);
    }

    #[test]
    fn parse_command_line_values() {
        assert_eq!(DeviceSelector::parse("3"), DeviceSelector::Index(3));
        assert_eq!(DeviceSelector::parse("-1"), DeviceSelector::Index(-1));
        assert_eq!(
            DeviceSelector::parse("Line In"),
            DeviceSelector::Name("Line In".into())
        );
    }

    #[test]
    fn json_accepts_number_or_name() {
        let by_index = CaptureConfiguration::from_json_str(r#"{ "device": 2 }"#).unwrap();
        assert_eq!(by_index.device, DeviceSelector::Index(2));

        let by_name =
            CaptureConfiguration::from_json_str(r#"{ "device": "Microphone", "list_devices": true }"#)
                .unwrap();
        assert_eq!(by_name.device, DeviceSelector::Name("Microphone".into()));
        assert!(by_name.list_devices);
        assert_eq!(by_name.fill_timeout_ms, 20);
    }

    #[test]
    fn json_rejects_invalid_values() {
        let err = CaptureConfiguration::from_json_str(r#"{ "requested_channels": 6 }"#).unwrap_err();
        assert!(matches!(err, CaptureError::ConfigurationFailed(_)));
    }

    #[test]
    fn buffer_frames_follow_target_fps() {
        let mut config = CaptureConfiguration::default();
        assert_eq!(config.requested_buffer_frames(), 576);

        config.target_fps = 144;
        assert_eq!(config.requested_buffer_frames(), 306);

        config.target_fps = 240;
        assert_eq!(config.requested_buffer_frames(), MIN_BUFFER_FRAMES);

        config.target_fps = 0;
        assert_eq!(config.requested_buffer_frames(), 576);
    }
}
