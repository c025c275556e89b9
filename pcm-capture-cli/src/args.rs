use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use pcm_capture_core::{CaptureConfiguration, DeviceSelector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// WASAPI loopback and capture endpoints (Windows only)
    Wasapi,
    /// cpal input devices on the platform's default host
    Portable,
    /// Scripted in-process devices fed with a test tone
    Simulated,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(target_os = "windows") {
            Self::Wasapi
        } else {
            Self::Portable
        }
    }
}

/// Captures system or microphone audio and drives it with a frame-paced loop.
#[derive(Debug, Parser)]
#[command(name = "pcm-capture", version, about)]
pub struct Args {
    /// Configuration file (default: <config dir>/pcm-capture/config.json)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the device list on startup
    #[arg(long)]
    pub list_devices: bool,

    /// Initial device, by index or exact name
    #[arg(long)]
    pub device: Option<String>,

    #[arg(long, value_enum, default_value_t = BackendKind::default())]
    pub backend: BackendKind,

    /// Frames to render before exiting (0 runs until killed)
    #[arg(long, default_value_t = 600)]
    pub frames: u64,

    /// Render frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Switch to the next device every N frames
    #[arg(long)]
    pub cycle_every: Option<u64>,
}

impl Args {
    /// Applies command-line overrides on top of a loaded configuration.
    pub fn apply(&self, config: &mut CaptureConfiguration) {
        if self.list_devices {
            config.list_devices = true;
        }
        if let Some(device) = &self.device {
            config.device = DeviceSelector::parse(device);
        }
        if let Some(fps) = self.fps {
            config.target_fps = fps;
        }
    }

    /// Frame rate the render loop runs at.
    pub fn frame_rate(&self, config: &CaptureConfiguration) -> u32 {
        if config.target_fps > 0 {
            config.target_fps
        } else {
            60
        }
    }
}
