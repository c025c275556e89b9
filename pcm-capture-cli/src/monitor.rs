use std::sync::Arc;

use parking_lot::Mutex;

use pcm_capture_core::{CaptureDelegate, CaptureError, CaptureState, Consumer};

#[derive(Debug, Default, Clone, Copy)]
pub struct LevelStats {
    pub frames: u64,
    pub callbacks: u64,
    pub peak: f32,
}

/// Consumer standing in for a visualizer: counts frames and tracks the peak.
#[derive(Default)]
pub struct LevelMeter {
    stats: Mutex<LevelStats>,
}

impl LevelMeter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stats(&self) -> LevelStats {
        *self.stats.lock()
    }
}

impl Consumer for LevelMeter {
    fn consume(&self, samples: &[f32], frames: usize, _channels: u16) {
        let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
        let mut stats = self.stats.lock();
        stats.frames += frames as u64;
        stats.callbacks += 1;
        stats.peak = stats.peak.max(peak);
    }
}

/// CaptureDelegate that reports facade events through the log.
pub struct LogDelegate;

impl CaptureDelegate for LogDelegate {
    fn on_state_changed(&self, state: CaptureState) {
        log::debug!(target: "pcm_capture::cli", "Capture state: {:?}", state);
    }

    fn on_device_changed(&self, index: i32, name: &str) {
        log::info!(target: "pcm_capture::cli", "Switched to audio device \"{}\" (ID {}).", name, index);
    }

    fn on_error(&self, error: &CaptureError) {
        log::warn!(target: "pcm_capture::cli", "Audio capture unavailable: {}", error);
    }
}
