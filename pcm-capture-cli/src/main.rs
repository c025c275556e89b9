mod args;
mod monitor;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;

use pcm_capture_core::{
    AudioCapture, CaptureBackend, CaptureConfiguration, CaptureModel, DataFlow, DeviceList, SimulatedBackend,
};
use pcm_capture_portable::CpalBackend;

use args::{Args, BackendKind};
use monitor::{LevelMeter, LogDelegate};

const LOG_TARGET: &str = "pcm_capture::cli";

/// Feeds a 440 Hz tone into whichever simulated device is currently open.
struct ToneSource {
    backend: Arc<SimulatedBackend>,
    phase: f32,
    frames_per_tick: usize,
}

impl ToneSource {
    const SAMPLE_RATE: f32 = 48_000.0;

    fn new(backend: Arc<SimulatedBackend>, fps: u32) -> Self {
        Self {
            backend,
            phase: 0.0,
            frames_per_tick: (Self::SAMPLE_RATE as u32 / fps.max(1)) as usize,
        }
    }

    fn tick(&mut self) {
        let Some(device_id) = self.backend.opened_devices().pop() else {
            return;
        };
        let step = 440.0 * std::f32::consts::TAU / Self::SAMPLE_RATE;
        let mut samples = Vec::with_capacity(self.frames_per_tick * 2);
        for _ in 0..self.frames_per_tick {
            let value = 0.25 * self.phase.sin();
            samples.push(value);
            samples.push(value);
            self.phase = (self.phase + step) % std::f32::consts::TAU;
        }
        self.backend.push_audio(&device_id, &samples, false);
    }
}

fn simulated_backend() -> Arc<SimulatedBackend> {
    let backend = SimulatedBackend::new(CaptureModel::Pull);
    backend.add_device("sim-speakers", "Simulated Speakers", true);
    backend.add_device("sim-headphones", "Simulated Headphones", true);
    backend.add_device("sim-mic", "Simulated Microphone", false);
    backend.set_default_device(DataFlow::Render, "sim-speakers");
    backend
}

#[cfg(target_os = "windows")]
fn wasapi_backend() -> anyhow::Result<Arc<dyn CaptureBackend>> {
    Ok(Arc::new(pcm_capture_windows::WasapiBackend::new()))
}

#[cfg(not(target_os = "windows"))]
fn wasapi_backend() -> anyhow::Result<Arc<dyn CaptureBackend>> {
    anyhow::bail!("the wasapi backend is only available on Windows")
}

fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join("pcm-capture").join("config.json"))
}

fn load_config(explicit: Option<&Path>) -> anyhow::Result<CaptureConfiguration> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(CaptureConfiguration::default()),
        },
    };

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration {}", path.display()))?;
    let config = CaptureConfiguration::from_json_str(&text)
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    log::debug!(target: LOG_TARGET, "Loaded configuration from {}.", path.display());
    Ok(config)
}

fn device_listing(list: &DeviceList) -> String {
    let mut text = String::from("Available audio capturing devices:\n");
    for (index, name) in list.entries() {
        text.push_str(&format!("    {} = {}\n", index, name));
    }
    text
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate().map_err(anyhow::Error::msg).context("invalid settings")?;

    let fps = args.frame_rate(&config);
    let mut tone = None;
    let backend: Arc<dyn CaptureBackend> = match args.backend {
        BackendKind::Wasapi => wasapi_backend()?,
        BackendKind::Portable => Arc::new(CpalBackend::new()),
        BackendKind::Simulated => {
            let backend = simulated_backend();
            tone = Some(ToneSource::new(Arc::clone(&backend), fps));
            backend
        }
    };

    let mut capture = AudioCapture::new(backend, config).context("failed to initialize audio capture")?;
    capture.set_delegate(Arc::new(LogDelegate));
    log::debug!(target: LOG_TARGET, "Using the {} audio backend.", capture.backend_name());

    if capture.config().list_devices {
        print!("{}", device_listing(&capture.audio_device_list()));
    }

    let meter = LevelMeter::new();
    capture.start_from_config(meter.clone());

    let frame_time = Duration::from_secs_f64(1.0 / fps as f64);
    let mut frame: u64 = 0;
    while args.frames == 0 || frame < args.frames {
        let started = Instant::now();

        if let Some(tone) = tone.as_mut() {
            tone.tick();
        }
        capture.fill_buffer();

        frame += 1;
        if let Some(every) = args.cycle_every.filter(|n| *n > 0) {
            if frame % every == 0 {
                capture.next_audio_device();
            }
        }
        if frame % fps as u64 == 0 {
            let stats = meter.stats();
            log::info!(
                target: LOG_TARGET,
                "{} frames rendered, {} audio frames captured from \"{}\", peak {:.3}.",
                frame,
                stats.frames,
                capture.audio_device_name(),
                stats.peak
            );
        }

        if let Some(rest) = frame_time.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    capture.stop_recording();
    let stats = meter.stats();
    println!(
        "Captured {} frames in {} callbacks (peak {:.3}).",
        stats.frames, stats.callbacks, stats.peak
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcm_capture_core::Endpoint;

    #[test]
    fn listing_starts_with_default_entry() {
        let list = DeviceList::from_endpoints(
            "System Default Playback Device",
            vec![
                Endpoint::new("spk", "Speakers", true),
                Endpoint::new("mic", "Microphone", false),
            ],
        );

        assert_eq!(
            device_listing(&list),
            "Available audio capturing devices:\n    -1 = System Default Playback Device\n    0 = Speakers\n    1 = Microphone\n"
        );
    }
}
