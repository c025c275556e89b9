//! cpal input stream driven by the OS callback thread.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig, SupportedBufferSize, SupportedStreamConfigRange};

use pcm_capture_core::models::audio_models::{DeviceState, StreamFormat, StreamRequest};
use pcm_capture_core::models::error::CaptureError;
use pcm_capture_core::models::format::{MixFormat, SampleEncoding};
use pcm_capture_core::session::capture_session::negotiate_format;
use pcm_capture_core::traits::capture_backend::CaptureStream;
use pcm_capture_core::traits::consumer::SharedConsumer;
use pcm_capture_core::traits::notification::{DeviceNotification, NotificationSink};

const LOG_TARGET: &str = "pcm_capture::portable";

/// Picks an f32 input configuration, preferring the requested channel
/// count and a rate range containing the requested rate.
pub(crate) fn pick_config(
    ranges: impl IntoIterator<Item = SupportedStreamConfigRange>,
    request: &StreamRequest,
) -> Option<StreamConfig> {
    let wanted = SampleRate(request.sample_rate);
    let mut best: Option<(u8, SupportedStreamConfigRange)> = None;

    for range in ranges.into_iter().filter(|r| r.sample_format() == SampleFormat::F32) {
        let rate_fits = range.min_sample_rate() <= wanted && wanted <= range.max_sample_rate();
        let score = u8::from(rate_fits) * 2 + u8::from(range.channels() == request.channels);
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best?;
    let rate = wanted.max(range.min_sample_rate()).min(range.max_sample_rate());
    let buffer_size = match range.buffer_size() {
        SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&request.buffer_frames) => {
            cpal::BufferSize::Fixed(request.buffer_frames)
        }
        _ => cpal::BufferSize::Default,
    };

    let mut config = range.with_sample_rate(rate).config();
    config.buffer_size = buffer_size;
    Some(config)
}

/// A playing cpal input stream.
pub struct CpalStream {
    stream: Option<cpal::Stream>,
    device_id: String,
    format: StreamFormat,
}

impl CpalStream {
    pub fn open(
        device: &cpal::Device,
        device_id: String,
        request: &StreamRequest,
        consumer: SharedConsumer,
        notifications: Arc<dyn NotificationSink>,
    ) -> Result<Self, CaptureError> {
        let ranges = device
            .supported_input_configs()
            .map_err(|e| CaptureError::open_failed(&device_id, e))?;
        let config = pick_config(ranges, request).ok_or_else(|| {
            CaptureError::FormatUnsupported(format!("{} offers no f32 input configuration", device_id))
        })?;

        let format = negotiate_format(&MixFormat {
            encoding: SampleEncoding::IeeeFloat,
            channels: config.channels,
            sample_rate: config.sample_rate.0,
            bits_per_sample: 32,
        })?;

        let channels = format.channels;
        let lost_id = device_id.clone();
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let frames = data.len() / channels as usize;
                    if frames > 0 {
                        consumer.consume(data, frames, channels);
                    }
                },
                move |err| match err {
                    cpal::StreamError::DeviceNotAvailable => {
                        log::warn!(target: LOG_TARGET, "Audio device \"{}\" is no longer available.", lost_id);
                        notifications.notify(DeviceNotification::StateChanged {
                            device_id: lost_id.clone(),
                            state: DeviceState::NotPresent,
                        });
                    }
                    other => log::error!(target: LOG_TARGET, "Audio stream error on \"{}\": {}", lost_id, other),
                },
                None,
            )
            .map_err(|e| match e {
                cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceNotAvailable,
                cpal::BuildStreamError::StreamConfigNotSupported => {
                    CaptureError::FormatUnsupported(format!("{} rejected {:?}", device_id, config))
                }
                other => CaptureError::open_failed(&device_id, other),
            })?;

        stream.play().map_err(|e| match e {
            cpal::PlayStreamError::DeviceNotAvailable => CaptureError::DeviceNotAvailable,
            other => CaptureError::open_failed(&device_id, other),
        })?;

        log::debug!(
            target: LOG_TARGET,
            "cpal stream started on \"{}\" ({} channels, {} Hz, buffer {:?}).",
            device_id,
            format.channels,
            format.sample_rate,
            config.buffer_size
        );

        Ok(Self {
            stream: Some(stream),
            device_id,
            format,
        })
    }
}

impl CaptureStream for CpalStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn device_id(&self) -> Option<String> {
        Some(self.device_id.clone())
    }

    fn pump(&mut self) -> Result<usize, CaptureError> {
        Ok(0)
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // Pause first so callbacks stop before the stream is dropped.
            if let Err(e) = stream.pause() {
                log::warn!(target: LOG_TARGET, "Failed to pause stream before drop: {}", e);
            }
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.close();
    }
}
