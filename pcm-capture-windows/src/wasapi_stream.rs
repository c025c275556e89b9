//! WASAPI shared-mode capture stream.
//!
//! Render endpoints are opened with `AUDCLNT_STREAMFLAGS_LOOPBACK` and
//! capture the mix going to that device; capture endpoints are opened
//! normally. Either way the stream is drained synchronously by
//! [`CaptureStream::pump`] on the thread that opened it.

use windows::core::PCWSTR;
use windows::Win32::Foundation::E_NOTFOUND;
use windows::Win32::Media::Audio::*;
use windows::Win32::Media::KernelStreaming::{KSDATAFORMAT_SUBTYPE_PCM, WAVE_FORMAT_EXTENSIBLE};
use windows::Win32::Media::Multimedia::{KSDATAFORMAT_SUBTYPE_IEEE_FLOAT, WAVE_FORMAT_IEEE_FLOAT};
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::{AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW};

use pcm_capture_core::models::audio_models::StreamFormat;
use pcm_capture_core::models::error::CaptureError;
use pcm_capture_core::models::format::{MixFormat, SampleEncoding, SubFormat};
use pcm_capture_core::session::capture_session::negotiate_format;
use pcm_capture_core::traits::capture_backend::CaptureStream;
use pcm_capture_core::traits::consumer::SharedConsumer;

use crate::device_enumerator;

const LOG_TARGET: &str = "pcm_capture::wasapi";

/// Shared-mode buffer: one second in 100-nanosecond units, so a stalled
/// render loop does not overflow the endpoint buffer between fill requests.
const BUFFER_DURATION: i64 = 10_000_000;

/// Frees the `WAVEFORMATEX` returned by `GetMixFormat`.
struct MixFormatGuard(*mut WAVEFORMATEX);

impl Drop for MixFormatGuard {
    fn drop(&mut self) {
        unsafe {
            CoTaskMemFree(Some(self.0 as *const _));
        }
    }
}

/// Reverts the MMCSS registration of the capture thread.
struct MmcssGuard(windows::Win32::Foundation::HANDLE);

impl Drop for MmcssGuard {
    fn drop(&mut self) {
        unsafe {
            let _ = AvRevertMmThreadCharacteristics(self.0);
        }
    }
}

/// An initialized and started WASAPI capture stream.
pub struct WasapiStream {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    device_id: String,
    format: StreamFormat,
    consumer: SharedConsumer,
    started: bool,
    _mmcss: Option<MmcssGuard>,
}

impl WasapiStream {
    /// Activates `device`, checks for a float mix format and starts it.
    ///
    /// Sequence:
    /// 1. Activate IAudioClient
    /// 2. GetMixFormat, reject anything but IEEE float
    /// 3. Initialize in shared mode (with LOOPBACK for render endpoints)
    /// 4. Get IAudioCaptureClient
    /// 5. Register with MMCSS
    /// 6. Start
    pub fn open(device: &IMMDevice, loopback: bool, consumer: SharedConsumer) -> Result<Self, CaptureError> {
        let device_id = device_enumerator::device_id(device).unwrap_or_default();
        let label = device_enumerator::friendly_name(device).unwrap_or_else(|| device_id.clone());

        unsafe {
            let audio_client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .map_err(|e| open_error(&label, "Activate", e))?;

            let mix_format_ptr = audio_client
                .GetMixFormat()
                .map_err(|e| open_error(&label, "GetMixFormat", e))?;
            let _mix_guard = MixFormatGuard(mix_format_ptr);

            let mix = read_mix_format(mix_format_ptr);
            let format = negotiate_format(&mix)?;

            let flags = if loopback {
                AUDCLNT_STREAMFLAGS_LOOPBACK | AUDCLNT_STREAMFLAGS_NOPERSIST
            } else {
                AUDCLNT_STREAMFLAGS_NOPERSIST
            };
            audio_client
                .Initialize(AUDCLNT_SHAREMODE_SHARED, flags, BUFFER_DURATION, 0, mix_format_ptr, None)
                .map_err(|e| open_error(&label, "IAudioClient::Initialize", e))?;

            let capture_client: IAudioCaptureClient = audio_client
                .GetService()
                .map_err(|e| open_error(&label, "GetService", e))?;

            // MMCSS registration for real-time priority
            let mut task_index: u32 = 0;
            let task_name: Vec<u16> = "Audio\0".encode_utf16().collect();
            let mmcss = AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index)
                .inspect_err(|e| log::debug!(target: LOG_TARGET, "MMCSS registration failed: {}", e))
                .ok()
                .map(MmcssGuard);

            audio_client
                .Start()
                .map_err(|e| open_error(&label, "IAudioClient::Start", e))?;

            log::debug!(
                target: LOG_TARGET,
                "WASAPI stream started on {} ({}, loopback: {}).",
                label,
                mix,
                loopback
            );

            Ok(Self {
                audio_client,
                capture_client,
                device_id,
                format,
                consumer,
                started: true,
                _mmcss: mmcss,
            })
        }
    }
}

impl CaptureStream for WasapiStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn device_id(&self) -> Option<String> {
        Some(self.device_id.clone())
    }

    fn pump(&mut self) -> Result<usize, CaptureError> {
        if !self.started {
            return Ok(0);
        }

        let channels = self.format.channels;
        let mut delivered = 0;
        unsafe {
            let mut packet_length = self.capture_client.GetNextPacketSize().map_err(stream_error)?;

            while packet_length > 0 {
                let mut buffer_ptr: *mut u8 = std::ptr::null_mut();
                let mut num_frames: u32 = 0;
                let mut flags: u32 = 0;

                self.capture_client
                    .GetBuffer(&mut buffer_ptr, &mut num_frames, &mut flags, None, None)
                    .map_err(stream_error)?;

                let silent = flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0;
                if num_frames > 0 && !buffer_ptr.is_null() && !silent {
                    let frames = num_frames as usize;
                    let samples = std::slice::from_raw_parts(buffer_ptr as *const f32, frames * channels as usize);
                    self.consumer.consume(samples, frames, channels);
                    delivered += frames;
                }

                self.capture_client.ReleaseBuffer(num_frames).map_err(stream_error)?;

                packet_length = self.capture_client.GetNextPacketSize().map_err(stream_error)?;
            }
        }
        Ok(delivered)
    }

    fn close(&mut self) {
        if !self.started {
            return;
        }
        self.started = false;
        unsafe {
            let _ = self.audio_client.Stop();
        }
    }
}

impl Drop for WasapiStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Translates the OS mix format into the platform-neutral description.
///
/// # Safety
/// `ptr` must point to a valid `WAVEFORMATEX`, followed by the extensible
/// fields when its tag says so.
unsafe fn read_mix_format(ptr: *const WAVEFORMATEX) -> MixFormat {
    let wave = std::ptr::read_unaligned(ptr);
    let tag = wave.wFormatTag as u32;

    let encoding = if tag == WAVE_FORMAT_IEEE_FLOAT {
        SampleEncoding::IeeeFloat
    } else if tag == WAVE_FORMAT_PCM {
        SampleEncoding::Pcm
    } else if tag == WAVE_FORMAT_EXTENSIBLE {
        let ext = ptr as *const WAVEFORMATEXTENSIBLE;
        let sub = std::ptr::addr_of!((*ext).SubFormat).read_unaligned();
        SampleEncoding::Extensible(if sub == KSDATAFORMAT_SUBTYPE_IEEE_FLOAT {
            SubFormat::IeeeFloat
        } else if sub == KSDATAFORMAT_SUBTYPE_PCM {
            SubFormat::Pcm
        } else {
            SubFormat::Other
        })
    } else {
        SampleEncoding::Other(wave.wFormatTag)
    };

    MixFormat {
        encoding,
        channels: wave.nChannels,
        sample_rate: wave.nSamplesPerSec,
        bits_per_sample: wave.wBitsPerSample,
    }
}

fn is_device_gone(e: &windows::core::Error) -> bool {
    e.code() == AUDCLNT_E_DEVICE_INVALIDATED || e.code() == E_NOTFOUND
}

fn open_error(device: &str, step: &str, e: windows::core::Error) -> CaptureError {
    if is_device_gone(&e) {
        CaptureError::DeviceNotAvailable
    } else {
        CaptureError::open_failed(device, format!("{} failed: {}", step, e))
    }
}

fn stream_error(e: windows::core::Error) -> CaptureError {
    if is_device_gone(&e) {
        CaptureError::DeviceNotAvailable
    } else {
        CaptureError::Unknown(format!("WASAPI capture failed: {}", e))
    }
}
