//! Windows audio endpoint enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list render endpoints (captured in
//! loopback) followed by capture endpoints, with friendly names.

use windows::core::PCWSTR;
use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use pcm_capture_core::models::audio_models::Endpoint;
use pcm_capture_core::models::error::CaptureError;

use crate::com;

const LOG_TARGET: &str = "pcm_capture::wasapi";

/// Audio endpoint enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Creates an enumerator, initializing COM on the calling thread if needed.
    pub fn new() -> Result<Self, CaptureError> {
        com::ensure_initialized()?;
        unsafe {
            let enumerator: IMMDeviceEnumerator = CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                .map_err(|e| CaptureError::BackendUnavailable(format!("failed to create enumerator: {}", e)))?;
            Ok(Self { enumerator })
        }
    }

    pub(crate) fn raw(&self) -> &IMMDeviceEnumerator {
        &self.enumerator
    }

    /// Active render endpoints, then active capture endpoints, each in OS order.
    pub fn list_endpoints(&self) -> Result<Vec<Endpoint>, CaptureError> {
        let mut endpoints = self.list_flow(eRender)?;
        endpoints.extend(self.list_flow(eCapture)?);
        Ok(endpoints)
    }

    /// Looks up an endpoint by its MMDevice ID.
    pub fn device(&self, id: &str) -> Result<IMMDevice, CaptureError> {
        let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe {
            self.enumerator
                .GetDevice(PCWSTR(wide_id.as_ptr()))
                .map_err(|_| CaptureError::DeviceNotAvailable)
        }
    }

    /// The default console render endpoint, the loopback source of index `-1`.
    pub fn default_render_device(&self) -> Result<IMMDevice, CaptureError> {
        unsafe {
            self.enumerator
                .GetDefaultAudioEndpoint(eRender, eConsole)
                .map_err(|_| CaptureError::DeviceNotAvailable)
        }
    }

    fn list_flow(&self, data_flow: EDataFlow) -> Result<Vec<Endpoint>, CaptureError> {
        let is_loopback = data_flow == eRender;
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(data_flow, DEVICE_STATE_ACTIVE)
                .map_err(|e| CaptureError::EnumerationFailed(format!("EnumAudioEndpoints failed: {}", e)))?;

            let count = collection
                .GetCount()
                .map_err(|e| CaptureError::EnumerationFailed(format!("GetCount failed: {}", e)))?;

            let mut endpoints = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = match collection.Item(i) {
                    Ok(d) => d,
                    Err(e) => {
                        log::warn!(target: LOG_TARGET, "Skipping audio endpoint {}: {}", i, e);
                        continue;
                    }
                };

                let Some(id) = device_id(&device) else {
                    continue;
                };
                let name = friendly_name(&device).unwrap_or_else(|| format!("Device {}", i));

                endpoints.push(Endpoint::new(id, name, is_loopback));
            }
            Ok(endpoints)
        }
    }
}

/// The MMDevice ID of an endpoint.
pub(crate) fn device_id(device: &IMMDevice) -> Option<String> {
    unsafe {
        let id = device.GetId().ok()?;
        let text = id.to_string().ok();
        CoTaskMemFree(Some(id.0 as *const _));
        text
    }
}

/// Reads the PKEY_Device_FriendlyName property from an endpoint.
pub(crate) fn friendly_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;
        let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
        let name = value.to_string();
        (!name.is_empty()).then_some(name)
    }
}
