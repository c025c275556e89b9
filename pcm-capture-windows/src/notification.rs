//! `IMMNotificationClient` bridge.
//!
//! The COM object only converts arguments and forwards them to a
//! [`NotificationSink`]; all decisions happen in the core.

use std::sync::Arc;

use windows::core::{implement, PCWSTR};
use windows::Win32::Foundation::PROPERTYKEY;
use windows::Win32::Media::Audio::*;

use pcm_capture_core::models::audio_models::{DataFlow, DeviceRole, DeviceState};
use pcm_capture_core::models::error::CaptureError;
use pcm_capture_core::traits::notification::{DeviceNotification, NotificationRegistration, NotificationSink};

use crate::device_enumerator::DeviceEnumerator;

const LOG_TARGET: &str = "pcm_capture::wasapi";

#[implement(IMMNotificationClient)]
struct NotificationClient {
    sink: Arc<dyn NotificationSink>,
}

fn wide_to_string(id: &PCWSTR) -> Option<String> {
    if id.is_null() {
        return None;
    }
    unsafe { id.to_string().ok() }
}

fn device_state(state: DEVICE_STATE) -> DeviceState {
    match state {
        DEVICE_STATE_ACTIVE => DeviceState::Active,
        DEVICE_STATE_DISABLED => DeviceState::Disabled,
        DEVICE_STATE_UNPLUGGED => DeviceState::Unplugged,
        _ => DeviceState::NotPresent,
    }
}

fn data_flow(flow: EDataFlow) -> DataFlow {
    if flow == eRender {
        DataFlow::Render
    } else {
        DataFlow::Capture
    }
}

fn device_role(role: ERole) -> DeviceRole {
    match role {
        r if r == eMultimedia => DeviceRole::Multimedia,
        r if r == eCommunications => DeviceRole::Communications,
        _ => DeviceRole::Console,
    }
}

impl IMMNotificationClient_Impl for NotificationClient_Impl {
    fn OnDeviceStateChanged(&self, pwstrdeviceid: &PCWSTR, dwnewstate: DEVICE_STATE) -> windows::core::Result<()> {
        if let Some(device_id) = wide_to_string(pwstrdeviceid) {
            self.sink.notify(DeviceNotification::StateChanged {
                device_id,
                state: device_state(dwnewstate),
            });
        }
        Ok(())
    }

    fn OnDeviceAdded(&self, pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        if let Some(device_id) = wide_to_string(pwstrdeviceid) {
            self.sink.notify(DeviceNotification::Added { device_id });
        }
        Ok(())
    }

    fn OnDeviceRemoved(&self, pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        if let Some(device_id) = wide_to_string(pwstrdeviceid) {
            self.sink.notify(DeviceNotification::Removed { device_id });
        }
        Ok(())
    }

    fn OnDefaultDeviceChanged(
        &self,
        flow: EDataFlow,
        role: ERole,
        pwstrdefaultdeviceid: &PCWSTR,
    ) -> windows::core::Result<()> {
        self.sink.notify(DeviceNotification::DefaultChanged {
            flow: data_flow(flow),
            role: device_role(role),
            device_id: wide_to_string(pwstrdefaultdeviceid),
        });
        Ok(())
    }

    fn OnPropertyValueChanged(&self, pwstrdeviceid: &PCWSTR, _key: &PROPERTYKEY) -> windows::core::Result<()> {
        if let Some(device_id) = wide_to_string(pwstrdeviceid) {
            self.sink.notify(DeviceNotification::PropertyChanged { device_id });
        }
        Ok(())
    }
}

/// A registered notification client. Unregisters when dropped.
pub struct WasapiRegistration {
    enumerator: DeviceEnumerator,
    client: IMMNotificationClient,
}

impl WasapiRegistration {
    pub fn register(sink: Arc<dyn NotificationSink>) -> Result<Self, CaptureError> {
        let enumerator = DeviceEnumerator::new()?;
        let client: IMMNotificationClient = NotificationClient { sink }.into();
        unsafe {
            enumerator
                .raw()
                .RegisterEndpointNotificationCallback(&client)
                .map_err(|e| CaptureError::Unknown(format!("RegisterEndpointNotificationCallback failed: {}", e)))?;
        }
        log::debug!(target: LOG_TARGET, "Registered for audio endpoint notifications.");
        Ok(Self { enumerator, client })
    }
}

impl NotificationRegistration for WasapiRegistration {}

impl Drop for WasapiRegistration {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.enumerator.raw().UnregisterEndpointNotificationCallback(&self.client) {
                log::warn!(target: LOG_TARGET, "Failed to unregister endpoint notifications: {}", e);
            }
        }
        log::debug!(target: LOG_TARGET, "Unregistered audio endpoint notifications.");
    }
}
