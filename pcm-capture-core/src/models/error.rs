use thiserror::Error;

/// Errors that can occur during audio capture operations.
///
/// None of these cross the [`AudioCapture`](crate::AudioCapture) boundary
/// during steady-state operation; the facade logs them and keeps running
/// without audio. Only facade construction surfaces an error to the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Listing OS devices failed. Callers degrade to a default-only list.
    #[error("device enumeration failed: {0}")]
    EnumerationFailed(String),

    /// Activating a device or starting its stream failed.
    #[error("failed to open audio device \"{device}\": {detail}")]
    OpenFailed { device: String, detail: String },

    /// The device's mix format is not IEEE float.
    #[error("unsupported sample format: {0}")]
    FormatUnsupported(String),

    /// The selected device vanished between selection and open.
    #[error("device not available")]
    DeviceNotAvailable,

    /// The backend could not be initialized on this system.
    #[error("capture backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Shorthand for an [`CaptureError::OpenFailed`] with device identity and detail.
    pub fn open_failed(device: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::OpenFailed {
            device: device.into(),
            detail: detail.to_string(),
        }
    }

    /// Whether this error is a format negotiation failure (a subkind of open failure).
    pub fn is_format_unsupported(&self) -> bool {
        matches!(self, Self::FormatUnsupported(_))
    }
}
