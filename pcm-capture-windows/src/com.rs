//! Per-thread COM apartment management.

use std::cell::RefCell;

use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::System::Com::*;

use pcm_capture_core::models::error::CaptureError;

thread_local! {
    static APARTMENT: RefCell<Option<CoUninitializeGuard>> = const { RefCell::new(None) };
}

/// Joins the calling thread to the multithreaded apartment once.
///
/// The apartment is left when the thread exits. Threads that already
/// entered an STA keep it; MMDevice and WASAPI objects work in both.
pub(crate) fn ensure_initialized() -> Result<(), CaptureError> {
    APARTMENT.with(|apartment| {
        if apartment.borrow().is_some() {
            return Ok(());
        }
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            return Ok(());
        }
        hr.ok()
            .map_err(|e| CaptureError::BackendUnavailable(format!("CoInitializeEx failed: {}", e)))?;
        *apartment.borrow_mut() = Some(CoUninitializeGuard);
        Ok(())
    })
}

/// RAII guard to call CoUninitialize when dropped.
struct CoUninitializeGuard;

impl Drop for CoUninitializeGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
