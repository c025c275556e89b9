use std::sync::Arc;

/// Downstream sink for captured PCM frames.
///
/// Invoked on whichever thread owns the capture: the OS callback thread for
/// push backends, the capture thread for pull backends. Invocations never
/// overlap, so implementations only need to tolerate successive calls.
pub trait Consumer: Send + Sync {
    /// Delivers `frames` frames of interleaved IEEE float samples.
    ///
    /// `samples.len()` is `frames * channels`.
    fn consume(&self, samples: &[f32], frames: usize, channels: u16);
}

impl<F> Consumer for F
where
    F: Fn(&[f32], usize, u16) + Send + Sync,
{
    fn consume(&self, samples: &[f32], frames: usize, channels: u16) {
        self(samples, frames, channels)
    }
}

/// Shared handle to a consumer owned by the caller.
pub type SharedConsumer = Arc<dyn Consumer>;
