use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::traits::consumer::{Consumer, SharedConsumer};

/// Generation counter shared between the control path and push callbacks.
///
/// Every opened push stream gets a consumer tagged with a fresh generation.
/// Advancing the gate retires all earlier streams: their callbacks keep
/// running until the OS tears them down, but deliver nothing.
#[derive(Debug, Default)]
pub struct GenerationGate {
    current: AtomicU64,
}

impl GenerationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Retires the current generation and returns the new one.
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Starts a new generation and wraps `inner` so it only receives
    /// frames while that generation is current.
    pub fn tag(self: &Arc<Self>, inner: SharedConsumer) -> SharedConsumer {
        let generation = self.advance();
        Arc::new(TaggedConsumer {
            generation,
            gate: Arc::clone(self),
            inner,
        })
    }
}

struct TaggedConsumer {
    generation: u64,
    gate: Arc<GenerationGate>,
    inner: SharedConsumer,
}

impl Consumer for TaggedConsumer {
    fn consume(&self, samples: &[f32], frames: usize, channels: u16) {
        if self.gate.current() == self.generation {
            self.inner.consume(samples, frames, channels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn stale_generation_is_dropped() {
        let gate = Arc::new(GenerationGate::new());
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let inner: SharedConsumer = Arc::new(move |_: &[f32], frames: usize, _: u16| {
            counter.fetch_add(frames, Ordering::SeqCst);
        });

        let first = gate.tag(Arc::clone(&inner));
        first.consume(&[0.0; 4], 2, 2);
        assert_eq!(delivered.load(Ordering::SeqCst), 2);

        let second = gate.tag(inner);
        first.consume(&[0.0; 4], 2, 2);
        assert_eq!(delivered.load(Ordering::SeqCst), 2);

        second.consume(&[0.0; 6], 3, 2);
        assert_eq!(delivered.load(Ordering::SeqCst), 5);

        gate.advance();
        second.consume(&[0.0; 6], 3, 2);
        assert_eq!(delivered.load(Ordering::SeqCst), 5);
    }
}
