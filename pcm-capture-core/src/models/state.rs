/// Capture loop state machine.
///
/// State transitions:
/// ```text
/// idle → running ⇄ restarting
///           ↓
///        stopping → idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Running,
    /// Reopening after a hot-plug event without leaving the capture loop.
    Restarting,
    Stopping,
}

impl CaptureState {
    /// Running or restarting: from the caller's side, still capturing.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Restarting)
    }

    pub fn is_stopping(&self) -> bool {
        matches!(self, Self::Stopping)
    }

    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Restarting => 2,
            Self::Stopping => 3,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Restarting,
            3 => Self::Stopping,
            _ => Self::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restarting_counts_as_active() {
        assert!(CaptureState::Running.is_active());
        assert!(CaptureState::Restarting.is_active());
        assert!(!CaptureState::Stopping.is_active());
        assert!(!CaptureState::Idle.is_active());
    }

    #[test]
    fn u8_encoding_is_lossless() {
        for state in [
            CaptureState::Idle,
            CaptureState::Running,
            CaptureState::Restarting,
            CaptureState::Stopping,
        ] {
            assert_eq!(CaptureState::from_u8(state.as_u8()), state);
        }
    }
}
