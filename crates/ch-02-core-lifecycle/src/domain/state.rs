//! Lifecycle state machine
//!
//! ```text
//! [CREATED] ──mark_inited──→ [INITED] ──close (count hits 0)──→ [CLOSING] ──→ [CLOSED]
//!     │                                                              ↑
//!     └──────────────────── close (count hits 0) ────────────────────┘
//! ```

use std::fmt;

/// Lifecycle state of a managed resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LifecycleState {
    /// Constructed. Only descriptor and configuration access is valid.
    #[default]
    Created = 0,
    /// Fully initialized and serving.
    Inited = 1,
    /// Reference count reached zero; close hooks and teardown are running.
    Closing = 2,
    /// Torn down. Terminal.
    Closed = 3,
}

impl LifecycleState {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Inited,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Closing or closed.
    pub fn is_shutting_down(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Inited => write!(f, "INITED"),
            Self::Closing => write!(f, "CLOSING"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Result of a single `close()` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Count decremented, still referenced.
    Released { remaining: usize },
    /// This call dropped the count to zero and ran teardown.
    TornDown,
    /// Count was already zero. Logged as an integrity anomaly.
    AlreadyClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_u8() {
        for state in [
            LifecycleState::Created,
            LifecycleState::Inited,
            LifecycleState::Closing,
            LifecycleState::Closed,
        ] {
            assert_eq!(LifecycleState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn test_shutting_down() {
        assert!(!LifecycleState::Inited.is_shutting_down());
        assert!(LifecycleState::Closing.is_shutting_down());
    }
}
