use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a workload; each phase is also a ledger condition type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Initialized,
    Waiting,
    Created,
    Ready,
    Scaling,
    RollingUpgrade,
    Stopped,
    Failed,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Initialized,
        Phase::Waiting,
        Phase::Created,
        Phase::Ready,
        Phase::Scaling,
        Phase::RollingUpgrade,
        Phase::Stopped,
        Phase::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Initialized => "Initialized",
            Phase::Waiting => "Waiting",
            Phase::Created => "Created",
            Phase::Ready => "Ready",
            Phase::Scaling => "Scaling",
            Phase::RollingUpgrade => "RollingUpgrade",
            Phase::Stopped => "Stopped",
            Phase::Failed => "Failed",
        }
    }

    /// At most one exclusive phase condition is true at a time.
    pub fn is_exclusive(self) -> bool {
        matches!(self, Phase::Ready | Phase::Scaling | Phase::RollingUpgrade | Phase::Waiting | Phase::Stopped)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn allows(self, next: Phase) -> bool {
        use Phase::*;
        if next == Failed {
            return true;
        }
        match self {
            Initialized => matches!(next, Waiting | Created),
            Waiting => next == Created,
            Created => matches!(next, Ready | Stopped),
            Ready => matches!(next, Scaling | RollingUpgrade | Stopped),
            Scaling => matches!(next, Ready | Stopped),
            RollingUpgrade => next == Ready,
            Stopped => next == Created,
            Failed => false,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Phase {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL.into_iter().find(|p| p.as_str() == s).ok_or_else(|| format!("unknown phase {s:?}"))
    }
}
