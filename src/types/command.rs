//! Out-of-band operator commands

use serde::{Deserialize, Serialize};

/// A single operator signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Discard the baseline and drift window, collect a new calibration window
    Recalibrate,
    /// Mark the asset as repaired regardless of the current health index
    ForceRepair,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Recalibrate => write!(f, "recalibrate"),
            Command::ForceRepair => write!(f, "force-repair"),
        }
    }
}

/// Commands observed since the last processed tick.
///
/// Each flag is edge-triggered: any number of identical signals within one
/// tick window collapse into a single application. Application order is
/// fixed: recalibrate first, then force-repair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCommands {
    pub recalibrate: bool,
    pub force_repair: bool,
}

impl PendingCommands {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn recalibrate() -> Self {
        Self {
            recalibrate: true,
            force_repair: false,
        }
    }

    pub fn force_repair() -> Self {
        Self {
            recalibrate: false,
            force_repair: true,
        }
    }

    /// Record one more signal
    pub fn insert(&mut self, command: Command) {
        match command {
            Command::Recalibrate => self.recalibrate = true,
            Command::ForceRepair => self.force_repair = true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.recalibrate && !self.force_repair
    }

    /// Commands in application order
    pub fn in_order(&self) -> impl Iterator<Item = Command> {
        let recal = self.recalibrate.then_some(Command::Recalibrate);
        let repair = self.force_repair.then_some(Command::ForceRepair);
        recal.into_iter().chain(repair)
    }
}
