//! Out-of-band command delivery.
//!
//! Operators (or a dashboard) raise commands at any time; the processing loop
//! drains them once per processed tick and hands the coalesced
//! [`PendingCommands`] to the engine. Draining clears the channel, so a signal
//! is applied exactly once.
//!
//! [`FlagFileWatcher`] bridges the marker-file convention: touching
//! `recalibrate.flag` or `repair.flag` in the flag directory raises the
//! matching command and the file is removed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::defaults::{RECALIBRATE_FLAG_FILE, REPAIR_FLAG_FILE};
use crate::types::{Command, PendingCommands};

/// Create a connected sender/receiver pair.
pub fn command_channel() -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, CommandReceiver { rx })
}

/// Cloneable handle for raising commands.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Command>,
}

impl CommandSender {
    /// Returns `false` once the receiving side has been dropped.
    pub fn send(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }

    pub fn recalibrate(&self) -> bool {
        self.send(Command::Recalibrate)
    }

    pub fn force_repair(&self) -> bool {
        self.send(Command::ForceRepair)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving end, owned by the processing loop.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<Command>,
}

impl CommandReceiver {
    /// Take every command signalled since the last drain.
    ///
    /// Repeated signals of the same command collapse into one.
    pub fn drain(&mut self) -> PendingCommands {
        let mut pending = PendingCommands::none();
        while let Ok(command) = self.rx.try_recv() {
            pending.insert(command);
        }
        pending
    }
}

// ============================================================================
// Flag File Watcher
// ============================================================================

/// Turns marker files in a directory into commands.
pub struct FlagFileWatcher {
    dir: PathBuf,
    interval: Duration,
    sender: CommandSender,
}

impl FlagFileWatcher {
    pub fn new(dir: impl Into<PathBuf>, interval: Duration, sender: CommandSender) -> Self {
        Self {
            dir: dir.into(),
            interval,
            sender,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Check both marker files once, consuming any that exist.
    ///
    /// A command is raised only when its marker was removed, so a marker that
    /// cannot be deleted never raises it.
    pub fn poll_once(&self) -> PendingCommands {
        let mut raised = PendingCommands::none();
        for (file, command) in [
            (RECALIBRATE_FLAG_FILE, Command::Recalibrate),
            (REPAIR_FLAG_FILE, Command::ForceRepair),
        ] {
            let path = self.dir.join(file);
            if !path.exists() {
                continue;
            }
            if let Err(e) = std::fs::remove_file(&path) {
                error!(
                    path = %path.display(),
                    command = %command,
                    error = %e,
                    "Cannot consume command flag, ignoring it"
                );
                continue;
            }
            info!(command = %command, "Command flag received");
            if !self.sender.send(command) {
                debug!(command = %command, "Command receiver gone, flag dropped");
            }
            raised.insert(command);
        }
        raised
    }

    /// Poll until cancelled or the command receiver goes away.
    pub async fn run(self, cancel: CancellationToken) {
        info!(dir = %self.dir.display(), "Command flag watcher started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Command flag watcher cancelled");
                    return;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
            if self.sender.is_closed() {
                debug!("Command channel closed, stopping flag watcher");
                return;
            }
            self.poll_once();
        }
    }
}
