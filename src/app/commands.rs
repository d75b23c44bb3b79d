//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (HTTP handlers,
//! serial console) that the [`AppService`](super::service::AppService)
//! interprets and acts upon.
//!
//! Handlers run on the HTTP server's task, so they never touch the service
//! directly. Each request is wrapped in a [`CommandEnvelope`] and pushed
//! through a bounded channel; the control loop drains the [`CommandInbox`]
//! at the start of every pass and answers on the envelope's reply channel.
//!
//! ```text
//!   HTTP task                      control loop
//!   RemoteCommander::execute ──▶ CommandInbox::drain ──▶ AppService
//!            ▲                                               │
//!            └────────────── reply (Result) ─────────────────┘
//! ```

use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::time::Duration;

use log::warn;

use crate::drivers::led_strip::LedMode;
use crate::error::{CommsError, Error, Result};
use crate::profiles::PlantProfile;
use crate::scheduler::{PumpCommand, PumpScheduleState};

/// Pending commands before `execute` reports the loop as unavailable.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// Longest a handler waits for the loop to answer.
pub const COMMAND_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Advance the grow light to the next mode.
    CycleLed,
    SetLedMode(LedMode),
    SetPump(PumpCommand),
    SetActiveProfile(String),
    /// Validate and store a custom profile (overwrites by name).
    AddProfile(PlantProfile),
}

/// What a successfully applied command changed.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Led(LedMode),
    Pump(PumpScheduleState),
    ProfileActivated(String),
    ProfileAdded { name: String, replaced: bool },
}

#[derive(Debug)]
pub struct CommandEnvelope {
    pub cmd: AppCommand,
    pub reply: Sender<Result<CommandOutcome>>,
}

/// Create the bridge between request handlers and the control loop.
pub fn command_channel(depth: usize, timeout: Duration) -> (RemoteCommander, CommandInbox) {
    let (tx, rx) = mpsc::sync_channel(depth);
    (RemoteCommander { tx, timeout }, CommandInbox { rx })
}

/// Sending half; cloned into every request handler.
#[derive(Debug, Clone)]
pub struct RemoteCommander {
    tx: SyncSender<CommandEnvelope>,
    timeout: Duration,
}

impl RemoteCommander {
    /// Queue `cmd` and block until the loop answers or the timeout passes.
    pub fn execute(&self, cmd: AppCommand) -> Result<CommandOutcome> {
        let (reply, answer) = mpsc::channel();
        match self.tx.try_send(CommandEnvelope { cmd, reply }) {
            Ok(()) => {}
            Err(TrySendError::Full(env)) => {
                warn!("commands: queue full, dropping {:?}", env.cmd);
                return Err(Error::Comms(CommsError::ControlLoopUnavailable));
            }
            Err(TrySendError::Disconnected(_)) => {
                return Err(Error::Comms(CommsError::ControlLoopUnavailable));
            }
        }
        answer
            .recv_timeout(self.timeout)
            .map_err(|_| Error::Comms(CommsError::ControlLoopUnavailable))?
    }
}

/// Receiving half, owned by the control loop.
#[derive(Debug)]
pub struct CommandInbox {
    rx: Receiver<CommandEnvelope>,
}

impl CommandInbox {
    /// Apply every queued command in arrival order without blocking.
    /// Returns how many were handled.
    pub fn drain(&self, mut apply: impl FnMut(AppCommand) -> Result<CommandOutcome>) -> usize {
        let mut handled = 0;
        while let Ok(env) = self.rx.try_recv() {
            let result = apply(env.cmd);
            // The requester may have timed out and gone away.
            let _ = env.reply.send(result);
            handled += 1;
        }
        handled
    }
}
