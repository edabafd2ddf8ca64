//! Inbound commands to the thermal engine.
//!
//! These are requests from the outside world (local controls, network
//! endpoint).  They are validated when submitted and applied by the
//! [`ThermalEngine`](super::service::ThermalEngine) at the top of the next
//! tick, never mid-computation.
//!
//! ```text
//! ┌──────────────┐ EngineCommand ┌──────────────┐
//! │ UI / network │──────────────▶│ control loop │
//! └──────────────┘  CommandQueue └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::error::CommandError;
use crate::modes::{self, ActiveMode};

/// Queue depth.  Commands are drained every tick, so a handful suffices.
pub const COMMAND_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    /// Activate the mode at this table index.
    SelectMode(u8),
    /// Set the custom-mode target (°C).
    SetCustomTarget(f32),
    StartCooldown,
    /// Safe exit: fan off, vent closed, no mode.
    ExitActiveMode,
}

impl EngineCommand {
    /// Range-check the payload.
    pub fn validate(self) -> Result<Self, CommandError> {
        match self {
            Self::SelectMode(index) => ActiveMode::from_index(index).map(|_| self),
            Self::SetCustomTarget(t) => modes::validate_target(t).map(|_| self),
            Self::StartCooldown | Self::ExitActiveMode => Ok(self),
        }
    }
}

/// Bounded command channel shared between producers and the control loop.
pub struct CommandQueue {
    channel: Channel<CriticalSectionRawMutex, EngineCommand, COMMAND_DEPTH>,
}

impl CommandQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Validate and enqueue.  Never blocks.
    pub fn submit(&self, command: EngineCommand) -> Result<(), CommandError> {
        let command = command.validate()?;
        self.channel
            .try_send(command)
            .map_err(|_| CommandError::QueueFull)
    }

    /// Next pending command, if any.
    pub fn take(&self) -> Option<EngineCommand> {
        self.channel.try_receive().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
