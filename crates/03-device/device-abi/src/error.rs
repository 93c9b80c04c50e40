//! Error surface of the device ABI.

use mailbox::MailboxError;
use thiserror::Error;

/// Errors surfaced by device operations and registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The manager's registry has no free slot; fatal to the registration
    /// call, never retried.
    #[error("device registry for {0} is full")]
    RegistryFull(&'static str),

    /// No device occupies the given slot.
    #[error("unknown device id {0}")]
    UnknownDevice(u8),

    /// A concrete device operation failed; the device stays in its prior
    /// state.
    #[error("device operation failed: {0}")]
    Op(String),

    /// The device does not provide this optional capability.
    #[error("operation not supported by this device")]
    Unsupported,
}

impl DeviceError {
    /// Shorthand for an operation failure with a formatted reason.
    pub fn op(reason: impl Into<String>) -> Self {
        DeviceError::Op(reason.into())
    }
}

/// Errors surfaced when a driver posts an event through its hook.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HookError {
    /// The previous event posted through this slot has not been consumed
    /// yet. The pre-allocated event slot is affine: one event in flight.
    #[error("event slot still in flight")]
    SlotBusy,

    /// The substrate rejected the post.
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
}
