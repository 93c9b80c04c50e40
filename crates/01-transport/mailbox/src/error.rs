//! Error surface of the message substrate.

use crate::address::ManagerId;
use thiserror::Error;

/// Errors surfaced by mailbox registration and posting.
///
/// `put` never blocks: a full or missing mailbox is reported to the caller
/// immediately and the message is returned to the caller's ownership.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MailboxError {
    /// No mailbox has been registered for the addressed manager.
    #[error("no mailbox registered for manager {0:?}")]
    Unregistered(ManagerId),

    /// The addressed mailbox is at capacity.
    #[error("mailbox for manager {0:?} is full")]
    Full(ManagerId),

    /// The owning task has gone away and the mailbox can no longer accept.
    #[error("mailbox for manager {0:?} is disconnected")]
    Disconnected(ManagerId),

    /// A mailbox for this manager already exists.
    #[error("mailbox for manager {0:?} is already registered")]
    AlreadyRegistered(ManagerId),
}
