//! Mailbox registration and message routing.

use crate::address::{DeliveryScope, Envelope, ManagerId};
use crate::error::MailboxError;
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use log::{error, trace};
use parking_lot::RwLock;

/// Default mailbox depth, in messages.
pub const DEFAULT_MAILBOX_DEPTH: usize = 10;

/// Outcome of an interrupt-context post.
///
/// `needs_yield` reports that the post may have unblocked a higher-priority
/// task; the ISR wrapper is expected to perform the context yield on exit
/// when the platform requires one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsrPost {
    /// The receiving task was idle before this post.
    pub needs_yield: bool,
}

/// Receiving end of a manager's mailbox, owned by the manager's task.
pub struct MailboxReceiver<M> {
    id: ManagerId,
    rx: Receiver<M>,
}

impl<M> MailboxReceiver<M> {
    /// Blocks until the next message arrives.
    ///
    /// Returns an error only when every sender is gone, which in practice
    /// means the router itself has been torn down.
    pub fn get(&self) -> Result<M, MailboxError> {
        self.rx
            .recv()
            .map_err(|_| MailboxError::Disconnected(self.id))
    }

    /// Non-blocking variant of [`MailboxReceiver::get`].
    pub fn try_get(&self) -> Result<Option<M>, MailboxError> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(MailboxError::Disconnected(self.id)),
        }
    }

    /// The manager this mailbox belongs to.
    pub fn manager(&self) -> ManagerId {
        self.id
    }
}

/// Routes messages to per-manager bounded mailboxes.
///
/// Registration happens once per manager during start-up; posting is hot and
/// takes only a read lock on the slot table.
pub struct Router<M> {
    slots: RwLock<[Option<Sender<M>>; ManagerId::COUNT]>,
}

impl<M: Envelope> Router<M> {
    /// Creates a router with no mailboxes registered.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(std::array::from_fn(|_| None)),
        }
    }

    /// Creates a bounded mailbox of `depth` messages for `id` and hands the
    /// receiving end to the caller.
    pub fn register(&self, id: ManagerId, depth: usize) -> Result<MailboxReceiver<M>, MailboxError> {
        let mut slots = self.slots.write();
        if slots[id.index()].is_some() {
            return Err(MailboxError::AlreadyRegistered(id));
        }
        let (tx, rx) = bounded(depth);
        slots[id.index()] = Some(tx);
        trace!("mailbox registered for {:?} (depth {})", id, depth);
        Ok(MailboxReceiver { id, rx })
    }

    /// Whether a mailbox exists for `id`.
    pub fn is_registered(&self, id: ManagerId) -> bool {
        self.slots.read()[id.index()].is_some()
    }

    /// Posts `msg` to the manager's mailbox from task context.
    ///
    /// Never blocks. A multicore-flagged message is additionally cloned to
    /// the bridge's mailbox; a `Remote`-scoped message goes to the bridge
    /// only, transferring ownership to it.
    pub fn put(&self, id: ManagerId, msg: M) -> Result<(), MailboxError> {
        trace!("put {} -> {:?}", msg.kind_name(), id);
        self.route(id, msg).map(|_| ())
    }

    /// Posts `msg` from interrupt context.
    ///
    /// Same delivery semantics as [`Router::put`]; additionally reports
    /// whether the post may have woken an idle receiver.
    pub fn put_from_isr(&self, id: ManagerId, msg: M) -> Result<IsrPost, MailboxError> {
        trace!("put_from_isr {} -> {:?}", msg.kind_name(), id);
        self.route(id, msg)
    }

    fn route(&self, id: ManagerId, msg: M) -> Result<IsrPost, MailboxError> {
        let fan_to_bridge = msg.multicore().is_multicore && id != ManagerId::Multicore;
        let remote_only = msg.scope() == DeliveryScope::Remote;

        if fan_to_bridge {
            if remote_only {
                // The bridge takes sole ownership of remote traffic.
                return self.send_to(ManagerId::Multicore, msg);
            }
            if let Err(err) = self.send_to(ManagerId::Multicore, msg.clone()) {
                // Local delivery still proceeds; the peer core misses out.
                error!("bridge fan-out of {} failed: {}", msg.kind_name(), err);
            }
        } else if remote_only {
            return self.send_to(ManagerId::Multicore, msg);
        }

        self.send_to(id, msg)
    }

    fn send_to(&self, id: ManagerId, msg: M) -> Result<IsrPost, MailboxError> {
        let slots = self.slots.read();
        let tx = slots[id.index()]
            .as_ref()
            .ok_or(MailboxError::Unregistered(id))?;
        let was_idle = tx.is_empty();
        match tx.try_send(msg) {
            Ok(()) => Ok(IsrPost {
                needs_yield: was_idle,
            }),
            Err(TrySendError::Full(_)) => Err(MailboxError::Full(id)),
            Err(TrySendError::Disconnected(_)) => Err(MailboxError::Disconnected(id)),
        }
    }
}

impl<M: Envelope> Default for Router<M> {
    fn default() -> Self {
        Self::new()
    }
}
