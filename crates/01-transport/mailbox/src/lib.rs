//! Typed message substrate joining the manager tasks.
//!
//! Every manager owns one bounded mailbox, addressed by [`ManagerId`]. The
//! [`Router`] is the only component that touches the mailboxes directly:
//! senders post through [`Router::put`] (task context) or
//! [`Router::put_from_isr`] (interrupt context), and the owning task drains
//! its [`MailboxReceiver`] with a blocking `get`. Delivery is FIFO within a
//! single (sender, receiver) pair; nothing is guaranteed across mailboxes.
//!
//! The substrate is generic over the message type. Payload definitions live
//! upstream in `device-abi`; the router only needs the routing metadata
//! exposed through the [`Envelope`] trait (delivery scope and the multicore
//! flags that drive fan-out to the bridge).

mod address;
mod error;
mod router;

pub use address::{DeliveryScope, Envelope, ManagerId, MulticoreInfo};
pub use error::MailboxError;
pub use router::{IsrPost, MailboxReceiver, Router, DEFAULT_MAILBOX_DEPTH};
