//! Event pipeline between the hook thread and the owner context
//!
//! ```text
//! hook thread ──enqueue──▶ EventQueue (bounded) ──▶ worker thread ──post──▶ OwnerInbox
//! ```
//!
//! The queue blocks producers when full. The worker never dispatches; it only
//! moves events onto the owner's inbox, which preserves arrival order.

mod marshal;
mod queue;
mod worker;

pub use marshal::{marshal_channel, MarshalError, Marshaler, OwnerInbox};
pub use queue::{event_queue, EventReceiver, EventSender, QueueClosed, DEFAULT_CAPACITY};
pub use worker::Worker;
