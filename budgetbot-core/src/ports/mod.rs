//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The command
//! processor and bot loop depend only on these traits, not on concrete
//! implementations.

mod store;
mod transport;

pub use store::LedgerStore;
pub use transport::{Attachment, ChatTransport, InboundMessage, Reply, Sender};
