//! `kidsbook-events` — events and the in-process pub/sub transport.
//!
//! Notifications are persisted by the store first; this crate only carries
//! them to live consumers (push delivery) after the transaction commits.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::PushEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
