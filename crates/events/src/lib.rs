//! Event plumbing shared by the inventory kernel and its collaborators.
//!
//! Nothing in here knows about stock; it only describes what an event is,
//! how it travels (envelope + bus) and which organization it belongs to.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod organization;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use organization::OrganizationScoped;
