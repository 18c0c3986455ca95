//! In-process event fabric: domain events and the bus they travel on.

mod bus;
mod domain;

pub use bus::{InMemoryEventBus, SubscriptionId};
pub use domain::DomainEvent;
