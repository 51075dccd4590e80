//! Event system for models and collections.
//!
//! An [`EventBus`] maps event names to ordered callback lists. Delivery is
//! synchronous and carries no payload: a subscriber that needs state reads
//! it back from the entity that emitted the event.
//!
//! Events emitted by the crate:
//! - `change`: any mutation of a model field or collection membership/order
//! - `change:<field>`: a model field was assigned (or a nested entity held
//!   in that field changed)
//! - `append` / `remove`: collection membership grew or shrank
//! - `persist`: an entity captured its current state as the new baseline
//!
//! # Example
//!
//! ```ignore
//! let bus = EventBus::new();
//! let id = bus.on("change", || println!("changed"));
//! bus.trigger("change");
//! bus.off("change", id);
//! ```

mod bus;
mod observable;

pub use bus::{Callback, EventBus, EventBusConfig, SubscriptionId};
pub use observable::Observable;

/// Emitted on every mutation.
pub const CHANGE: &str = "change";

/// Emitted by a collection after a member is added.
pub const APPEND: &str = "append";

/// Emitted by a collection after a member is removed.
pub const REMOVE: &str = "remove";

/// Emitted after a successful persist.
pub const PERSIST: &str = "persist";

/// Name of the per-field change event, e.g. `change:title`.
pub fn field_change_event(field: &str) -> String {
    format!("{CHANGE}:{field}")
}
