//! Capability shared by everything that emits events.

use super::bus::{EventBus, SubscriptionId};

/// An entity that owns an [`EventBus`].
///
/// Models and collections implement this; a model uses it to decide which
/// field values it must subscribe to.
pub trait Observable {
    /// The entity's bus.
    fn events(&self) -> &EventBus;

    fn on<F>(&self, name: &str, callback: F) -> SubscriptionId
    where
        F: Fn() + 'static,
        Self: Sized,
    {
        self.events().on(name, callback)
    }

    fn off(&self, name: &str, id: SubscriptionId) {
        self.events().off(name, id);
    }

    fn trigger(&self, name: &str) {
        self.events().trigger(name);
    }
}
