//! Name-keyed callback registry.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::{trace, warn};

/// Default limit for nested `trigger` calls on a single bus.
const DEFAULT_MAX_TRIGGER_DEPTH: usize = 64;

/// Handle returned by [`EventBus::on`], unique per bus and never reused.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

/// A registered subscriber.
pub type Callback = Rc<dyn Fn()>;

/// Event bus configuration.
#[derive(Clone, Debug)]
pub struct EventBusConfig {
    /// Maximum nesting of `trigger` calls on one bus. Deliveries past this
    /// depth are dropped and logged; only cyclic wiring ever reaches it.
    pub max_trigger_depth: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            max_trigger_depth: DEFAULT_MAX_TRIGGER_DEPTH,
        }
    }
}

#[derive(Default)]
struct Registry {
    /// Event name -> subscription ids in registration order.
    subscriptions: HashMap<String, Vec<SubscriptionId>>,
    /// Subscription id -> callback.
    callbacks: HashMap<SubscriptionId, Callback>,
    /// Last issued id.
    last_id: u64,
}

/// Multi-subscriber notification primitive.
///
/// All methods take `&self`; the registry is never borrowed while callbacks
/// run, so callbacks are free to subscribe, unsubscribe or trigger again.
pub struct EventBus {
    registry: RefCell<Registry>,
    depth: Cell<usize>,
    config: EventBusConfig,
}

impl EventBus {
    /// Create a bus with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create a bus with a custom configuration.
    pub fn with_config(config: EventBusConfig) -> Self {
        Self {
            registry: RefCell::new(Registry::default()),
            depth: Cell::new(0),
            config,
        }
    }

    /// Register `callback` under `name` and return its handle.
    pub fn on<F>(&self, name: &str, callback: F) -> SubscriptionId
    where
        F: Fn() + 'static,
    {
        let mut registry = self.registry.borrow_mut();
        registry.last_id += 1;
        let id = SubscriptionId(registry.last_id);

        registry
            .subscriptions
            .entry(name.to_string())
            .or_default()
            .push(id);
        registry.callbacks.insert(id, Rc::new(callback));

        id
    }

    /// Remove a subscription. Absent names or handles are ignored.
    pub fn off(&self, name: &str, id: SubscriptionId) {
        let mut guard = self.registry.borrow_mut();
        let registry = &mut *guard;

        let Some(ids) = registry.subscriptions.get_mut(name) else {
            return;
        };
        let Some(pos) = ids.iter().position(|&sub| sub == id) else {
            return;
        };

        ids.remove(pos);
        if ids.is_empty() {
            registry.subscriptions.remove(name);
        }
        registry.callbacks.remove(&id);
    }

    /// Invoke every callback registered under `name`, in registration order.
    ///
    /// The subscriber list is snapshotted before the first callback runs:
    /// subscriptions added during delivery are not called this round, and
    /// ones removed during delivery still are.
    pub fn trigger(&self, name: &str) {
        let depth = self.depth.get();
        if depth >= self.config.max_trigger_depth {
            warn!(event = name, depth, "Trigger depth limit reached, dropping delivery");
            return;
        }

        let callbacks: Vec<Callback> = {
            let registry = self.registry.borrow();
            match registry.subscriptions.get(name) {
                Some(ids) => ids
                    .iter()
                    .filter_map(|id| registry.callbacks.get(id).cloned())
                    .collect(),
                None => return,
            }
        };

        trace!(event = name, subscribers = callbacks.len(), depth, "trigger");

        let _depth = DepthGuard::enter(&self.depth);
        for callback in &callbacks {
            callback();
        }
    }

    /// Number of live subscriptions under `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.registry
            .borrow()
            .subscriptions
            .get(name)
            .map_or(0, Vec::len)
    }

    /// Total number of live subscriptions across all names.
    pub fn len(&self) -> usize {
        self.registry.borrow().callbacks.len()
    }

    /// True if nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.len())
            .field("depth", &self.depth.get())
            .finish()
    }
}

/// Tracks trigger nesting; restores the depth even if a callback panics.
struct DepthGuard<'a>(&'a Cell<usize>);

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        DepthGuard(depth)
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}
