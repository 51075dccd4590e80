//! Change-tracked model.

use super::schema::{Schema, PK_FIELD};
use crate::error::{ModelError, Result};
use crate::events::{
    field_change_event, EventBus, EventBusConfig, Observable, SubscriptionId, CHANGE, PERSIST,
};
use crate::value::{Key, Value};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::debug;

/// One field's current and persisted value.
struct Slot {
    name: &'static str,
    current: Value,
    /// `None` until the first persist, so it never equals a real value.
    persisted: Option<Value>,
}

struct ModelState {
    /// Fields in declaration order, `pk` first.
    slots: Vec<Slot>,
    /// Mirror of the `pk` slot.
    key: Key,
    dirty: bool,
    /// Field name -> subscription held on that field's entity value.
    field_subscriptions: HashMap<&'static str, SubscriptionId>,
}

struct ModelInner {
    schema: &'static Schema,
    bus: EventBus,
    state: RefCell<ModelState>,
}

impl Drop for ModelInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        for (name, id) in state.field_subscriptions.drain() {
            let bus = state
                .slots
                .iter()
                .find(|slot| slot.name == name)
                .and_then(|slot| slot.current.events());
            if let Some(bus) = bus {
                bus.off(CHANGE, id);
            }
        }
    }
}

/// A named, typed record with dirty tracking.
///
/// `Model` is a shared handle: clones refer to the same record. Fields are
/// read and written by name through [`Model::get`] and [`Model::set`]; every
/// `set` marks the model dirty and emits `change` then `change:<field>`.
///
/// When a field holds another entity (a `Model` or `Collection`), the model
/// subscribes to that entity's `change` event and re-emits it as its own
/// `change` and `change:<field>`, marking itself dirty. Wiring must be
/// acyclic.
#[derive(Clone)]
pub struct Model(Rc<ModelInner>);

impl Model {
    /// Create a model with every declared field at its default.
    ///
    /// A new model is dirty until its first [`Model::persist`].
    pub fn new(schema: &'static Schema, pk: impl Into<Key>) -> Self {
        Self::with_config(schema, pk, EventBusConfig::default())
    }

    /// Create a model whose event bus uses `config`.
    pub fn with_config(
        schema: &'static Schema,
        pk: impl Into<Key>,
        config: EventBusConfig,
    ) -> Self {
        let key = pk.into();

        let slots = std::iter::once(Slot {
            name: PK_FIELD,
            current: Value::from(key.clone()),
            persisted: None,
        })
        .chain(schema.declared().map(|def| Slot {
            name: def.name,
            current: (def.default)(),
            persisted: None,
        }))
        .collect::<Vec<_>>();

        let entity_fields: Vec<(&'static str, Value)> = slots
            .iter()
            .filter(|slot| slot.current.is_entity())
            .map(|slot| (slot.name, slot.current.clone()))
            .collect();

        let model = Model(Rc::new(ModelInner {
            schema,
            bus: EventBus::with_config(config),
            state: RefCell::new(ModelState {
                slots,
                key,
                dirty: true,
                field_subscriptions: HashMap::new(),
            }),
        }));

        for (name, value) in entity_fields {
            if let Some(id) = model.watch(name, &value) {
                model.0.state.borrow_mut().field_subscriptions.insert(name, id);
            }
        }

        model
    }

    /// The schema this model was built from.
    pub fn schema(&self) -> &'static Schema {
        self.0.schema
    }

    /// Current primary key.
    pub fn pk(&self) -> Key {
        self.0.state.borrow().key.clone()
    }

    /// Primary key as of the last persist.
    pub fn persisted_pk(&self) -> Option<Key> {
        self.0.state.borrow().slots[0]
            .persisted
            .as_ref()
            .and_then(Key::from_value)
    }

    /// Field names in declaration order, `pk` first.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.0.schema.field_names().collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.0.schema.has_field(name)
    }

    /// Current value of a field.
    pub fn get(&self, name: &str) -> Result<Value> {
        let index = self.slot_index(name)?;
        Ok(self.0.state.borrow().slots[index].current.clone())
    }

    /// Value of a field as of the last persist (`None` before the first).
    pub fn previous(&self, name: &str) -> Result<Option<Value>> {
        let index = self.slot_index(name)?;
        Ok(self.0.state.borrow().slots[index].persisted.clone())
    }

    /// Assign a field.
    ///
    /// Always marks the model dirty and emits `change` then
    /// `change:<field>`, even when the value is unchanged. Assigning `pk`
    /// requires an integer or string value.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let index = self.slot_index(name)?;

        let new_key = if index == 0 {
            let key = Key::from_value(&value)
                .ok_or_else(|| ModelError::InvalidKey(value.type_name().to_string()))?;
            Some(key)
        } else {
            None
        };

        let (field, old, old_sub) = {
            let mut state = self.0.state.borrow_mut();
            let field = state.slots[index].name;
            let old = state.slots[index].current.clone();
            let old_sub = state.field_subscriptions.remove(field);
            (field, old, old_sub)
        };

        if let (Some(bus), Some(id)) = (old.events(), old_sub) {
            bus.off(CHANGE, id);
        }
        let new_sub = self.watch(field, &value);

        {
            let mut state = self.0.state.borrow_mut();
            state.slots[index].current = value;
            if let Some(id) = new_sub {
                state.field_subscriptions.insert(field, id);
            }
            if let Some(key) = new_key {
                state.key = key;
            }
            state.dirty = true;
        }

        self.0.bus.trigger(CHANGE);
        self.0.bus.trigger(&field_change_event(field));
        Ok(())
    }

    /// True until persisted, and again after any mutation.
    pub fn is_dirty(&self) -> bool {
        self.0.state.borrow().dirty
    }

    /// Fields whose current value differs from the persisted snapshot.
    ///
    /// Entity-valued fields compare by identity, so a nested collection
    /// that was mutated in place does not appear here even though it made
    /// this model dirty.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        self.0
            .state
            .borrow()
            .slots
            .iter()
            .filter(|slot| slot.persisted.as_ref() != Some(&slot.current))
            .map(|slot| slot.name)
            .collect()
    }

    /// Snapshot every field and clear the dirty flag.
    ///
    /// Returns false (and emits nothing) if the model is already clean.
    pub fn persist(&self) -> bool {
        {
            let mut state = self.0.state.borrow_mut();
            if !state.dirty {
                return false;
            }
            for slot in &mut state.slots {
                slot.persisted = Some(slot.current.clone());
            }
            state.dirty = false;
        }

        debug!(model = self.0.schema.name, pk = %self.pk(), "Persisted model");
        self.0.bus.trigger(PERSIST);
        true
    }

    /// Current fields as JSON, in declaration order.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// True if both handles refer to the same model.
    pub fn ptr_eq(&self, other: &Model) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakModel {
        WeakModel(Rc::downgrade(&self.0))
    }

    fn slot_index(&self, name: &str) -> Result<usize> {
        self.0
            .state
            .borrow()
            .slots
            .iter()
            .position(|slot| slot.name == name)
            .ok_or_else(|| ModelError::UnknownField(name.to_string()))
    }

    /// Subscribe to `value`'s `change` event on behalf of `field`.
    fn watch(&self, field: &'static str, value: &Value) -> Option<SubscriptionId> {
        let bus = value.events()?;
        let weak = Rc::downgrade(&self.0);
        let field_event = field_change_event(field);

        Some(bus.on(CHANGE, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.state.borrow_mut().dirty = true;
            inner.bus.trigger(CHANGE);
            inner.bus.trigger(&field_event);
        }))
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Model {}

impl Observable for Model {
    fn events(&self) -> &EventBus {
        &self.0.bus
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let state = self.0.state.borrow();
        let mut map = serializer.serialize_map(Some(state.slots.len()))?;
        for slot in &state.slots {
            map.serialize_entry(slot.name, &slot.current)?;
        }
        map.end()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Model");
        out.field("schema", &self.0.schema.name);
        if let Ok(state) = self.0.state.try_borrow() {
            out.field("pk", &state.key).field("dirty", &state.dirty);
        }
        out.finish()
    }
}

/// Non-owning model handle, held by subscription callbacks.
#[derive(Clone)]
pub(crate) struct WeakModel(Weak<ModelInner>);

impl WeakModel {
    pub(crate) fn upgrade(&self) -> Option<Model> {
        self.0.upgrade().map(Model)
    }
}
