//! Ordered, key-indexed collection of models.

use super::index::KeyIndex;
use crate::error::{ModelError, Result};
use crate::events::{
    field_change_event, EventBus, EventBusConfig, Observable, SubscriptionId, APPEND, CHANGE,
    PERSIST, REMOVE,
};
use crate::model::{Model, PK_FIELD};
use crate::value::Key;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// A member plus the subscriptions the collection holds on it.
struct Member {
    model: Model,
    change: SubscriptionId,
    pk_change: SubscriptionId,
    /// Key this member was recorded under in `persisted_keys`, if any.
    snapshot_key: Option<Key>,
}

impl Member {
    fn release(&self) {
        self.model.off(CHANGE, self.change);
        self.model.off(&field_change_event(PK_FIELD), self.pk_change);
    }
}

struct CollectionState {
    members: Vec<Member>,
    index: KeyIndex,
    /// Member keys as of the last persist, in order.
    persisted_keys: Vec<Key>,
    dirty: bool,
}

impl CollectionState {
    /// Rebuild the key index from the members' current keys.
    fn reindex(&mut self) {
        let keys = self.members.iter().map(|member| member.model.pk());
        for key in self.index.rebuild(keys) {
            warn!(pk = %key, "Duplicate key in collection, lookup resolves to the first member");
        }
    }

    /// Drop the member at `position` from the persisted snapshot.
    fn forget_snapshot(&mut self, position: usize) {
        if let Some(key) = self.members[position].snapshot_key.take() {
            if let Some(at) = self.persisted_keys.iter().position(|k| *k == key) {
                self.persisted_keys.remove(at);
            }
        }
    }
}

struct CollectionInner {
    bus: EventBus,
    state: RefCell<CollectionState>,
}

impl Drop for CollectionInner {
    fn drop(&mut self) {
        for member in &self.state.get_mut().members {
            member.release();
        }
    }
}

/// An ordered set of models with O(1) lookup by primary key.
///
/// `Collection` is a shared handle. It subscribes to each member's `change`
/// (re-emitted as the collection's own `change`) and `change:pk` (which
/// rebuilds the key index). Membership changes emit `change` followed by
/// `append` or `remove`; moves emit only `change`.
///
/// Persisting a collection snapshots its membership, not the members.
#[derive(Clone)]
pub struct Collection(Rc<CollectionInner>);

impl Collection {
    /// Create an empty collection. It is dirty until first persisted.
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create an empty collection whose event bus uses `config`.
    pub fn with_config(config: EventBusConfig) -> Self {
        Collection(Rc::new(CollectionInner {
            bus: EventBus::with_config(config),
            state: RefCell::new(CollectionState {
                members: Vec::new(),
                index: KeyIndex::new(),
                persisted_keys: Vec::new(),
                dirty: true,
            }),
        }))
    }

    // --- Membership ---

    /// Append a model and return its key.
    pub fn add(&self, model: &Model) -> Result<Key> {
        let key = model.pk();
        if self.0.state.borrow().index.contains(&key) {
            return Err(ModelError::DuplicateKey(key));
        }

        let (change, pk_change) = self.watch(model);
        let position = {
            let mut state = self.0.state.borrow_mut();
            let position = state.members.len();
            state.members.push(Member {
                model: model.clone(),
                change,
                pk_change,
                snapshot_key: None,
            });
            state.index.insert(key.clone(), position);
            state.dirty = true;
            position
        };

        debug!(pk = %key, position, "Added model to collection");
        self.0.bus.trigger(CHANGE);
        self.0.bus.trigger(APPEND);
        Ok(key)
    }

    /// Remove a member.
    pub fn remove(&self, model: &Model) -> Result<()> {
        let position = self
            .position_of(model)
            .ok_or_else(|| ModelError::NotFound(model.pk()))?;
        self.remove_position(position);
        Ok(())
    }

    /// Remove the member at `index`.
    pub fn remove_at(&self, index: usize) -> Result<Model> {
        let len = self.len();
        if index >= len {
            return Err(ModelError::IndexOutOfRange { index, len });
        }
        Ok(self.remove_position(index))
    }

    /// Remove the member with primary key `key`.
    pub fn remove_by_key(&self, key: &Key) -> Result<Model> {
        let position = self
            .0
            .state
            .borrow()
            .index
            .get(key)
            .ok_or_else(|| ModelError::NotFound(key.clone()))?;
        Ok(self.remove_position(position))
    }

    /// Remove every member matching `predicate`, in display order.
    ///
    /// Matches are resolved before anything is removed. A match that a
    /// subscriber already removed during an earlier removal is skipped.
    pub fn remove_where<F>(&self, predicate: F) -> Vec<Model>
    where
        F: FnMut(&Model) -> bool,
    {
        let mut removed = Vec::new();
        for model in self.filter(predicate) {
            match self.position_of(&model) {
                Some(position) => removed.push(self.remove_position(position)),
                None => debug!(pk = %model.pk(), "Model already removed, skipping"),
            }
        }
        removed
    }

    /// Remove every member.
    pub fn clear(&self) -> Vec<Model> {
        self.remove_where(|_| true)
    }

    // --- Lookup ---

    /// Member with primary key `key`.
    pub fn get(&self, key: &Key) -> Result<Model> {
        let state = self.0.state.borrow();
        state
            .index
            .get(key)
            .map(|position| state.members[position].model.clone())
            .ok_or_else(|| ModelError::NotFound(key.clone()))
    }

    /// Member at position `index`.
    pub fn at(&self, index: usize) -> Result<Model> {
        let state = self.0.state.borrow();
        state
            .members
            .get(index)
            .map(|member| member.model.clone())
            .ok_or(ModelError::IndexOutOfRange {
                index,
                len: state.members.len(),
            })
    }

    /// Members matching `predicate`, in display order.
    pub fn filter<F>(&self, mut predicate: F) -> Vec<Model>
    where
        F: FnMut(&Model) -> bool,
    {
        self.all()
            .into_iter()
            .filter(|model| predicate(model))
            .collect()
    }

    /// All members in display order.
    pub fn all(&self) -> Vec<Model> {
        self.0
            .state
            .borrow()
            .members
            .iter()
            .map(|member| member.model.clone())
            .collect()
    }

    /// Member keys in display order.
    pub fn keys(&self) -> Vec<Key> {
        self.0
            .state
            .borrow()
            .members
            .iter()
            .map(|member| member.model.pk())
            .collect()
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.0.state.borrow().index.contains(key)
    }

    /// Position of `model`, if it is a member.
    pub fn position_of(&self, model: &Model) -> Option<usize> {
        let state = self.0.state.borrow();
        if let Some(position) = state.index.get(&model.pk()) {
            if state.members[position].model.ptr_eq(model) {
                return Some(position);
            }
        }
        state
            .members
            .iter()
            .position(|member| member.model.ptr_eq(model))
    }

    pub fn len(&self) -> usize {
        self.0.state.borrow().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- Ordering ---

    /// Move the member at `index` by `offset` positions.
    ///
    /// The target is clamped to the collection bounds, so an oversized
    /// offset lands the member first or last. Members in between shift by
    /// one. Returns the new position.
    pub fn move_at(&self, index: usize, offset: isize) -> Result<usize> {
        let target = {
            let mut state = self.0.state.borrow_mut();
            let len = state.members.len();
            if index >= len {
                return Err(ModelError::IndexOutOfRange { index, len });
            }

            let target = index.saturating_add_signed(offset).min(len - 1);
            let member = state.members.remove(index);
            state.members.insert(target, member);
            state.reindex();
            state.dirty = true;
            target
        };

        debug!(from = index, to = target, "Moved model in collection");
        self.0.bus.trigger(CHANGE);
        Ok(target)
    }

    /// Move a member by `offset` positions.
    pub fn move_model(&self, model: &Model, offset: isize) -> Result<usize> {
        let index = self
            .position_of(model)
            .ok_or_else(|| ModelError::NotFound(model.pk()))?;
        self.move_at(index, offset)
    }

    /// Move the member with primary key `key` by `offset` positions.
    pub fn move_by_key(&self, key: &Key, offset: isize) -> Result<usize> {
        let index = self
            .0
            .state
            .borrow()
            .index
            .get(key)
            .ok_or_else(|| ModelError::NotFound(key.clone()))?;
        self.move_at(index, offset)
    }

    // --- Persistence ---

    /// True until persisted, and again after any membership or order change.
    pub fn is_dirty(&self) -> bool {
        self.0.state.borrow().dirty
    }

    /// Snapshot the current member keys and clear the dirty flag.
    ///
    /// Returns false (and emits nothing) if the collection is already clean.
    pub fn persist(&self) -> bool {
        let count = {
            let mut guard = self.0.state.borrow_mut();
            let state = &mut *guard;
            if !state.dirty {
                return false;
            }
            for member in &mut state.members {
                member.snapshot_key = Some(member.model.pk());
            }
            state.persisted_keys = state
                .members
                .iter()
                .filter_map(|member| member.snapshot_key.clone())
                .collect();
            state.dirty = false;
            state.persisted_keys.len()
        };

        debug!(members = count, "Persisted collection");
        self.0.bus.trigger(PERSIST);
        true
    }

    /// Member keys as of the last persist, minus members removed or
    /// modified since.
    pub fn persisted_keys(&self) -> Vec<Key> {
        self.0.state.borrow().persisted_keys.clone()
    }

    /// Keys of members added or modified since the last persist.
    pub fn changed_keys(&self) -> Vec<Key> {
        self.0
            .state
            .borrow()
            .members
            .iter()
            .filter(|member| member.snapshot_key.is_none())
            .map(|member| member.model.pk())
            .collect()
    }

    /// Members as a JSON array, in display order.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// True if both handles refer to the same collection.
    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    // --- Internals ---

    fn remove_position(&self, position: usize) -> Model {
        let member = {
            let mut state = self.0.state.borrow_mut();
            state.forget_snapshot(position);
            let member = state.members.remove(position);
            state.reindex();
            state.dirty = true;
            member
        };

        member.release();
        debug!(pk = %member.model.pk(), position, "Removed model from collection");
        self.0.bus.trigger(CHANGE);
        self.0.bus.trigger(REMOVE);
        member.model
    }

    /// Subscribe to a new member's `change` and `change:pk` events.
    fn watch(&self, model: &Model) -> (SubscriptionId, SubscriptionId) {
        let weak = Rc::downgrade(&self.0);
        let member = model.downgrade();
        let change = model.on(CHANGE, move || {
            let (Some(inner), Some(member)) = (weak.upgrade(), member.upgrade()) else {
                return;
            };
            {
                let mut state = inner.state.borrow_mut();
                let position = state
                    .members
                    .iter()
                    .position(|entry| entry.model.ptr_eq(&member));
                if let Some(position) = position {
                    state.forget_snapshot(position);
                }
                state.dirty = true;
            }
            inner.bus.trigger(CHANGE);
        });

        let weak = Rc::downgrade(&self.0);
        let pk_change = model.on(&field_change_event(PK_FIELD), move || {
            if let Some(inner) = weak.upgrade() {
                inner.state.borrow_mut().reindex();
            }
        });

        (change, pk_change)
    }
}

impl Default for Collection {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Collection {}

impl Observable for Collection {
    fn events(&self) -> &EventBus {
        &self.0.bus
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let state = self.0.state.borrow();
        let mut seq = serializer.serialize_seq(Some(state.members.len()))?;
        for member in &state.members {
            seq.serialize_element(&member.model)?;
        }
        seq.end()
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Collection");
        if let Ok(state) = self.0.state.try_borrow() {
            out.field("len", &state.members.len())
                .field("indexed", &state.index.len())
                .field("dirty", &state.dirty);
        }
        out.finish()
    }
}
