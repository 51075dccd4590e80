//! # Tracked Model
//!
//! An in-memory, change-tracking object model for client applications.
//!
//! ## Core Concepts
//!
//! - **Events**: A name-keyed callback registry with synchronous delivery
//! - **Models**: Schema-declared records with per-field dirty tracking
//! - **Collections**: Ordered, key-indexed sets of models
//! - **Persist**: Snapshot the current state as the new baseline
//!
//! Changes bubble: a collection re-emits its members' `change` events, and
//! a model re-emits the `change` events of any model or collection held in
//! one of its fields.
//!
//! ## Example
//!
//! ```ignore
//! use tracked_model::{Collection, FieldDef, Model, Schema, Value};
//!
//! static TODO: Schema = Schema {
//!     name: "Todo",
//!     fields: &[FieldDef { name: "done", default: || Value::Bool(false) }],
//! };
//!
//! let todos = Collection::new();
//! let todo = Model::new(&TODO, "t1");
//! todos.add(&todo)?;
//! todos.persist();
//!
//! todo.set("done", true)?;
//! assert!(todos.is_dirty());
//! assert_eq!(todo.changed_fields(), vec!["pk", "done"]);
//! ```

pub mod collection;
pub mod error;
pub mod events;
pub mod model;
pub mod value;

// Re-exports
pub use collection::Collection;
pub use error::{ModelError, Result};
pub use events::{
    field_change_event, Callback, EventBus, EventBusConfig, Observable, SubscriptionId, APPEND,
    CHANGE, PERSIST, REMOVE,
};
pub use model::{FieldDef, Model, Schema, PK_FIELD};
pub use value::{Key, Value};
