//! Integration tests for models and collections.

use serde_json::json;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracked_model::{Collection, FieldDef, Key, Model, Observable, Schema, Value};

static THING: Schema = Schema {
    name: "Thing",
    fields: &[FieldDef {
        name: "qux",
        default: || Value::Int(5),
    }],
};

static LIST: Schema = Schema {
    name: "List",
    fields: &[
        FieldDef {
            name: "title",
            default: || Value::from(""),
        },
        FieldDef {
            name: "items",
            default: || Value::Collection(Collection::new()),
        },
    ],
};

fn count(entity: &impl Observable, event: &str) -> Rc<Cell<usize>> {
    let calls = Rc::new(Cell::new(0));
    let c = Rc::clone(&calls);
    entity.events().on(event, move || c.set(c.get() + 1));
    calls
}

fn items_of(list: &Model) -> Collection {
    list.get("items").unwrap().as_collection().unwrap().clone()
}

// --- Serialization ---

#[test]
fn test_model_and_collection_serialization() {
    let thing = Model::new(&THING, "1");
    assert_eq!(serde_json::to_string(&thing).unwrap(), r#"{"pk":"1","qux":5}"#);

    let things = Collection::new();
    things.add(&thing).unwrap();
    assert_eq!(serde_json::to_string(&things).unwrap(), r#"[{"pk":"1","qux":5}]"#);
    assert_eq!(things.to_json().unwrap(), json!([{"pk": "1", "qux": 5}]));
}

#[test]
fn test_defaults_serialize_before_any_set() {
    let list = Model::new(&LIST, 7);
    assert_eq!(list.to_json().unwrap(), json!({"pk": 7, "title": "", "items": []}));

    let keys: Vec<String> = list
        .to_json()
        .unwrap()
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    assert_eq!(keys, vec!["pk", "title", "items"]);
}

#[test]
fn test_nested_serialization() {
    let list = Model::new(&LIST, "groceries");
    list.set("title", "Groceries").unwrap();
    let items = items_of(&list);
    items.add(&Model::new(&THING, "milk")).unwrap();
    items.add(&Model::new(&THING, "eggs")).unwrap();
    items.move_by_key(&Key::from("eggs"), -1).unwrap();

    assert_eq!(
        serde_json::to_string(&list).unwrap(),
        r#"{"pk":"groceries","title":"Groceries","items":[{"pk":"eggs","qux":5},{"pk":"milk","qux":5}]}"#
    );
}

// --- Cascading Changes ---

#[test]
fn test_collection_field_cascades_to_model() {
    let list = Model::new(&LIST, 1);
    let items = items_of(&list);
    assert!(list.persist());

    let changes = count(&list, "change");
    let item_changes = count(&list, "change:items");

    items.add(&Model::new(&THING, "a")).unwrap();

    assert!(list.is_dirty());
    assert_eq!(changes.get(), 1);
    assert_eq!(item_changes.get(), 1);
    assert!(list.changed_fields().is_empty());
}

#[test]
fn test_member_change_cascades_two_levels() {
    let list = Model::new(&LIST, 1);
    let items = items_of(&list);
    let thing = Model::new(&THING, "a");
    items.add(&thing).unwrap();
    list.persist();
    items.persist();
    thing.persist();

    let changes = count(&list, "change");
    thing.set("qux", 6).unwrap();

    assert!(thing.is_dirty());
    assert!(items.is_dirty());
    assert!(list.is_dirty());
    assert_eq!(changes.get(), 1);
    assert_eq!(items.changed_keys(), vec![Key::from("a")]);
}

#[test]
fn test_detached_collection_no_longer_cascades() {
    let list = Model::new(&LIST, 1);
    let items = items_of(&list);

    list.set("items", Value::Null).unwrap();
    list.persist();
    let changes = count(&list, "change");

    items.add(&Model::new(&THING, "a")).unwrap();

    assert!(!list.is_dirty());
    assert_eq!(changes.get(), 0);
}

#[test]
fn test_replaced_collection_cascades_from_new_only() {
    let list = Model::new(&LIST, 1);
    let old_items = items_of(&list);
    let new_items = Collection::new();

    list.set("items", new_items.clone()).unwrap();
    assert_eq!(list.changed_fields(), vec!["pk", "title", "items"]);
    list.persist();

    old_items.add(&Model::new(&THING, "a")).unwrap();
    assert!(!list.is_dirty());

    new_items.add(&Model::new(&THING, "b")).unwrap();
    assert!(list.is_dirty());
}

#[test]
fn test_persist_events_do_not_cascade() {
    let list = Model::new(&LIST, 1);
    let items = items_of(&list);
    list.persist();

    assert!(items.persist());
    assert!(!list.is_dirty());
}

// --- Lookup Consistency ---

#[test]
fn test_lookup_consistent_with_iteration_order() {
    let things = Collection::new();
    for pk in ["a", "b", "c", "d", "e"] {
        things.add(&Model::new(&THING, pk)).unwrap();
    }
    things.move_by_key(&Key::from("e"), -10).unwrap();
    things.remove_by_key(&Key::from("b")).unwrap();
    things.move_at(0, 2).unwrap();

    for (position, model) in things.all().iter().enumerate() {
        assert_eq!(things.get(&model.pk()).unwrap(), *model);
        assert_eq!(things.at(position).unwrap(), *model);
    }
}

// --- Typed Wrappers ---

static TASK: Schema = Schema {
    name: "Task",
    fields: &[
        FieldDef {
            name: "title",
            default: || Value::from(""),
        },
        FieldDef {
            name: "done",
            default: || Value::Bool(false),
        },
    ],
};

/// Typed accessors over a schema-declared model.
struct Task(Model);

impl Task {
    fn new(id: i64, title: &str) -> Self {
        let model = Model::new(&TASK, id);
        model.set("title", title).unwrap();
        Task(model)
    }

    fn title(&self) -> String {
        self.0.get("title").unwrap().as_str().unwrap_or_default().to_string()
    }

    fn done(&self) -> bool {
        self.0.get("done").unwrap().as_bool().unwrap_or(false)
    }

    fn complete(&self) {
        self.0.set("done", true).unwrap();
    }
}

#[test]
fn test_task_board_workflow() {
    let board = Collection::new();
    let tasks: Vec<Task> = ["write", "review", "ship"]
        .iter()
        .zip(1..)
        .map(|(title, id)| Task::new(id, title))
        .collect();
    for task in &tasks {
        board.add(&task.0).unwrap();
        task.0.persist();
    }
    board.persist();

    let log = Rc::new(RefCell::new(Vec::new()));
    let l = Rc::clone(&log);
    tasks[1].0.on("change:done", move || l.borrow_mut().push("done"));

    tasks[1].complete();
    assert!(tasks[1].done());
    assert_eq!(tasks[1].0.changed_fields(), vec!["done"]);
    assert_eq!(*log.borrow(), vec!["done"]);

    let finished = board.remove_where(|m| m.get("done").unwrap() == Value::Bool(true));
    assert_eq!(finished.len(), 1);
    assert_eq!(Task(finished[0].clone()).title(), "review");
    assert_eq!(board.persisted_keys(), vec![Key::from(1), Key::from(3)]);
    assert!(board.persist());
}

// --- Cyclic Wiring ---

#[test]
fn test_cyclic_wiring_terminates() {
    let list = Model::new(&LIST, "loop");
    let items = items_of(&list);

    // The list observes its collection, which now observes the list.
    items.add(&list).unwrap();
    list.persist();
    items.persist();

    list.set("title", "again").unwrap();
    assert!(list.is_dirty());
    assert!(items.is_dirty());

    // Break the cycle so both sides can be freed.
    items.clear();
}
