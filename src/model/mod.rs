//! Change-tracked models.
//!
//! A model's layout is a static [`Schema`]; every model carries an implicit
//! `pk` field ahead of the declared ones.

mod record;
mod schema;

pub use record::Model;
pub use schema::{FieldDef, Schema, PK_FIELD};
