//! Static field declarations for model types.

use crate::value::Value;

/// Name of the implicit primary key field.
pub const PK_FIELD: &str = "pk";

/// A declared field: its name and a constructor for its default value.
///
/// The default is a function rather than a value so that every model gets
/// its own instance (a nested `Collection` default must never be shared).
#[derive(Clone, Copy, Debug)]
pub struct FieldDef {
    pub name: &'static str,
    pub default: fn() -> Value,
}

impl FieldDef {
    /// A field defaulting to `Value::Null`.
    pub const fn null(name: &'static str) -> Self {
        Self {
            name,
            default: null_default,
        }
    }
}

fn null_default() -> Value {
    Value::Null
}

/// Field layout of a model type.
///
/// `pk` is implicit and always the first field; an entry named `pk` in
/// `fields` is ignored.
///
/// # Example
///
/// ```ignore
/// static TODO: Schema = Schema {
///     name: "Todo",
///     fields: &[
///         FieldDef { name: "title", default: || Value::from("") },
///         FieldDef { name: "done", default: || Value::Bool(false) },
///         FieldDef::null("due"),
///     ],
/// };
/// ```
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
}

impl Schema {
    /// Field names in declaration order, `pk` first.
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(PK_FIELD).chain(self.declared().map(|def| def.name))
    }

    /// True if `name` is `pk` or a declared field.
    pub fn has_field(&self, name: &str) -> bool {
        name == PK_FIELD || self.declared().any(|def| def.name == name)
    }

    /// Declared fields other than `pk`.
    pub(crate) fn declared(&self) -> impl Iterator<Item = &'static FieldDef> + '_ {
        self.fields.iter().filter(|def| def.name != PK_FIELD)
    }
}
