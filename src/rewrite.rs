//! Literal substitution of wrapped field values.
//!
//! The line merge sees raw text, so rewriting must leave every other byte of
//! the document untouched. Values are therefore swapped as plain text
//! (`<field>old</field>` to `<field>new</field>`), never through a parsed tree.

/// Replace every `<field>old</field>` in `text` with `<field>new</field>`.
pub fn replace_field_value(text: &str, field: &str, old: &str, new: &str) -> String {
    if old == new {
        return text.to_string();
    }
    text.replace(&wrap(field, old), &wrap(field, new))
}

fn wrap(field: &str, value: &str) -> String {
    format!("<{0}>{1}</{0}>", field, value)
}

/// A single value substitution for one element name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: String,
    pub from: String,
    pub to: String,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    /// The change that undoes this one.
    #[must_use]
    pub fn inverted(&self) -> Self {
        Self {
            field: self.field.clone(),
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }

    pub fn apply(&self, text: &str) -> String {
        replace_field_value(text, &self.field, &self.from, &self.to)
    }
}

/// Apply `changes` to `text` in order.
pub fn apply_all(text: &str, changes: &[FieldChange]) -> String {
    changes
        .iter()
        .fold(text.to_string(), |acc, change| change.apply(&acc))
}
