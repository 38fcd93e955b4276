//! A panel's editable working copy: declared fields, their defaults and coercions, and the
//! change stream every edit is announced on.

use crate::{
    ParamMap, ParamValue,
    bus::{Channel, Subscription},
    statics,
};
use std::{cell::RefCell, rc::Rc};

/// How an inbound document value is turned into the value a field edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Identity,
    /// Numbers become their field text; everything else passes through.
    NumberToString,
    /// Numbers become text and lists of scalars become one `;`-joined string.
    ListToDelimited,
    /// Objects are merged recursively over the field's default object.
    DeepMergeStructured,
}

impl Coercion {
    pub fn apply(self, incoming: &ParamValue, default: &ParamValue) -> ParamValue {
        match (self, incoming) {
            (Coercion::Identity, v) => v.clone(),
            (Coercion::NumberToString | Coercion::ListToDelimited, ParamValue::Number(n)) => {
                ParamValue::String(n.to_field_text())
            }
            (Coercion::ListToDelimited, ParamValue::Array(items)) => {
                ParamValue::String(join_delimited(items))
            }
            (Coercion::NumberToString | Coercion::ListToDelimited, v) => v.clone(),
            (Coercion::DeepMergeStructured, v) => deep_merge(default, v),
        }
    }
}

fn join_delimited(items: &[ParamValue]) -> String {
    let delimiter = statics::LIST_DELIMITER.to_string();
    items
        .iter()
        .map(|item| item.scalar_text().unwrap_or_else(|| item.to_json_compact()))
        .collect::<Vec<_>>()
        .join(&delimiter)
}

fn deep_merge(base: &ParamValue, incoming: &ParamValue) -> ParamValue {
    match (base, incoming) {
        (ParamValue::Object(base), ParamValue::Object(incoming)) => {
            let mut merged = base.clone();
            for (key, value) in incoming {
                let next = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            ParamValue::Object(merged)
        }
        (_, incoming) => incoming.clone(),
    }
}

/// One declared field of a panel.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub default: ParamValue,
    pub coercion: Coercion,
    /// Normalization run on the merged value before it reaches the working copy.
    pub repair: Option<fn(&mut ParamValue)>,
}

impl FieldSpec {
    pub fn new(name: &'static str, default: impl Into<ParamValue>, coercion: Coercion) -> Self {
        Self {
            name,
            default: default.into(),
            coercion,
            repair: None,
        }
    }

    pub fn text(name: &'static str) -> Self {
        Self::new(name, "", Coercion::NumberToString)
    }

    pub fn list(name: &'static str) -> Self {
        Self::new(name, "", Coercion::ListToDelimited)
    }

    pub fn with_repair(mut self, repair: fn(&mut ParamValue)) -> Self {
        self.repair = Some(repair);
        self
    }
}

/// Who caused a working-copy change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// Rebuilt from a refresh broadcast.
    Document,
    /// Edited through the panel.
    Panel,
}

/// Emitted after every change, carrying the complete working copy.
#[derive(Debug, Clone, PartialEq)]
pub struct FormChange {
    pub origin: ChangeOrigin,
    pub values: ParamMap,
}

pub struct Form {
    name: &'static str,
    fields: Vec<FieldSpec>,
    values: RefCell<ParamMap>,
    changes: Rc<Channel<FormChange>>,
}

impl Form {
    pub fn new(name: &'static str, fields: Vec<FieldSpec>) -> Self {
        let defaults = fields
            .iter()
            .map(|f| (f.name.to_string(), f.default.clone()))
            .collect();
        Self {
            name,
            fields,
            values: RefCell::new(defaults),
            changes: Channel::new(format!("{name}-changes")),
        }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn recognizes(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.name == field)
    }

    /// A fresh copy of the declared defaults.
    pub fn defaults(&self) -> ParamMap {
        self.fields
            .iter()
            .map(|f| (f.name.to_string(), f.default.clone()))
            .collect()
    }

    pub fn values(&self) -> ParamMap {
        self.values.borrow().clone()
    }

    pub fn get(&self, field: &str) -> Option<ParamValue> {
        self.values.borrow().get(field).cloned()
    }

    /// The working copy `document` would produce, or `None` when it is not an object.
    pub fn merge(&self, document: &ParamValue) -> Option<ParamMap> {
        let incoming = document.as_object()?;
        let mut merged = self.defaults();

        for field in &self.fields {
            let Some(value) = incoming.get(field.name) else {
                continue;
            };
            let mut coerced = field.coercion.apply(value, &field.default);
            if let Some(repair) = field.repair {
                repair(&mut coerced);
            }
            if coerced != field.default {
                merged.insert(field.name.to_string(), coerced);
            }
        }
        Some(merged)
    }

    /// Rebuild the working copy from a refresh payload. Absent or non-object payloads leave
    /// the working copy as it is. Returns whether the working copy was rebuilt.
    pub fn apply_document(&self, document: Option<&ParamValue>) -> bool {
        let Some(merged) = document.and_then(|doc| self.merge(doc)) else {
            tracing::debug!(form = self.name, "refresh without a document object skipped");
            return false;
        };
        self.set_values(merged, ChangeOrigin::Document);
        true
    }

    /// Replace the whole working copy in one step, then announce it.
    pub fn set_values(&self, values: ParamMap, origin: ChangeOrigin) {
        *self.values.borrow_mut() = values;
        let change = FormChange {
            origin,
            values: self.values(),
        };
        self.changes.emit(&change);
    }

    /// Edit one declared field. Unknown fields and unchanged values are ignored.
    pub fn set_field(&self, field: &str, value: ParamValue) -> bool {
        if !self.recognizes(field) {
            tracing::warn!(form = self.name, field, "edit of undeclared field ignored");
            return false;
        }
        let mut next = self.values();
        if next.get(field) == Some(&value) {
            return false;
        }
        next.insert(field.to_string(), value);
        self.set_values(next, ChangeOrigin::Panel);
        true
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&FormChange) -> anyhow::Result<()> + 'static,
    {
        self.changes.subscribe(handler)
    }

    pub fn subscriber_count(&self) -> usize {
        self.changes.subscriber_count()
    }
}
