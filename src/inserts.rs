//! The `Inserts` list: ordered entries each holding a location and one payload under a
//! `string` or `image` field.

use crate::{ParamMap, ParamValue, error::InsertError, form::Form, statics, table::split_elements};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertKind {
    String,
    Image,
}

impl InsertKind {
    pub const ALL: [InsertKind; 2] = [InsertKind::String, InsertKind::Image];

    /// Field holding the payload for this kind.
    pub fn field(self) -> &'static str {
        match self {
            InsertKind::String => statics::INSERT_TYPE_STRING,
            InsertKind::Image => statics::INSERT_TYPE_IMAGE,
        }
    }

    /// The kind an entry currently carries, by which payload field is present.
    fn of(entry: &ParamMap) -> Option<Self> {
        Self::ALL.into_iter().find(|k| entry.contains_key(k.field()))
    }

    /// Keep a single payload field. An entry carrying both keeps `string` and drops the rest.
    fn normalize(entry: &mut ParamMap) {
        let Some(kept) = Self::of(entry) else {
            return;
        };
        for other in Self::ALL.into_iter().filter(|k| *k != kept) {
            if entry.shift_remove(other.field()).is_some() {
                tracing::warn!(kept = %kept, dropped = %other, "insert entry carried two payloads");
            }
        }
    }
}

impl fmt::Display for InsertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Typed view of one entry, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertEntry {
    pub location: String,
    pub kind: InsertKind,
    pub payload: Vec<String>,
}

impl InsertEntry {
    pub fn new_default() -> Self {
        Self {
            location: statics::INSERT_DEFAULT_LOCATION.to_string(),
            kind: InsertKind::String,
            payload: vec![statics::INSERT_DEFAULT_TEXT.to_string()],
        }
    }

    /// Lenient read: a missing location is empty, a missing payload is an empty `string` list.
    /// With both payload fields present the `string` one wins, as on the next edit.
    pub fn from_value(value: &ParamValue) -> Self {
        let empty = ParamMap::new();
        let obj = value.as_object().unwrap_or(&empty);
        let location = obj
            .get(statics::INSERT_LOCATION)
            .and_then(ParamValue::scalar_text)
            .unwrap_or_default();
        let kind = InsertKind::of(obj).unwrap_or(InsertKind::String);
        let payload = match obj.get(kind.field()) {
            Some(ParamValue::Array(items)) => {
                items.iter().filter_map(ParamValue::scalar_text).collect()
            }
            Some(other) => other.scalar_text().into_iter().collect(),
            None => Vec::new(),
        };
        Self {
            location,
            kind,
            payload,
        }
    }

    pub fn to_value(&self) -> ParamValue {
        let mut entry = ParamMap::new();
        entry.insert(
            statics::INSERT_LOCATION.to_string(),
            self.location.clone().into(),
        );
        entry.insert(
            self.kind.field().to_string(),
            ParamValue::string_list(self.payload.iter().cloned()),
        );
        entry.into()
    }

    /// Payload as one `;`-delimited line.
    pub fn payload_text(&self) -> String {
        self.payload.join(&statics::LIST_DELIMITER.to_string())
    }
}

/// Operations on a form's `Inserts` field. Each one commits the whole list in one step.
pub struct InsertList<'a> {
    form: &'a Form,
}

impl<'a> InsertList<'a> {
    pub fn new(form: &'a Form) -> Self {
        Self { form }
    }

    pub fn entries(&self) -> Vec<InsertEntry> {
        self.raw().iter().map(InsertEntry::from_value).collect()
    }

    pub fn len(&self) -> usize {
        self.raw().len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw().is_empty()
    }

    /// Add a default entry at the end and return its index.
    pub fn append(&self) -> usize {
        let mut list = self.raw();
        list.push(InsertEntry::new_default().to_value());
        let index = list.len() - 1;
        self.commit(list);
        index
    }

    /// Move the entry's payload to the field for `kind`, keeping its contents.
    pub fn change_type(&self, index: usize, kind: InsertKind) -> Result<(), InsertError> {
        self.edit(index, |entry| {
            let current = InsertKind::of(entry);
            if current == Some(kind) {
                return;
            }
            let payload = current
                .and_then(|c| entry.shift_remove(c.field()))
                .unwrap_or_else(|| ParamValue::Array(Vec::new()));
            entry.insert(kind.field().to_string(), payload);
        })
    }

    /// Splice the entry out; later entries shift down.
    pub fn remove(&self, index: usize) -> Result<InsertEntry, InsertError> {
        let mut list = self.raw();
        check(index, list.len())?;
        let removed = list.remove(index);
        self.commit(list);
        Ok(InsertEntry::from_value(&removed))
    }

    pub fn set_location(&self, index: usize, location: &str) -> Result<(), InsertError> {
        let location = location.trim().to_string();
        self.edit(index, |entry| {
            entry.insert(statics::INSERT_LOCATION.to_string(), location.into());
        })
    }

    /// Replace the payload from `;`-delimited text, under the entry's current kind.
    pub fn set_payload(&self, index: usize, text: &str) -> Result<(), InsertError> {
        let items = split_elements(text);
        self.edit(index, |entry| {
            let kind = InsertKind::of(entry).unwrap_or(InsertKind::String);
            entry.insert(kind.field().to_string(), ParamValue::string_list(items));
        })
    }

    fn edit(&self, index: usize, f: impl FnOnce(&mut ParamMap)) -> Result<(), InsertError> {
        let mut list = self.raw();
        check(index, list.len())?;
        let slot = &mut list[index];
        if slot.as_object().is_none() {
            *slot = ParamValue::empty_object();
        }
        if let Some(entry) = slot.as_object_mut() {
            InsertKind::normalize(entry);
            f(entry);
        }
        self.commit(list);
        Ok(())
    }

    fn raw(&self) -> Vec<ParamValue> {
        match self.form.get(statics::FIELD_INSERTS) {
            Some(ParamValue::Array(items)) => items,
            _ => Vec::new(),
        }
    }

    fn commit(&self, list: Vec<ParamValue>) {
        self.form.set_field(statics::FIELD_INSERTS, ParamValue::Array(list));
    }
}

fn check(index: usize, len: usize) -> Result<(), InsertError> {
    if index < len {
        Ok(())
    } else {
        Err(InsertError::OutOfRange { index, len })
    }
}

#[cfg(test)]
mod tests {
    use super::{InsertEntry, InsertKind};
    use crate::ParamValue;

    #[test]
    fn from_value_reads_image_payload() {
        let entry = InsertEntry::from_value(
            &ParamValue::parse_json5("{ location: 4, image: ['a.png', 'b.png'] }").unwrap(),
        );
        assert_eq!(entry.location, "4");
        assert_eq!(entry.kind, InsertKind::Image);
        assert_eq!(entry.payload_text(), "a.png;b.png");
    }

    #[test]
    fn default_entry_serializes_with_string_payload() {
        assert_eq!(
            InsertEntry::new_default().to_value().to_json_compact(),
            r#"{"location":"1","string":["My insertion"]}"#
        );
    }

    #[test]
    fn normalize_keeps_only_the_string_payload() {
        let mut entry = ParamValue::parse_json5("{ location: '1', string: ['a'], image: ['b.png'] }")
            .unwrap()
            .into_object()
            .unwrap();
        InsertKind::normalize(&mut entry);
        assert_eq!(entry.get("string"), Some(&ParamValue::string_list(["a"])));
        assert_eq!(entry.get("image"), None);
    }

    #[test]
    fn non_objects_read_as_empty_entries() {
        let entry = InsertEntry::from_value(&ParamValue::Null);
        assert_eq!(entry.location, "");
        assert!(entry.payload.is_empty());
    }
}
