//! Mapping tables (`elements` and `factors` sharing one key set) and the editor that
//! commits them into a panel's working copy.

use crate::{ParamMap, ParamValue, error::TableError, form::Form, statics};
use indexmap::IndexMap;
use std::{collections::HashSet, fmt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableId {
    CadToFem,
    FemToCad,
}

impl TableId {
    pub const ALL: [TableId; 2] = [TableId::CadToFem, TableId::FemToCad];

    /// Member name inside the `Mappings` field.
    pub fn key(self) -> &'static str {
        match self {
            TableId::CadToFem => statics::MAPPING_CAD_TO_FEM,
            TableId::FemToCad => statics::MAPPING_FEM_TO_CAD,
        }
    }

    pub fn heading(self) -> &'static str {
        match self {
            TableId::CadToFem => statics::EN_HEADING_CAD_TO_FEM,
            TableId::FemToCad => statics::EN_HEADING_FEM_TO_CAD,
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// `elements: key -> list of strings` and `factors: key -> string`, always over the same keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    elements: IndexMap<String, Vec<String>>,
    factors: IndexMap<String, String>,
}

impl MappingTable {
    /// An empty `{elements:{}, factors:{}}` value.
    pub fn empty_value() -> ParamValue {
        MappingTable::default().to_value()
    }

    /// Read a table, repairing diverging key sets and malformed members.
    /// Returns the table and the number of repairs made.
    pub fn from_value(value: &ParamValue) -> (Self, usize) {
        let mut repairs = 0;
        let empty = ParamMap::new();
        let (raw_elements, raw_factors) = match value.as_object() {
            Some(obj) => (
                member_object(obj, statics::MAPPING_ELEMENTS, &mut repairs).unwrap_or(&empty),
                member_object(obj, statics::MAPPING_FACTORS, &mut repairs).unwrap_or(&empty),
            ),
            None => {
                tracing::warn!(kind = value.type_name(), "mapping table is not an object, using an empty one");
                (&empty, &empty)
            }
        };

        let mut table = MappingTable::default();
        for (key, raw) in raw_elements {
            let list = match raw {
                ParamValue::Array(items) => items
                    .iter()
                    .map(|item| item.scalar_text().unwrap_or_else(|| item.to_json_compact()))
                    .collect(),
                ParamValue::Null => {
                    tracing::warn!(key = %key, "null elements entry replaced by an empty list");
                    repairs += 1;
                    Vec::new()
                }
                other => {
                    tracing::warn!(key = %key, "elements entry is not a list, wrapping it");
                    repairs += 1;
                    vec![other.scalar_text().unwrap_or_else(|| other.to_json_compact())]
                }
            };
            table.elements.insert(key.clone(), list);
        }

        for (key, raw) in raw_factors {
            let factor = raw.scalar_text().unwrap_or_default();
            if !table.elements.contains_key(key) {
                tracing::warn!(key = %key, "factor without elements, adding an empty list");
                repairs += 1;
                table.elements.insert(key.clone(), Vec::new());
            }
            table.factors.insert(key.clone(), factor);
        }

        let missing: Vec<String> = table
            .elements
            .keys()
            .filter(|k| !table.factors.contains_key(*k))
            .cloned()
            .collect();
        for key in missing {
            tracing::warn!(key = %key, "elements without factor, adding an empty factor");
            repairs += 1;
            table.factors.insert(key, String::new());
        }

        // Factors follow the row order of elements.
        let order: Vec<String> = table.elements.keys().cloned().collect();
        table.factors = order
            .into_iter()
            .map(|k| {
                let v = table.factors.shift_remove(&k).unwrap_or_default();
                (k, v)
            })
            .collect();

        (table, repairs)
    }

    pub fn to_value(&self) -> ParamValue {
        let elements = self
            .elements
            .iter()
            .map(|(k, v)| (k.clone(), ParamValue::string_list(v.iter().cloned())))
            .collect::<ParamMap>();
        let factors = self
            .factors
            .iter()
            .map(|(k, v)| (k.clone(), ParamValue::String(v.clone())))
            .collect::<ParamMap>();

        let mut table = ParamMap::new();
        table.insert(statics::MAPPING_ELEMENTS.to_string(), elements.into());
        table.insert(statics::MAPPING_FACTORS.to_string(), factors.into());
        table.into()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.elements.contains_key(key)
    }

    pub fn elements(&self, key: &str) -> Option<&[String]> {
        self.elements.get(key).map(Vec::as_slice)
    }

    pub fn factor(&self, key: &str) -> Option<&str> {
        self.factors.get(key).map(String::as_str)
    }

    /// Rows as `(key, elements, factor)` in table order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[String], &str)> {
        self.elements.iter().map(|(k, e)| {
            let factor = self.factors.get(k).map_or("", String::as_str);
            (k.as_str(), e.as_slice(), factor)
        })
    }

    pub fn keys_in_lockstep(&self) -> bool {
        self.elements.len() == self.factors.len()
            && self.elements.keys().zip(self.factors.keys()).all(|(a, b)| a == b)
    }

    /// `prefix + n` for the smallest `n >= start` that is not already a key.
    pub fn unique_key(&self, prefix: &str, start: usize) -> String {
        let occupied: HashSet<&str> = self.keys().collect();
        let mut n = start;
        loop {
            let candidate = format!("{prefix}{n}");
            if !occupied.contains(candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Add a row with no elements and an empty factor. Returns false if `key` exists.
    pub fn insert_empty(&mut self, key: &str) -> bool {
        if self.contains(key) {
            return false;
        }
        self.elements.insert(key.to_string(), Vec::new());
        self.factors.insert(key.to_string(), String::new());
        true
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let had_elements = self.elements.shift_remove(key).is_some();
        let had_factor = self.factors.shift_remove(key).is_some();
        had_elements || had_factor
    }

    /// Move the row at `old` to `new`, keeping its position. The caller checks that `old`
    /// exists and `new` does not.
    fn rename_in_place(&mut self, old: &str, new: &str) {
        self.elements = std::mem::take(&mut self.elements)
            .into_iter()
            .map(|(k, v)| if k == old { (new.to_string(), v) } else { (k, v) })
            .collect();
        self.factors = std::mem::take(&mut self.factors)
            .into_iter()
            .map(|(k, v)| if k == old { (new.to_string(), v) } else { (k, v) })
            .collect();
    }

    fn set_elements(&mut self, key: &str, elements: Vec<String>) -> bool {
        match self.elements.get_mut(key) {
            Some(slot) => {
                *slot = elements;
                true
            }
            None => false,
        }
    }

    fn set_factor(&mut self, key: &str, factor: String) -> bool {
        match self.factors.get_mut(key) {
            Some(slot) => {
                *slot = factor;
                true
            }
            None => false,
        }
    }
}

fn member_object<'a>(obj: &'a ParamMap, member: &str, repairs: &mut usize) -> Option<&'a ParamMap> {
    match obj.get(member) {
        Some(ParamValue::Object(map)) => Some(map),
        Some(other) => {
            tracing::warn!(member, kind = other.type_name(), "mapping member is not an object, using an empty one");
            *repairs += 1;
            None
        }
        None => {
            tracing::warn!(member, "mapping member missing, using an empty one");
            *repairs += 1;
            None
        }
    }
}

/// Split a `;`-delimited cell into element names.
pub fn split_elements(text: &str) -> Vec<String> {
    text.split(statics::LIST_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Default value of the `Mappings` field: both tables empty.
pub fn default_mappings() -> ParamValue {
    let mut mappings = ParamMap::new();
    for id in TableId::ALL {
        mappings.insert(id.key().to_string(), MappingTable::empty_value());
    }
    mappings.into()
}

/// Bring every mapping table inside a `Mappings` value back into lockstep.
pub fn repair_mappings(mappings: &mut ParamValue) {
    let Some(tables) = mappings.as_object_mut() else {
        tracing::warn!(kind = mappings.type_name(), "Mappings is not an object, resetting it");
        *mappings = default_mappings();
        return;
    };
    for (name, table) in tables.iter_mut() {
        let (repaired, repairs) = MappingTable::from_value(table);
        if repairs > 0 {
            tracing::warn!(table = %name, repairs, "mapping table repaired on load");
        }
        *table = repaired.to_value();
    }
}

/// Edits the mapping tables held in a form's `Mappings` field. Every operation commits the
/// whole `Mappings` value in one step.
pub struct TableEditor<'a> {
    form: &'a Form,
}

impl<'a> TableEditor<'a> {
    pub fn new(form: &'a Form) -> Self {
        Self { form }
    }

    pub fn table(&self, id: TableId) -> Result<MappingTable, TableError> {
        let mappings = self.form.get(statics::FIELD_MAPPINGS);
        let Some(raw) = mappings.as_ref().and_then(|m| m.get(id.key())) else {
            tracing::error!(table = %id, "mapping table missing from the working copy");
            return Err(TableError::MissingTable(id));
        };
        if raw.as_object().is_none() {
            tracing::error!(table = %id, kind = raw.type_name(), "mapping table is not an object");
            return Err(TableError::MissingTable(id));
        }
        Ok(MappingTable::from_value(raw).0)
    }

    /// Next free key for `id`, probing upward from the current row count.
    pub fn unique_key(&self, id: TableId) -> Result<String, TableError> {
        let table = self.table(id)?;
        Ok(table.unique_key(statics::MAPPING_KEY_PREFIX, table.len()))
    }

    /// Add an empty row under a fresh key and return the key.
    pub fn insert(&self, id: TableId) -> Result<String, TableError> {
        let mut table = self.table(id)?;
        let key = table.unique_key(statics::MAPPING_KEY_PREFIX, table.len());
        table.insert_empty(&key);
        self.commit(id, &table);
        Ok(key)
    }

    pub fn remove(&self, id: TableId, key: &str) -> Result<(), TableError> {
        let mut table = self.table(id)?;
        if !table.remove(key) {
            return Err(unknown(id, key));
        }
        self.commit(id, &table);
        Ok(())
    }

    pub fn rename(&self, id: TableId, old: &str, new: &str) -> Result<(), TableError> {
        let new = new.trim();
        if new.is_empty() {
            return Err(TableError::EmptyKey);
        }
        let mut table = self.table(id)?;
        if !table.contains(old) {
            return Err(unknown(id, old));
        }
        if old == new {
            return Ok(());
        }
        if table.contains(new) {
            return Err(TableError::DuplicateKey {
                table: id,
                key: new.to_string(),
            });
        }
        table.rename_in_place(old, new);
        self.commit(id, &table);
        Ok(())
    }

    /// Replace a row's elements from `;`-delimited text.
    pub fn set_elements(&self, id: TableId, key: &str, text: &str) -> Result<(), TableError> {
        let mut table = self.table(id)?;
        if !table.set_elements(key, split_elements(text)) {
            return Err(unknown(id, key));
        }
        self.commit(id, &table);
        Ok(())
    }

    pub fn set_factor(&self, id: TableId, key: &str, text: &str) -> Result<(), TableError> {
        let mut table = self.table(id)?;
        if !table.set_factor(key, text.trim().to_string()) {
            return Err(unknown(id, key));
        }
        self.commit(id, &table);
        Ok(())
    }

    fn commit(&self, id: TableId, table: &MappingTable) {
        let mut mappings = self
            .form
            .get(statics::FIELD_MAPPINGS)
            .and_then(ParamValue::into_object)
            .unwrap_or_default();
        mappings.insert(id.key().to_string(), table.to_value());
        self.form.set_field(statics::FIELD_MAPPINGS, mappings.into());
    }
}

fn unknown(table: TableId, key: &str) -> TableError {
    TableError::UnknownKey {
        table,
        key: key.to_string(),
    }
}

/// Where a table cell is in its edit cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CellState {
    #[default]
    Idle,
    Editing {
        original: String,
        buffer: String,
    },
    Committed(String),
}

/// `Idle -> Editing -> Committed -> Idle`. Only the commit reaches the document.
#[derive(Debug, Clone, Default)]
pub struct CellEdit {
    state: CellState,
}

impl CellEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &CellState {
        &self.state
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, CellState::Editing { .. })
    }

    /// Start editing from the cell's current text. Ignored while already editing.
    pub fn begin(&mut self, current: &str) {
        if self.state == CellState::Idle {
            self.state = CellState::Editing {
                original: current.to_string(),
                buffer: current.to_string(),
            };
        }
    }

    pub fn input(&mut self, text: &str) {
        if let CellState::Editing { buffer, .. } = &mut self.state {
            *buffer = text.to_string();
        }
    }

    pub fn buffer_mut(&mut self) -> Option<&mut String> {
        match &mut self.state {
            CellState::Editing { buffer, .. } => Some(buffer),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.state = CellState::Idle;
    }

    /// Hand the edited text to `apply` if it changed, then return to idle.
    /// Returns whether `apply` ran successfully.
    pub fn commit<E>(&mut self, apply: impl FnOnce(&str) -> Result<(), E>) -> Result<bool, E> {
        let CellState::Editing { original, buffer } = std::mem::take(&mut self.state) else {
            return Ok(false);
        };
        if buffer == original {
            return Ok(false);
        }
        self.state = CellState::Committed(buffer.clone());
        let result = apply(&buffer);
        self.state = CellState::Idle;
        result.map(|()| true)
    }
}
