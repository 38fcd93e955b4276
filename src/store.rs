//! Session-scoped typed key/value store holding the shared parameter document.
//!
//! One backend, four transcoders. Only the parameter document is seeded; every other key
//! reads back as `None` until something sets it.

use crate::{ParamValue, error::StoreError, statics, value};
use anyhow::Context;
use indexmap::IndexMap;
use std::{
    cell::{Cell, RefCell},
    fs,
    io::Write,
    marker::PhantomData,
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

/// Durable string storage underneath the store. Synchronous and always available.
pub trait StorageBackend {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn write(&mut self, key: &str, value: String) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
    fn keys(&self) -> Vec<String>;
}

/// Lives as long as the process; the default session medium.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: IndexMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: String) -> anyhow::Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.entries.shift_remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// A session kept in one JSON object file (key -> encoded string), so a session survives
/// restarts of the shell. Every write rewrites the whole file through a sibling temp file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    entries: IndexMap<String, String>,
}

impl FileStorage {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let entries = if path.exists() {
            let text =
                fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
            if text.trim().is_empty() {
                IndexMap::new()
            } else {
                let root = ParamValue::parse_json5(&text)
                    .with_context(|| format!("parsing session file {path:?}"))?;
                let Some(map) = root.into_object() else {
                    anyhow::bail!("session file {path:?} is not a JSON object");
                };
                map.into_iter()
                    .filter_map(|(k, v)| match v {
                        ParamValue::String(s) => Some((k, s)),
                        other => {
                            tracing::warn!(key = %k, kind = other.type_name(), "skipping non-string session entry");
                            None
                        }
                    })
                    .collect()
            }
        } else {
            IndexMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the session file with `entries` in one step: a sibling temp file, then persist.
    fn flush(&self, entries: &IndexMap<String, String>) -> anyhow::Result<()> {
        let root = ParamValue::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), ParamValue::String(v.clone())))
                .collect(),
        );
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut tmp =
            NamedTempFile::new_in(dir).with_context(|| format!("creating temp file in {dir:?}"))?;
        tmp.write_all(root.to_json_pretty().as_bytes())
            .with_context(|| format!("writing {:?}", tmp.path()))?;
        tmp.persist(&self.path)
            .with_context(|| format!("replacing {:?}", self.path))?;
        Ok(())
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    /// The entry is only visible to reads once it reached the file.
    fn write(&mut self, key: &str, value: String) -> anyhow::Result<()> {
        let mut next = self.entries.clone();
        next.insert(key.to_string(), value);
        self.flush(&next)?;
        self.entries = next;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        let mut next = self.entries.clone();
        next.shift_remove(key);
        self.flush(&next)?;
        self.entries = next;
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Encoding used by one typed view of the store.
pub trait Transcoder {
    type Value;
    const NAME: &'static str;

    fn encode(value: &Self::Value) -> String;
    fn decode(text: &str) -> Result<Self::Value, String>;
}

pub struct StringCodec;
pub struct NumberCodec;
pub struct BooleanCodec;
pub struct JsonCodec;

impl Transcoder for StringCodec {
    type Value = String;
    const NAME: &'static str = "string";

    fn encode(value: &String) -> String {
        value.clone()
    }

    fn decode(text: &str) -> Result<String, String> {
        Ok(text.to_string())
    }
}

impl Transcoder for NumberCodec {
    type Value = f64;
    const NAME: &'static str = "number";

    fn encode(value: &f64) -> String {
        value::format_f64(*value)
    }

    fn decode(text: &str) -> Result<f64, String> {
        match text.trim() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            t => t.parse::<f64>().map_err(|e| e.to_string()),
        }
    }
}

impl Transcoder for BooleanCodec {
    type Value = bool;
    const NAME: &'static str = "boolean";

    fn encode(value: &bool) -> String {
        value.to_string()
    }

    fn decode(text: &str) -> Result<bool, String> {
        match text.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(format!("expected true/false, got {other:?}")),
        }
    }
}

impl Transcoder for JsonCodec {
    type Value = ParamValue;
    const NAME: &'static str = "json";

    fn encode(value: &ParamValue) -> String {
        value.to_json_compact()
    }

    fn decode(text: &str) -> Result<ParamValue, String> {
        ParamValue::parse_json5(text).map_err(|e| format!("{e:#}"))
    }
}

/// The single owner of the parameter document and the session flags.
pub struct DocumentStore {
    backend: RefCell<Box<dyn StorageBackend>>,
    writes: Cell<u64>,
}

impl DocumentStore {
    /// Open the store and seed an empty parameter document if none exists yet.
    pub fn open(backend: Box<dyn StorageBackend>) -> Result<Self, StoreError> {
        let store = Self {
            backend: RefCell::new(backend),
            writes: Cell::new(0),
        };
        store.seed()?;
        Ok(store)
    }

    /// A fresh session that lives as long as the process.
    pub fn in_memory() -> Self {
        let store = Self {
            backend: RefCell::new(Box::new(MemoryStorage::new())),
            writes: Cell::new(0),
        };
        if let Err(err) = store.seed() {
            tracing::error!("seeding parameter document: {err}");
        }
        store
    }

    fn seed(&self) -> Result<(), StoreError> {
        if self.read_raw(statics::STORE_PARAMETERS)?.is_none() {
            self.set_parameters(&ParamValue::empty_object())?;
        }
        Ok(())
    }

    pub fn string(&self) -> Typed<'_, StringCodec> {
        Typed::new(self)
    }

    pub fn number(&self) -> Typed<'_, NumberCodec> {
        Typed::new(self)
    }

    pub fn boolean(&self) -> Typed<'_, BooleanCodec> {
        Typed::new(self)
    }

    pub fn json(&self) -> Typed<'_, JsonCodec> {
        Typed::new(self)
    }

    /// The current parameter document, if one is stored and decodes.
    /// Decode failures are reported and read as absent so callers degrade instead of failing.
    pub fn parameters(&self) -> Option<ParamValue> {
        match self.json().get(statics::STORE_PARAMETERS) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::error!("reading parameter document: {err}");
                None
            }
        }
    }

    /// Replace the whole parameter document in one write.
    pub fn set_parameters(&self, document: &ParamValue) -> Result<(), StoreError> {
        self.json().set(statics::STORE_PARAMETERS, document)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.backend.borrow_mut().remove(key)?;
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }

    pub fn keys(&self) -> Vec<String> {
        self.backend.borrow().keys()
    }

    /// Number of backend writes since the store was opened.
    pub fn write_count(&self) -> u64 {
        self.writes.get()
    }

    fn read_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.backend.borrow().read(key)?)
    }

    fn write_raw(&self, key: &str, encoded: String) -> Result<(), StoreError> {
        self.backend.borrow_mut().write(key, encoded)?;
        self.writes.set(self.writes.get() + 1);
        tracing::debug!(key, "store write");
        Ok(())
    }
}

/// Typed view over the store using one transcoder.
pub struct Typed<'a, C: Transcoder> {
    store: &'a DocumentStore,
    codec: PhantomData<C>,
}

impl<'a, C: Transcoder> Typed<'a, C> {
    fn new(store: &'a DocumentStore) -> Self {
        Self {
            store,
            codec: PhantomData,
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<C::Value>, StoreError> {
        let Some(text) = self.store.read_raw(key)? else {
            return Ok(None);
        };
        C::decode(&text)
            .map(Some)
            .map_err(|reason| StoreError::Decode {
                key: key.to_string(),
                channel: C::NAME,
                reason,
            })
    }

    pub fn set(&self, key: &str, value: &C::Value) -> Result<(), StoreError> {
        self.store.write_raw(key, C::encode(value))
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentStore, FileStorage, MemoryStorage, StorageBackend};
    use crate::{ParamValue, error::StoreError, statics};

    #[test]
    fn parameters_are_seeded_but_other_keys_are_absent() {
        let store = DocumentStore::open(Box::new(MemoryStorage::new())).unwrap();
        assert_eq!(store.parameters(), Some(ParamValue::empty_object()));
        assert_eq!(store.string().get(statics::STORE_RUN_OPT).unwrap(), None);
        assert_eq!(store.boolean().get(statics::STORE_IS_DEFAULT_CONF).unwrap(), None);
        assert_eq!(store.number().get("anything").unwrap(), None);
    }

    #[test]
    fn typed_channels_round_trip() {
        let store = DocumentStore::in_memory();
        store.string().set(statics::STORE_RUN_OPT, &"-g".to_string()).unwrap();
        store.boolean().set(statics::STORE_IS_DEFAULT_CONF, &true).unwrap();
        store.number().set("zoom", &1.25).unwrap();

        assert_eq!(store.string().get(statics::STORE_RUN_OPT).unwrap().as_deref(), Some("-g"));
        assert_eq!(store.boolean().get(statics::STORE_IS_DEFAULT_CONF).unwrap(), Some(true));
        assert_eq!(store.number().get("zoom").unwrap(), Some(1.25));
    }

    #[test]
    fn wrong_channel_is_a_decode_error() {
        let store = DocumentStore::in_memory();
        store.string().set("flag", &"maybe".to_string()).unwrap();
        let err = store.boolean().get("flag").unwrap_err();
        assert!(matches!(err, StoreError::Decode { channel: "boolean", .. }));
    }

    #[test]
    fn file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        {
            let store = DocumentStore::open(Box::new(FileStorage::open(&path).unwrap())).unwrap();
            let doc = ParamValue::parse_json5("{ Title: 'Hello', Verbosity: 2 }").unwrap();
            store.set_parameters(&doc).unwrap();
        }

        let store = DocumentStore::open(Box::new(FileStorage::open(&path).unwrap())).unwrap();
        let doc = store.parameters().unwrap();
        assert_eq!(doc.get("Title").and_then(|v| v.as_str()), Some("Hello"));
    }

    #[test]
    fn failed_flush_leaves_the_entry_unwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("session.json");
        let mut storage = FileStorage::open(&path).unwrap();

        assert!(StorageBackend::write(&mut storage, "run_opt", "-g".to_string()).is_err());
        assert_eq!(storage.read("run_opt").unwrap(), None);
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn flush_replaces_the_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut storage = FileStorage::open(&path).unwrap();
        storage.write("a", "1".to_string()).unwrap();
        storage.write("b", "2".to_string()).unwrap();
        storage.remove("a").unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("session.json")]);
        assert_eq!(FileStorage::open(&path).unwrap().keys(), vec!["b".to_string()]);
    }

    #[test]
    fn seeding_does_not_overwrite_an_existing_document() {
        let mut backend = MemoryStorage::new();
        crate::store::StorageBackend::write(
            &mut backend,
            statics::STORE_PARAMETERS,
            r#"{"Title":"kept"}"#.to_string(),
        )
        .unwrap();
        let store = DocumentStore::open(Box::new(backend)).unwrap();
        assert_eq!(
            store.parameters().unwrap().get("Title").and_then(|v| v.as_str()),
            Some("kept")
        );
        assert_eq!(store.write_count(), 0);
    }
}
