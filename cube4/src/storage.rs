//! Persistence boundary for the learned state.
//!
//! The core never touches storage directly. Records are serialized as
//! `{ "version": N, "data": ... }` JSON envelopes and handed to a
//! [`BlobStore`] as opaque bytes. Anything unreadable on the way back
//! (missing blob, wrong version, bad JSON, failed validation) is replaced by
//! the record's default.
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::learning::{LearnedState, Memory, Profile, Weights};
use crate::COLUMNS;

pub trait BlobStore: Send + Sync {
    fn load(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn save(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// One `<key>.json` file per record under a directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl BlobStore for FileStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }

    fn save(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.path(key);
        fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("removing {}", path.display())),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs.lock().map_err(|_| anyhow!("blob map lock poisoned"))
    }
}

impl BlobStore for MemoryStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.blobs()?.get(key).cloned())
    }

    fn save(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()> {
        self.blobs()?.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.blobs()?.remove(key);
        Ok(())
    }
}

/// A versioned value stored under a fixed key.
pub trait Record: Serialize + DeserializeOwned + Default {
    const KEY: &'static str;
    const VERSION: u32 = 1;

    /// Extra checks serde cannot express.
    fn is_valid(&self) -> bool {
        true
    }
}

impl Record for Profile {
    const KEY: &'static str = "cube4_profile_v1";

    fn is_valid(&self) -> bool {
        self.heat.len() == COLUMNS
    }
}

impl Record for Memory {
    const KEY: &'static str = "cube4_memory_v1";

    fn is_valid(&self) -> bool {
        self.is_consistent()
    }
}

impl Record for Weights {
    const KEY: &'static str = "cube4_weights_v1";

    fn is_valid(&self) -> bool {
        [
            self.center,
            self.two,
            self.three,
            self.block_two,
            self.block_three,
            self.open_two,
            self.open_three,
            self.height,
        ]
        .iter()
        .all(|w| w.is_finite())
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    data: serde_json::Value,
}

fn decode<R: Record>(bytes: &[u8]) -> anyhow::Result<R> {
    let envelope: Envelope = serde_json::from_slice(bytes).context("parsing envelope")?;
    if envelope.version != R::VERSION {
        return Err(anyhow!(
            "version {} does not match expected {}",
            envelope.version,
            R::VERSION
        ));
    }
    let record: R = serde_json::from_value(envelope.data).context("parsing record")?;
    if !record.is_valid() {
        return Err(anyhow!("record failed validation"));
    }
    Ok(record)
}

/// Reads `R`, substituting its default for anything missing or unreadable.
pub fn load_record<R: Record>(store: &dyn BlobStore) -> R {
    let bytes = match store.load(R::KEY) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!(key = R::KEY, "no stored record, using defaults");
            return R::default();
        }
        Err(err) => {
            warn!(key = R::KEY, error = %format!("{err:#}"), "failed to read record, using defaults");
            return R::default();
        }
    };
    match decode(&bytes) {
        Ok(record) => record,
        Err(err) => {
            warn!(key = R::KEY, error = %format!("{err:#}"), "discarding stored record");
            R::default()
        }
    }
}

pub fn save_record<R: Record>(store: &dyn BlobStore, record: &R) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec(&EnvelopeRef {
        version: R::VERSION,
        data: record,
    })
    .with_context(|| format!("serializing {}", R::KEY))?;
    store.save(R::KEY, &bytes)
}

pub fn clear_record<R: Record>(store: &dyn BlobStore) -> anyhow::Result<()> {
    store.remove(R::KEY)
}

/// Loads and saves the three learned records together.
#[derive(Clone)]
pub struct LearnedStore {
    store: Arc<dyn BlobStore>,
}

impl LearnedStore {
    pub fn new(store: impl BlobStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn blobs(&self) -> &dyn BlobStore {
        self.store.as_ref()
    }

    pub fn load(&self) -> LearnedState {
        let store = self.blobs();
        LearnedState {
            profile: load_record(store),
            memory: load_record(store),
            weights: load_record(store),
        }
    }

    pub fn save(&self, state: &LearnedState) -> anyhow::Result<()> {
        let store = self.blobs();
        save_record(store, &state.profile)?;
        save_record(store, &state.memory)?;
        save_record(store, &state.weights)
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        let store = self.blobs();
        clear_record::<Profile>(store)?;
        clear_record::<Memory>(store)?;
        clear_record::<Weights>(store)
    }
}
