//! External key-value stores that keep the replacement map alive between passes.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::StoreError;

/// Trait describing the durable store the replacement map is persisted through.
///
/// Stores own expiry: a value whose time-to-live has elapsed must read as absent.
pub trait CacheStore {
  /// Fetch the live value stored under `key`.
  fn get(&self, key: &str) -> Option<Value>;

  /// Store `value` under `key`, expiring `ttl` from now.
  fn set(&mut self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError>;
}

impl<S: CacheStore + ?Sized> CacheStore for &mut S {
  fn get(&self, key: &str) -> Option<Value> {
    (**self).get(key)
  }

  fn set(&mut self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError> {
    (**self).set(key, value, ttl)
  }
}

/// In-process store, useful for hosts that render many documents per process.
#[derive(Debug, Default)]
pub struct MemoryStore {
  entries: HashMap<String, (Value, Option<Instant>)>,
}

impl MemoryStore {
  /// Create an empty store.
  pub fn new() -> Self {
    Self::default()
  }

  /// Force the value under `key` to expire now.
  pub fn expire(&mut self, key: &str) {
    if let Some((_, expires_at)) = self.entries.get_mut(key) {
      *expires_at = Some(Instant::now());
    }
  }
}

impl CacheStore for MemoryStore {
  fn get(&self, key: &str) -> Option<Value> {
    let (value, expires_at) = self.entries.get(key)?;
    match expires_at {
      Some(deadline) if Instant::now() >= *deadline => None,
      _ => Some(value.clone()),
    }
  }

  fn set(&mut self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError> {
    let expires_at = Instant::now().checked_add(ttl);
    self.entries.insert(key.to_string(), (value, expires_at));
    Ok(())
  }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
  expires_at: u64,
  value: Value,
}

/// Store backed by a single JSON document on disk.
///
/// Each key records its value together with an absolute expiry in unix seconds. A missing
/// file reads as empty and a corrupt one is treated as if every key were absent; writing
/// replaces a corrupt file but refuses to clobber one that cannot be read.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
  path: PathBuf,
}

impl JsonFileStore {
  /// Create a store persisting to `path`. The file is created on first write.
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  fn read_entries(&self) -> Result<BTreeMap<String, StoredEntry>, StoreError> {
    let contents = match fs::read_to_string(&self.path) {
      Ok(contents) => contents,
      Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
        return Ok(BTreeMap::new());
      }
      Err(err) => {
        return Err(StoreError::Io {
          path: self.path.clone(),
          source: err,
        });
      }
    };

    serde_json::from_str(&contents).map_err(|err| StoreError::Parse {
      path: self.path.clone(),
      source: err,
    })
  }

  fn write_entries(&self, entries: &BTreeMap<String, StoredEntry>) -> Result<(), StoreError> {
    let io_error = |source| StoreError::Io {
      path: self.path.clone(),
      source,
    };

    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      fs::create_dir_all(parent).map_err(io_error)?;
    }

    let text = serde_json::to_string_pretty(entries).map_err(StoreError::Serialize)?;
    fs::write(&self.path, text).map_err(io_error)
  }
}

impl CacheStore for JsonFileStore {
  fn get(&self, key: &str) -> Option<Value> {
    let mut entries = match self.read_entries() {
      Ok(entries) => entries,
      Err(err) => {
        warn!(error = %err, "Ignoring unreadable cache store");
        return None;
      }
    };

    let entry = entries.remove(key)?;
    (entry.expires_at > unix_now()).then_some(entry.value)
  }

  fn set(&mut self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError> {
    let mut entries = match self.read_entries() {
      Ok(entries) => entries,
      Err(err @ StoreError::Parse { .. }) => {
        warn!(error = %err, "Replacing corrupt cache store");
        BTreeMap::new()
      }
      Err(err) => return Err(err),
    };

    let now = unix_now();
    entries.retain(|_, entry| entry.expires_at > now);
    entries.insert(
      key.to_string(),
      StoredEntry {
        expires_at: now.saturating_add(ttl.as_secs()),
        value,
      },
    );

    self.write_entries(&entries)
  }
}

fn unix_now() -> u64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|elapsed| elapsed.as_secs())
    .unwrap_or(0)
}
