//! Origin URL to CDN URL mapping shared by every scan of a rewrite pass.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::warn;

use super::store::CacheStore;
use crate::error::StoreError;

/// Confirmed origin URL to CDN URL pairs.
///
/// Keys are origin URLs exactly as authored; values are fully qualified CDN URLs. Only
/// positive probe outcomes are ever inserted. Expiry applies to the map as a whole through
/// the store it is persisted to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplacementMap {
  entries: BTreeMap<String, String>,
}

impl ReplacementMap {
  /// Create an empty map.
  pub fn new() -> Self {
    Self::default()
  }

  /// Load the persisted map stored under `key`.
  ///
  /// Absent, expired or not map-shaped payloads all yield an empty map.
  pub fn load<S: CacheStore + ?Sized>(store: &S, key: &str) -> Self {
    match store.get(key) {
      Some(value) => Self::from_value(value).unwrap_or_else(|| {
        warn!(key, "Discarding replacement map with unexpected shape");
        Self::new()
      }),
      None => Self::new(),
    }
  }

  /// Write the map back under `key`, restarting the expiry clock.
  pub fn persist<S: CacheStore + ?Sized>(
    &self,
    store: &mut S,
    key: &str,
    ttl: Duration,
  ) -> Result<(), StoreError> {
    store.set(key, self.to_value(), ttl)
  }

  /// CDN URL previously confirmed for `origin_url`.
  pub fn lookup(&self, origin_url: &str) -> Option<&str> {
    self.entries.get(origin_url).map(String::as_str)
  }

  /// Record a confirmed mapping, replacing any previous value.
  pub fn insert(&mut self, origin_url: impl Into<String>, cdn_url: impl Into<String>) {
    self.entries.insert(origin_url.into(), cdn_url.into());
  }

  /// Number of stored mappings.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  /// Returns `true` when no mappings are stored.
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  fn from_value(value: Value) -> Option<Self> {
    let Value::Object(object) = value else {
      return None;
    };

    let mut entries = BTreeMap::new();
    for (origin, cdn) in object {
      let Value::String(cdn) = cdn else {
        return None;
      };
      entries.insert(origin, cdn);
    }
    Some(Self { entries })
  }

  fn to_value(&self) -> Value {
    let object: Map<String, Value> = self
      .entries
      .iter()
      .map(|(origin, cdn)| (origin.clone(), Value::String(cdn.clone())))
      .collect();
    Value::Object(object)
  }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ReplacementMap {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    Self {
      entries: iter
        .into_iter()
        .map(|(origin, cdn)| (origin.into(), cdn.into()))
        .collect(),
    }
  }
}
