//! Generic record-store machinery
//! One `RecordStore` per record kind persists the whole collection as a JSON
//! array under a single storage key. Every load repairs each element through
//! the kind's normalizer and re-sorts; every mutation is a full
//! read-modify-write of the collection. `SettingsStore` is the singleton
//! counterpart for per-kind settings objects.

pub mod normalize;
pub mod sort;

use crate::storage::Storage;
use crate::utils::now_ms;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

pub use sort::{sort_records, Rank};

/// A record kind the generic store can manage
pub trait Record: Clone + Serialize + Send + Sync + 'static {
    /// Short kind tag used in synthesized ids and log lines
    const KIND: &'static str;

    /// Total repair of an arbitrary JSON value into a fully-populated record.
    /// Must never fail; unknown fields are dropped, bad fields get defaults.
    fn normalize(raw: &Value) -> Self;

    fn id(&self) -> &str;

    fn updated_at(&self) -> i64;

    fn rank(&self) -> Rank;
}

/// How overlapping mutations against the same key compose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyMode {
    /// Mutations take a per-store mutex, so overlapping calls all land
    #[default]
    Serialized,
    /// No gate: each mutation re-reads and rewrites the whole collection,
    /// and an overlapping write silently discards the earlier one. Matches
    /// the behavior of the original storage layer.
    LastWriteWins,
}

/// Collection store for one record kind
pub struct RecordStore<R: Record> {
    storage: Arc<dyn Storage>,
    key: &'static str,
    seed: Vec<Value>,
    mode: ConcurrencyMode,
    gate: Mutex<()>,
    _kind: PhantomData<R>,
}

impl<R: Record> RecordStore<R> {
    pub fn new(storage: Arc<dyn Storage>, key: &'static str) -> Self {
        Self {
            storage,
            key,
            seed: Vec::new(),
            mode: ConcurrencyMode::default(),
            gate: Mutex::new(()),
            _kind: PhantomData,
        }
    }

    /// Collection written and returned when the key is absent or unreadable
    pub fn with_seed(mut self, seed: Vec<Value>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.mode = mode;
        self
    }

    fn seeded(&self) -> Vec<R> {
        let mut records: Vec<R> = self.seed.iter().map(R::normalize).collect();
        sort_records(&mut records);
        records
    }

    async fn guard(&self) -> Option<MutexGuard<'_, ()>> {
        match self.mode {
            ConcurrencyMode::Serialized => Some(self.gate.lock().await),
            ConcurrencyMode::LastWriteWins => None,
        }
    }

    /// Load the collection: normalize every element, sort, return.
    /// Reads never fail; a missing key persists and returns the seed, and
    /// malformed or unreadable data silently degrades to the seed.
    pub async fn load(&self) -> Vec<R> {
        match self.storage.get_item(self.key).await {
            Ok(Some(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Array(items)) => {
                    let mut records: Vec<R> = items.iter().map(R::normalize).collect();
                    sort_records(&mut records);
                    records
                }
                Ok(_) => {
                    warn!(
                        kind = R::KIND,
                        key = self.key,
                        "stored collection is not a JSON array, using seed"
                    );
                    self.seeded()
                }
                Err(err) => {
                    warn!(
                        kind = R::KIND,
                        key = self.key,
                        %err,
                        "stored collection is not valid JSON, using seed"
                    );
                    self.seeded()
                }
            },
            Ok(None) => {
                let records = self.seeded();
                if let Err(err) = self.persist(&records).await {
                    warn!(kind = R::KIND, key = self.key, %err, "failed to persist seed collection");
                }
                records
            }
            Err(err) => {
                warn!(kind = R::KIND, key = self.key, %err, "storage read failed, degrading to seed");
                self.seeded()
            }
        }
    }

    /// Write the given collection verbatim. Callers pass already-normalized
    /// records; no implicit re-normalization happens here.
    pub async fn save(&self, records: &[R]) -> Result<()> {
        self.persist(records).await
    }

    async fn persist(&self, records: &[R]) -> Result<()> {
        let text = serde_json::to_string(records)
            .with_context(|| format!("serializing {} collection", R::KIND))?;
        self.storage
            .set_item(self.key, &text)
            .await
            .with_context(|| format!("writing {} collection", R::KIND))
    }

    /// Normalize the payload into a full record (assigning id and timestamps
    /// when absent), append, sort, persist, return the whole collection.
    pub async fn add(&self, payload: Value) -> Result<Vec<R>> {
        let _gate = self.guard().await;
        let mut records = self.load().await;
        let record = R::normalize(&payload);
        debug!(kind = R::KIND, id = record.id(), "adding record");
        records.push(record);
        sort_records(&mut records);
        self.persist(&records).await?;
        Ok(records)
    }

    /// Shallow-merge a literal patch over the record with the given id.
    /// Patch keys address fields by their canonical name; the camelCase
    /// spelling of a canonical name works too, but read-only legacy aliases
    /// (like `title` for a record whose field is `summary`) do not.
    /// Returns `Ok(None)` without touching storage when no record matches.
    pub async fn update(&self, id: &str, patch: Value) -> Result<Option<Vec<R>>> {
        let _gate = self.guard().await;
        self.apply_update(id, |_| patch).await
    }

    /// Patch computed from the current record, for toggles and counters
    pub async fn update_with<F>(&self, id: &str, patch: F) -> Result<Option<Vec<R>>>
    where
        F: FnOnce(&R) -> Value,
    {
        let _gate = self.guard().await;
        self.apply_update(id, patch).await
    }

    async fn apply_update<F>(&self, id: &str, patch: F) -> Result<Option<Vec<R>>>
    where
        F: FnOnce(&R) -> Value,
    {
        let mut records = self.load().await;
        let Some(pos) = records.iter().position(|r| r.id() == id) else {
            debug!(kind = R::KIND, id, "update target not found");
            return Ok(None);
        };

        let patch = patch(&records[pos]);
        let mut merged = serde_json::to_value(&records[pos])
            .with_context(|| format!("serializing {} record for patch", R::KIND))?;
        // The serialized record carries canonical snake_case keys, so patch
        // keys are snake-cased first; otherwise a camelCase spelling would
        // sit next to the stale canonical key and lose the normalizer lookup.
        let mut supplied_updated_at = false;
        if let (Some(target), Some(fields)) = (merged.as_object_mut(), patch.as_object()) {
            for (name, value) in fields {
                let name = normalize::snake_key(name);
                supplied_updated_at |= name == "updated_at";
                target.insert(name, value.clone());
            }
        }
        if !supplied_updated_at {
            // Strictly advance updated_at even within the same millisecond
            let stamp = now_ms().max(records[pos].updated_at() + 1);
            if let Some(target) = merged.as_object_mut() {
                target.insert("updated_at".to_string(), json!(stamp));
            }
        }

        records[pos] = R::normalize(&merged);
        sort_records(&mut records);
        self.persist(&records).await?;
        Ok(Some(records))
    }

    /// Filter out the record with the given id. Removing a missing id is a
    /// no-op that still returns the unchanged collection.
    pub async fn remove(&self, id: &str) -> Result<Vec<R>> {
        let _gate = self.guard().await;
        let mut records = self.load().await;
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() != before {
            debug!(kind = R::KIND, id, "removed record");
            self.persist(&records).await?;
        }
        Ok(records)
    }

    /// Keep only records matching the predicate, persist when anything was
    /// dropped, and return the remainder
    pub async fn retain<F>(&self, mut keep: F) -> Result<Vec<R>>
    where
        F: FnMut(&R) -> bool,
    {
        let _gate = self.guard().await;
        let mut records = self.load().await;
        let before = records.len();
        records.retain(|r| keep(r));
        if records.len() != before {
            debug!(
                kind = R::KIND,
                dropped = before - records.len(),
                "bulk filter persisted"
            );
            self.persist(&records).await?;
        }
        Ok(records)
    }
}

/// A singleton settings object with hard defaults and per-field validation
pub trait Settings: Clone + Default + Serialize + Send + Sync + 'static {
    const KIND: &'static str;

    /// Merge a stored (possibly partial or stale) blob over the defaults,
    /// validating each field independently. Total, like record normalization.
    fn merge_over_defaults(raw: &Value) -> Self;
}

/// Store for one settings singleton
pub struct SettingsStore<S: Settings> {
    storage: Arc<dyn Storage>,
    key: &'static str,
    mode: ConcurrencyMode,
    gate: Mutex<()>,
    _kind: PhantomData<S>,
}

impl<S: Settings> SettingsStore<S> {
    pub fn new(storage: Arc<dyn Storage>, key: &'static str) -> Self {
        Self {
            storage,
            key,
            mode: ConcurrencyMode::default(),
            gate: Mutex::new(()),
            _kind: PhantomData,
        }
    }

    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.mode = mode;
        self
    }

    async fn guard(&self) -> Option<MutexGuard<'_, ()>> {
        match self.mode {
            ConcurrencyMode::Serialized => Some(self.gate.lock().await),
            ConcurrencyMode::LastWriteWins => None,
        }
    }

    /// Stored settings merged over defaults; never fails. A corrupted blob
    /// must not block the feature, so it reads as the defaults.
    pub async fn load(&self) -> S {
        match self.storage.get_item(self.key).await {
            Ok(Some(text)) => match serde_json::from_str::<Value>(&text) {
                Ok(raw) => S::merge_over_defaults(&raw),
                Err(err) => {
                    warn!(kind = S::KIND, key = self.key, %err, "settings blob is not valid JSON, using defaults");
                    S::default()
                }
            },
            Ok(None) => S::default(),
            Err(err) => {
                warn!(kind = S::KIND, key = self.key, %err, "storage read failed, using default settings");
                S::default()
            }
        }
    }

    /// Shallow-merge the patch over current settings, re-validate field by
    /// field, persist, and return the merged object
    pub async fn update(&self, patch: Value) -> Result<S> {
        let _gate = self.guard().await;
        let current = self.load().await;
        let mut merged = serde_json::to_value(&current)
            .with_context(|| format!("serializing {} settings", S::KIND))?;
        if let (Some(target), Some(fields)) = (merged.as_object_mut(), patch.as_object()) {
            for (name, value) in fields {
                target.insert(name.clone(), value.clone());
            }
        }
        let next = S::merge_over_defaults(&merged);
        self.persist(&next).await?;
        Ok(next)
    }

    /// Reset to defaults by persisting the default object
    pub async fn reset(&self) -> Result<S> {
        let _gate = self.guard().await;
        let settings = S::default();
        self.persist(&settings).await?;
        Ok(settings)
    }

    async fn persist(&self, settings: &S) -> Result<()> {
        let text = serde_json::to_string(settings)
            .with_context(|| format!("serializing {} settings", S::KIND))?;
        self.storage
            .set_item(self.key, &text)
            .await
            .with_context(|| format!("writing {} settings", S::KIND))
    }
}
