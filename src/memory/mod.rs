//! Chat memory entries
//! Long-term facts the companion has captured about the user, plus the
//! memory settings singleton and capacity accounting over the collection.

use crate::storage::Storage;
use crate::store::normalize::{
    field, flag, positive_int, record_id, string_set, text, timestamp, unit_ratio,
    valid_positive_int,
};
use crate::store::{ConcurrencyMode, Rank, Record, RecordStore, Settings, SettingsStore};
use crate::usage::{usage, Footprint, UsageSummary};
use crate::utils::now_ms;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const MEMORY_ENTRIES_KEY: &str = "memory_entries";
pub const MEMORY_SETTINGS_KEY: &str = "memory_settings";

const UNTITLED: &str = "Untitled memory";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryCategory {
    Identity,
    Preference,
    Event,
    Relationship,
    #[default]
    Other,
}

impl MemoryCategory {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "identity" => Some(Self::Identity),
            "preference" => Some(Self::Preference),
            "event" => Some(Self::Event),
            "relationship" => Some(Self::Relationship),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Whether an entry belongs to the whole companion or one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemoryScope {
    #[default]
    Global,
    Conversation,
}

impl MemoryScope {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "global" => Some(Self::Global),
            "conversation" => Some(Self::Conversation),
            _ => None,
        }
    }
}

/// One captured memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub summary: String,
    pub detail: String,
    pub keywords: Vec<String>,
    pub category: MemoryCategory,
    pub scope: MemoryScope,
    /// How sure the companion is about this fact, in [0, 1]
    pub confidence: f64,
    /// Context footprint when injected, at least 1
    pub tokens: u32,
    /// Unreviewed entries surface first among the non-pinned
    pub reviewed: bool,
    pub pinned: bool,
    pub enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

fn estimate_tokens(summary: &str, detail: &str) -> u32 {
    let chars = summary.chars().count() + detail.chars().count();
    ((chars / 4) as u32).max(1)
}

impl Record for MemoryEntry {
    const KIND: &'static str = "memory";

    fn normalize(raw: &Value) -> Self {
        let now = now_ms();
        let summary = text(raw, &["summary", "title"], UNTITLED);
        let detail = text(raw, &["detail", "content"], "");
        let created_at = timestamp(raw, &["created_at", "createdAt"], now);
        let tokens_default = estimate_tokens(&summary, &detail);
        Self {
            id: record_id(raw, &["id"], "mem"),
            keywords: string_set(raw, &["keywords", "tags"]),
            category: field(raw, &["category"])
                .and_then(Value::as_str)
                .and_then(MemoryCategory::parse)
                .unwrap_or_default(),
            scope: field(raw, &["scope"])
                .and_then(Value::as_str)
                .and_then(MemoryScope::parse)
                .unwrap_or_default(),
            confidence: unit_ratio(raw, &["confidence"], 0.8),
            tokens: positive_int(raw, &["tokens"], tokens_default),
            reviewed: flag(raw, &["reviewed"], true),
            pinned: flag(raw, &["pinned"], false),
            enabled: flag(raw, &["enabled"], true),
            updated_at: timestamp(raw, &["updated_at", "updatedAt"], created_at),
            summary,
            detail,
            created_at,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn rank(&self) -> Rank {
        Rank {
            pinned: self.pinned,
            attention: !self.reviewed,
            recent_at: self.updated_at,
        }
    }
}

impl Footprint for MemoryEntry {
    fn footprint(&self) -> u64 {
        self.tokens as u64
    }
}

/// Memory settings singleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Capture new memories automatically during chat
    pub auto_capture: bool,
    /// Token capacity the usage bar is measured against
    pub token_capacity: u32,
    /// When conversation-scoped entries were last cleared, if ever
    pub last_cleanup_at: Option<i64>,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            auto_capture: true,
            token_capacity: 8000,
            last_cleanup_at: None,
        }
    }
}

impl Settings for MemorySettings {
    const KIND: &'static str = "memory_settings";

    fn merge_over_defaults(raw: &Value) -> Self {
        let defaults = Self::default();
        Self {
            auto_capture: flag(raw, &["auto_capture", "autoCapture"], defaults.auto_capture),
            token_capacity: valid_positive_int(
                raw,
                &["token_capacity", "tokenCapacity"],
                defaults.token_capacity,
            ),
            last_cleanup_at: field(raw, &["last_cleanup_at", "lastCleanupAt"])
                .and_then(Value::as_i64)
                .filter(|ms| *ms >= 0),
        }
    }
}

/// Store surface for the memory screen
pub struct MemoryVault {
    entries: RecordStore<MemoryEntry>,
    settings: SettingsStore<MemorySettings>,
    storage: Arc<dyn Storage>,
}

impl MemoryVault {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            entries: RecordStore::new(storage.clone(), MEMORY_ENTRIES_KEY),
            settings: SettingsStore::new(storage.clone(), MEMORY_SETTINGS_KEY),
            storage,
        }
    }

    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.entries = self.entries.with_mode(mode);
        self.settings = self.settings.with_mode(mode);
        self
    }

    pub async fn load(&self) -> Vec<MemoryEntry> {
        self.entries.load().await
    }

    pub async fn add(&self, payload: Value) -> Result<Vec<MemoryEntry>> {
        self.entries.add(payload).await
    }

    pub async fn update(&self, id: &str, patch: Value) -> Result<Option<Vec<MemoryEntry>>> {
        self.entries.update(id, patch).await
    }

    pub async fn toggle_pinned(&self, id: &str) -> Result<Option<Vec<MemoryEntry>>> {
        self.entries
            .update_with(id, |e| json!({ "pinned": !e.pinned }))
            .await
    }

    pub async fn toggle_reviewed(&self, id: &str) -> Result<Option<Vec<MemoryEntry>>> {
        self.entries
            .update_with(id, |e| json!({ "reviewed": !e.reviewed }))
            .await
    }

    pub async fn toggle_enabled(&self, id: &str) -> Result<Option<Vec<MemoryEntry>>> {
        self.entries
            .update_with(id, |e| json!({ "enabled": !e.enabled }))
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<Vec<MemoryEntry>> {
        self.entries.remove(id).await
    }

    /// Drop conversation-scoped entries, keeping the ones the user pinned,
    /// and stamp the cleanup time in settings
    pub async fn clear_conversation_scoped(&self) -> Result<Vec<MemoryEntry>> {
        let remaining = self
            .entries
            .retain(|e| e.scope != MemoryScope::Conversation || e.pinned)
            .await?;
        self.settings
            .update(json!({ "last_cleanup_at": now_ms() }))
            .await?;
        Ok(remaining)
    }

    /// Capacity summary over all persisted entries, enabled or not
    pub async fn usage(&self) -> UsageSummary {
        let entries = self.load().await;
        let settings = self.settings.load().await;
        usage(&entries, settings.token_capacity as u64)
    }

    pub async fn load_settings(&self) -> MemorySettings {
        self.settings.load().await
    }

    pub async fn update_settings(&self, patch: Value) -> Result<MemorySettings> {
        self.settings.update(patch).await
    }

    /// Remove both the collection and the settings blob
    pub async fn wipe(&self) -> Result<()> {
        self.storage
            .remove_items(&[MEMORY_ENTRIES_KEY, MEMORY_SETTINGS_KEY])
            .await?;
        Ok(())
    }
}
