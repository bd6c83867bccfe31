//! World-book lore entries
//! Background lore injected into the chat context when its keywords match.
//! Enabling an entry counts as an injection: the toggle increments the
//! injection counter and stamps the last-injected timestamp.

use crate::storage::Storage;
use crate::store::normalize::{
    count, flag, positive_int, record_id, string_set, text, timestamp, valid_positive_int,
};
use crate::store::{ConcurrencyMode, Rank, Record, RecordStore, Settings, SettingsStore};
use crate::usage::{usage, Footprint, UsageSummary};
use crate::utils::now_ms;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const WORLDBOOK_ENTRIES_KEY: &str = "worldbook_entries";
pub const WORLDBOOK_SETTINGS_KEY: &str = "worldbook_settings";

const UNTITLED: &str = "Untitled entry";

/// One lore entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoreEntry {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Substring triggers the caller scans chat text for
    pub keywords: Vec<String>,
    pub enabled: bool,
    pub pinned: bool,
    /// Context footprint when injected, at least 1
    pub tokens: u32,
    /// How many times this entry has been injected
    pub injection_count: u32,
    /// Last injection timestamp in ms, 0 when never injected
    pub last_injected_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Record for LoreEntry {
    const KIND: &'static str = "lore";

    fn normalize(raw: &Value) -> Self {
        let now = now_ms();
        let title = text(raw, &["title", "name"], UNTITLED);
        let content = text(raw, &["content", "text"], "");
        let created_at = timestamp(raw, &["created_at", "createdAt"], now);
        let tokens_default = ((content.chars().count() / 4) as u32).max(1);
        Self {
            id: record_id(raw, &["id"], "lore"),
            keywords: string_set(raw, &["keywords", "keys"]),
            enabled: flag(raw, &["enabled"], true),
            pinned: flag(raw, &["pinned"], false),
            tokens: positive_int(raw, &["tokens"], tokens_default),
            injection_count: count(raw, &["injection_count", "injectionCount"], 0),
            last_injected_at: timestamp(raw, &["last_injected_at", "lastInjectedAt"], 0),
            updated_at: timestamp(raw, &["updated_at", "updatedAt"], created_at),
            title,
            content,
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
            attention: false,
            // Entries that were actually injected rank by that moment
            recent_at: if self.last_injected_at > 0 {
                self.last_injected_at
            } else {
                self.updated_at
            },
        }
    }
}

impl Footprint for LoreEntry {
    fn footprint(&self) -> u64 {
        self.tokens as u64
    }
}

/// World-book settings singleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldBookSettings {
    /// How many recent messages the caller scans for keyword triggers
    pub scan_depth: u32,
    /// Token budget the usage bar is measured against
    pub token_budget: u32,
    /// Whether injected entries can trigger further entries
    pub recursive: bool,
}

impl Default for WorldBookSettings {
    fn default() -> Self {
        Self {
            scan_depth: 2,
            token_budget: 2048,
            recursive: false,
        }
    }
}

impl Settings for WorldBookSettings {
    const KIND: &'static str = "worldbook_settings";

    fn merge_over_defaults(raw: &Value) -> Self {
        let defaults = Self::default();
        let scan_depth = valid_positive_int(raw, &["scan_depth", "scanDepth"], defaults.scan_depth);
        Self {
            scan_depth: scan_depth.clamp(1, 10),
            token_budget: valid_positive_int(
                raw,
                &["token_budget", "tokenBudget"],
                defaults.token_budget,
            ),
            recursive: flag(raw, &["recursive"], defaults.recursive),
        }
    }
}

/// Store surface for the world-book screen
pub struct WorldBook {
    entries: RecordStore<LoreEntry>,
    settings: SettingsStore<WorldBookSettings>,
    storage: Arc<dyn Storage>,
}

impl WorldBook {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            entries: RecordStore::new(storage.clone(), WORLDBOOK_ENTRIES_KEY),
            settings: SettingsStore::new(storage.clone(), WORLDBOOK_SETTINGS_KEY),
            storage,
        }
    }

    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.entries = self.entries.with_mode(mode);
        self.settings = self.settings.with_mode(mode);
        self
    }

    pub async fn load(&self) -> Vec<LoreEntry> {
        self.entries.load().await
    }

    pub async fn add(&self, payload: Value) -> Result<Vec<LoreEntry>> {
        self.entries.add(payload).await
    }

    pub async fn update(&self, id: &str, patch: Value) -> Result<Option<Vec<LoreEntry>>> {
        self.entries.update(id, patch).await
    }

    /// Flip the enabled flag. Switching an entry on counts as an injection.
    pub async fn toggle_enabled(&self, id: &str) -> Result<Option<Vec<LoreEntry>>> {
        self.entries
            .update_with(id, |e| {
                if e.enabled {
                    json!({ "enabled": false })
                } else {
                    json!({
                        "enabled": true,
                        "injection_count": e.injection_count + 1,
                        "last_injected_at": now_ms(),
                    })
                }
            })
            .await
    }

    pub async fn toggle_pinned(&self, id: &str) -> Result<Option<Vec<LoreEntry>>> {
        self.entries
            .update_with(id, |e| json!({ "pinned": !e.pinned }))
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<Vec<LoreEntry>> {
        self.entries.remove(id).await
    }

    /// Capacity summary over all entries against the configured token budget
    pub async fn usage(&self) -> UsageSummary {
        let entries = self.load().await;
        let settings = self.settings.load().await;
        usage(&entries, settings.token_budget as u64)
    }

    pub async fn load_settings(&self) -> WorldBookSettings {
        self.settings.load().await
    }

    pub async fn update_settings(&self, patch: Value) -> Result<WorldBookSettings> {
        self.settings.update(patch).await
    }

    /// Remove both the collection and the settings blob
    pub async fn wipe(&self) -> Result<()> {
        self.storage
            .remove_items(&[WORLDBOOK_ENTRIES_KEY, WORLDBOOK_SETTINGS_KEY])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn book() -> WorldBook {
        WorldBook::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_normalize_defaults() {
        let entry = LoreEntry::normalize(&json!({}));
        assert_eq!(entry.title, UNTITLED);
        assert!(entry.enabled);
        assert_eq!(entry.injection_count, 0);
        assert_eq!(entry.last_injected_at, 0);
        assert!(entry.tokens >= 1);
    }

    #[test]
    fn test_rank_prefers_injection_time() {
        let never = LoreEntry::normalize(&json!({"updated_at": 500, "created_at": 500}));
        let injected = LoreEntry::normalize(&json!({
            "updated_at": 100, "created_at": 100, "last_injected_at": 900
        }));
        assert_eq!(never.rank().recent_at, 500);
        assert_eq!(injected.rank().recent_at, 900);
    }

    #[tokio::test]
    async fn test_enable_stamps_injection() {
        let book = book();
        let records = book
            .add(json!({"id": "e1", "title": "The old port", "enabled": false}))
            .await
            .unwrap();
        assert_eq!(records[0].injection_count, 0);

        let records = book.toggle_enabled("e1").await.unwrap().unwrap();
        let entry = &records[0];
        assert!(entry.enabled);
        assert_eq!(entry.injection_count, 1);
        assert!(entry.last_injected_at > 0);

        // Switching off leaves the injection bookkeeping alone
        let records = book.toggle_enabled("e1").await.unwrap().unwrap();
        let entry = &records[0];
        assert!(!entry.enabled);
        assert_eq!(entry.injection_count, 1);
    }

    #[tokio::test]
    async fn test_settings_scan_depth_clamped() {
        let book = book();
        let settings = book
            .update_settings(json!({"scan_depth": 99, "token_budget": 4096}))
            .await
            .unwrap();
        assert_eq!(settings.scan_depth, 10);
        assert_eq!(settings.token_budget, 4096);
    }
}
