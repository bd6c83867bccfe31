//! Prompt presets
//! Reusable system-prompt templates with `{{variable}}` placeholders. The
//! collection ships with one built-in default so a fresh install always has
//! a working preset.

use crate::store::normalize::{flag, record_id, string_set, text, timestamp};
use crate::store::{ConcurrencyMode, Rank, Record, RecordStore};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const PRESETS_KEY: &str = "prompt_presets";

const UNTITLED: &str = "Untitled preset";

/// One prompt preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptPreset {
    pub id: String,
    pub name: String,
    pub content: String,
    /// Placeholder names the template expects
    pub variables: Vec<String>,
    pub enabled: bool,
    pub pinned: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Record for PromptPreset {
    const KIND: &'static str = "preset";

    fn normalize(raw: &Value) -> Self {
        let now = crate::utils::now_ms();
        let created_at = timestamp(raw, &["created_at", "createdAt"], now);
        Self {
            id: record_id(raw, &["id"], "preset"),
            name: text(raw, &["name", "title"], UNTITLED),
            content: text(raw, &["content", "prompt"], ""),
            variables: string_set(raw, &["variables", "vars"]),
            enabled: flag(raw, &["enabled"], true),
            pinned: flag(raw, &["pinned"], false),
            updated_at: timestamp(raw, &["updated_at", "updatedAt"], created_at),
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
            // Enabled presets surface before disabled ones
            attention: self.enabled,
            recent_at: self.updated_at,
        }
    }
}

fn seed() -> Vec<Value> {
    vec![json!({
        "id": "preset_default",
        "name": "Default chat",
        "content": "You are {{char}}, chatting with {{user}}. Stay in character.",
        "variables": ["char", "user"],
    })]
}

/// Store surface for the preset screen
pub struct PresetLibrary {
    presets: RecordStore<PromptPreset>,
}

impl PresetLibrary {
    pub fn new(storage: Arc<dyn crate::storage::Storage>) -> Self {
        Self {
            presets: RecordStore::new(storage, PRESETS_KEY).with_seed(seed()),
        }
    }

    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.presets = self.presets.with_mode(mode);
        self
    }

    pub async fn load(&self) -> Vec<PromptPreset> {
        self.presets.load().await
    }

    pub async fn add(&self, payload: Value) -> Result<Vec<PromptPreset>> {
        self.presets.add(payload).await
    }

    pub async fn update(&self, id: &str, patch: Value) -> Result<Option<Vec<PromptPreset>>> {
        self.presets.update(id, patch).await
    }

    pub async fn toggle_enabled(&self, id: &str) -> Result<Option<Vec<PromptPreset>>> {
        self.presets
            .update_with(id, |p| json!({ "enabled": !p.enabled }))
            .await
    }

    pub async fn toggle_pinned(&self, id: &str) -> Result<Option<Vec<PromptPreset>>> {
        self.presets
            .update_with(id, |p| json!({ "pinned": !p.pinned }))
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<Vec<PromptPreset>> {
        self.presets.remove(id).await
    }
}
