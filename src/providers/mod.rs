//! AI provider profiles
//! Connection profiles for the chat backends (vendor, endpoint, credentials,
//! sampling limits) plus the separately-keyed active provider selection.

use crate::storage::Storage;
use crate::store::normalize::{bounded_f64, field, flag, positive_int, record_id, text, timestamp};
use crate::store::{ConcurrencyMode, Rank, Record, RecordStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

pub const PROVIDERS_KEY: &str = "ai_providers";
pub const ACTIVE_PROVIDER_KEY: &str = "active_provider";

const UNTITLED: &str = "Untitled provider";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderVendor {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
    #[default]
    Custom,
}

impl ProviderVendor {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "anthropic" => Some(Self::Anthropic),
            "gemini" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Anthropic => "claude-3-5-sonnet",
            Self::Gemini => "gemini-1.5-pro",
            Self::Ollama => "llama3",
            Self::Custom => "",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::Ollama => "http://localhost:11434",
            Self::Custom => "",
        }
    }
}

/// Outcome of the most recent connectivity check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    #[default]
    Unknown,
    Ready,
    Failed,
}

impl ProviderStatus {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "unknown" => Some(Self::Unknown),
            "ready" => Some(Self::Ready),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One provider profile. Providers have no pinned flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub id: String,
    pub name: String,
    pub vendor: ProviderVendor,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Completion cap, at least 1
    pub max_tokens: u32,
    /// Sampling temperature in [0, 2]
    pub temperature: f64,
    pub status: ProviderStatus,
    pub enabled: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Record for ProviderProfile {
    const KIND: &'static str = "provider";

    fn normalize(raw: &Value) -> Self {
        let now = crate::utils::now_ms();
        let vendor = field(raw, &["vendor", "provider"])
            .and_then(Value::as_str)
            .and_then(ProviderVendor::parse)
            .unwrap_or_default();
        let created_at = timestamp(raw, &["created_at", "createdAt"], now);
        Self {
            id: record_id(raw, &["id"], "prov"),
            name: text(raw, &["name", "title"], UNTITLED),
            base_url: text(raw, &["base_url", "baseUrl"], vendor.default_base_url()),
            api_key: text(raw, &["api_key", "apiKey"], ""),
            model: text(raw, &["model"], vendor.default_model()),
            max_tokens: positive_int(raw, &["max_tokens", "maxTokens"], 4096),
            temperature: bounded_f64(raw, &["temperature"], 0.7, 0.0, 2.0),
            status: field(raw, &["status"])
                .and_then(Value::as_str)
                .and_then(ProviderStatus::parse)
                .unwrap_or_default(),
            enabled: flag(raw, &["enabled"], true),
            updated_at: timestamp(raw, &["updated_at", "updatedAt"], created_at),
            vendor,
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
            pinned: false,
            attention: self.enabled,
            recent_at: self.updated_at,
        }
    }
}

/// Store surface for the provider settings screen
pub struct ProviderRegistry {
    providers: RecordStore<ProviderProfile>,
    storage: Arc<dyn Storage>,
}

impl ProviderRegistry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            providers: RecordStore::new(storage.clone(), PROVIDERS_KEY),
            storage,
        }
    }

    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.providers = self.providers.with_mode(mode);
        self
    }

    pub async fn load(&self) -> Vec<ProviderProfile> {
        self.providers.load().await
    }

    pub async fn add(&self, payload: Value) -> Result<Vec<ProviderProfile>> {
        self.providers.add(payload).await
    }

    pub async fn update(&self, id: &str, patch: Value) -> Result<Option<Vec<ProviderProfile>>> {
        self.providers.update(id, patch).await
    }

    pub async fn toggle_enabled(&self, id: &str) -> Result<Option<Vec<ProviderProfile>>> {
        self.providers
            .update_with(id, |p| json!({ "enabled": !p.enabled }))
            .await
    }

    pub async fn set_status(&self, id: &str, status: ProviderStatus) -> Result<Option<Vec<ProviderProfile>>> {
        self.providers
            .update(id, json!({ "status": status }))
            .await
    }

    pub async fn remove(&self, id: &str) -> Result<Vec<ProviderProfile>> {
        let records = self.providers.remove(id).await?;
        // Keep the active pointer from dangling
        if let Some(active) = self.stored_active_id().await {
            if active == id {
                self.clear_active().await?;
            }
        }
        Ok(records)
    }

    async fn stored_active_id(&self) -> Option<String> {
        match self.storage.get_item(ACTIVE_PROVIDER_KEY).await {
            Ok(Some(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
            _ => None,
        }
    }

    /// Active provider id, validated against the collection; a dangling or
    /// missing pointer reads as None
    pub async fn active_id(&self) -> Option<String> {
        let stored = self.stored_active_id().await?;
        let providers = self.load().await;
        providers
            .iter()
            .any(|p| p.id == stored)
            .then_some(stored)
    }

    pub async fn set_active(&self, id: &str) -> Result<()> {
        self.storage
            .set_item(ACTIVE_PROVIDER_KEY, id)
            .await
            .context("writing active provider id")
    }

    pub async fn clear_active(&self) -> Result<()> {
        self.storage
            .remove_item(ACTIVE_PROVIDER_KEY)
            .await
            .context("clearing active provider id")
    }

    /// Remove the collection and the active pointer
    pub async fn wipe(&self) -> Result<()> {
        self.storage
            .remove_items(&[PROVIDERS_KEY, ACTIVE_PROVIDER_KEY])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_unknown_vendor_falls_back_to_custom() {
        let profile = ProviderProfile::normalize(&json!({"vendor": "mystery"}));
        assert_eq!(profile.vendor, ProviderVendor::Custom);
        assert_eq!(profile.status, ProviderStatus::Unknown);
    }

    #[test]
    fn test_vendor_defaults_fill_model_and_endpoint() {
        let profile = ProviderProfile::normalize(&json!({"vendor": "openai"}));
        assert_eq!(profile.model, "gpt-4o");
        assert_eq!(profile.base_url, "https://api.openai.com/v1");
        assert_eq!(profile.max_tokens, 4096);
        assert_eq!(profile.temperature, 0.7);
    }

    #[test]
    fn test_temperature_clamped() {
        let profile = ProviderProfile::normalize(&json!({"temperature": 9.5}));
        assert_eq!(profile.temperature, 2.0);
    }

    #[tokio::test]
    async fn test_active_id_validated_against_collection() {
        let registry = registry();
        registry
            .add(json!({"id": "p1", "name": "Main", "vendor": "anthropic"}))
            .await
            .unwrap();

        registry.set_active("p1").await.unwrap();
        assert_eq!(registry.active_id().await, Some("p1".to_string()));

        registry.set_active("ghost").await.unwrap();
        assert_eq!(registry.active_id().await, None);
    }

    #[tokio::test]
    async fn test_remove_clears_dangling_active() {
        let registry = registry();
        registry
            .add(json!({"id": "p1", "vendor": "ollama"}))
            .await
            .unwrap();
        registry.set_active("p1").await.unwrap();

        let remaining = registry.remove("p1").await.unwrap();
        assert!(remaining.is_empty());
        assert_eq!(registry.active_id().await, None);
    }
}
