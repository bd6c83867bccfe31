//! companion-store - Local record storage for a chat companion app
//! Four record collections (chat memories, world-book lore, prompt presets,
//! AI provider profiles) persisted as whole JSON arrays through a small
//! async key-value primitive. Loads repair malformed data field by field and
//! re-sort; every mutation is a full read-modify-write of its collection.

// Record kinds
pub mod memory;
pub mod presets;
pub mod providers;
pub mod worldbook;

// Shared machinery
pub mod storage;
pub mod store;
pub mod usage;
pub mod utils;

pub use storage::{MemoryStorage, SledStorage, Storage, StorageError};
pub use store::{ConcurrencyMode, Record, RecordStore, Settings, SettingsStore};
pub use usage::{usage, Footprint, UsageStatus, UsageSummary};

pub use memory::{MemoryCategory, MemoryEntry, MemoryScope, MemorySettings, MemoryVault};
pub use presets::{PresetLibrary, PromptPreset};
pub use providers::{ProviderProfile, ProviderRegistry, ProviderStatus, ProviderVendor};
pub use worldbook::{LoreEntry, WorldBook, WorldBookSettings};
