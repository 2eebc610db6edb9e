// Totems Agent Engine — Provider Configuration
// Persistence for the active AI provider selection. The engine only needs
// the read/write contract; the default implementation keeps a JSON file in
// the user's home directory. API-key encryption at rest is the shell's job
// (it owns the OS keychain), so headless and test setups can use the plain
// stores below.

use std::path::PathBuf;

use log::{info, warn};
use parking_lot::Mutex;

use crate::atoms::error::EngineResult;
use crate::atoms::traits::ConfigStore;
use crate::engine::types::{AiSettings, ProviderKind};

/// Where the engine keeps its files: `~/.totems/`.
fn engine_config_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_default();
    home.join(".totems").join("ai-config.json")
}

// ── File-backed store ──────────────────────────────────────────────────

pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        FileConfigStore {
            path: engine_config_path(),
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        FileConfigStore { path }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    /// A missing or unreadable file means "not configured yet", not an
    /// error — the UI routes that to the settings page.
    fn load(&self) -> EngineResult<Option<AiSettings>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Ok(None),
        };
        match serde_json::from_str(&content) {
            Ok(settings) => Ok(Some(settings)),
            Err(e) => {
                warn!(
                    "[engine] Ignoring unparsable config at {:?}: {}",
                    self.path, e
                );
                Ok(None)
            }
        }
    }

    fn save(&self, settings: &AiSettings) -> EngineResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, json)?;
        info!("[engine] AI config saved to {:?}", self.path);
        Ok(())
    }
}

// ── In-memory store ────────────────────────────────────────────────────

/// For tests and embedding scenarios where nothing should touch disk.
#[derive(Default)]
pub struct MemoryConfigStore {
    inner: Mutex<Option<AiSettings>>,
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> EngineResult<Option<AiSettings>> {
        Ok(self.inner.lock().clone())
    }

    fn save(&self, settings: &AiSettings) -> EngineResult<()> {
        *self.inner.lock() = Some(settings.clone());
        Ok(())
    }
}

// ── Settings update ────────────────────────────────────────────────────

/// Persist a provider/model change. A `None` API key keeps the previously
/// stored key, so switching models doesn't force the user to re-enter it.
pub fn update_ai_settings(
    store: &dyn ConfigStore,
    provider: ProviderKind,
    model: impl Into<String>,
    api_key: Option<String>,
) -> EngineResult<AiSettings> {
    let existing_key = store
        .load()?
        .filter(|s| s.provider == provider)
        .and_then(|s| s.api_key);

    let settings = AiSettings {
        provider,
        model: model.into(),
        api_key: api_key.or(existing_key),
    };
    store.save(&settings)?;
    Ok(settings)
}
