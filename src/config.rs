//! Schema configuration.
//!
//! A schema is a named, loadable profile defining input behavior. The
//! configuration is a typed TOML tree: the `[chord_composer]` table feeds
//! the chord composer, `[speller]` supplies the syllable delimiter, and
//! `[key_binder]` holds the binding list plus an optional preset import
//! resolved through a `PresetSource`.

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// One key-binding config entry.
///
/// Exactly one of `send`/`toggle`/`select` should be present; entries
/// violating that (or missing `when`/`accept`) are skipped at load time
/// rather than failing the whole list.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BindingEntry {
    /// Condition name: `paging`, `has_menu`, `composing` or `always`.
    pub when: Option<String>,
    /// Trigger key pattern.
    pub accept: Option<String>,
    /// Redirect target key pattern.
    pub send: Option<String>,
    /// Session option toggled by this binding.
    pub toggle: Option<String>,
    /// Schema id to activate, or `".next"` for the next enabled schema.
    pub select: Option<String>,
}

/// `[key_binder]` table.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct KeyBinderConfig {
    /// Name of a preset binding list loaded before this schema's own.
    pub import_preset: Option<String>,
    #[serde(default)]
    pub bindings: Vec<BindingEntry>,
}

/// `[chord_composer]` table.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChordConfig {
    /// Chord keys in canonical serialization order.
    #[serde(default)]
    pub alphabet: String,
    /// Rules normalizing the raw serialized chord.
    #[serde(default)]
    pub algebra: Vec<String>,
    /// Rules formatting the live prompt text.
    #[serde(default)]
    pub prompt_format: Vec<String>,
    /// Rules formatting the replayed output.
    #[serde(default)]
    pub output_format: Vec<String>,
}

/// `[speller]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpellerConfig {
    /// Syllable delimiter characters for backward deletion.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

fn default_delimiter() -> String {
    " ".to_string()
}

impl Default for SpellerConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
        }
    }
}

/// `[[schema_list]]` entries enumerating the enabled schemas.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchemaListEntry {
    pub schema: String,
}

/// Complete schema configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub chord_composer: ChordConfig,
    #[serde(default)]
    pub speller: SpellerConfig,
    #[serde(default)]
    pub key_binder: KeyBinderConfig,
    #[serde(default)]
    pub schema_list: Vec<SchemaListEntry>,
}

impl SchemaConfig {
    /// Load a schema configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading schema config {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing schema config {}", path.display()))
    }

    /// Parse a schema configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Resolves named key-binding presets for `import_preset`.
pub trait PresetSource {
    /// The preset's binding configuration, or `None` if the name cannot be
    /// resolved.
    fn load_preset(&self, name: &str) -> Option<KeyBinderConfig>;
}

/// A source with no presets; every import fails (and is logged by the
/// binder as a skipped import).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPresets;

impl PresetSource for NoPresets {
    fn load_preset(&self, _name: &str) -> Option<KeyBinderConfig> {
        None
    }
}

/// Loads presets from `<dir>/<name>.toml` files sharing the schema config
/// format.
#[derive(Debug, Clone)]
pub struct FilePresets {
    dir: PathBuf,
}

impl FilePresets {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl PresetSource for FilePresets {
    fn load_preset(&self, name: &str) -> Option<KeyBinderConfig> {
        let path = self.dir.join(format!("{}.toml", name));
        match SchemaConfig::load_toml(&path) {
            Ok(config) => Some(config.key_binder),
            Err(err) => {
                warn!(preset = name, error = %err, "failed to load preset bindings");
                None
            }
        }
    }
}
