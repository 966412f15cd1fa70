use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LOCAL_CONFIG: &str = ".ar-config.toml";
const APP_DIR: &str = "agent-review";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub review: MessageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// [navigation] section configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Follow newly streamed files when a view opens
    #[serde(default = "default_true")]
    pub follow: bool,
    /// Glob patterns for files that start collapsed
    #[serde(default = "default_auto_collapse")]
    pub auto_collapse: Vec<String>,
}

/// [review] section configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageConfig {
    #[serde(default = "default_true")]
    pub include_code_context: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `AR_LOG`
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_true() -> bool {
    true
}

fn default_auto_collapse() -> Vec<String> {
    vec!["*.lock".into()]
}

fn default_log_filter() -> String {
    "warn".into()
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            follow: true,
            auto_collapse: default_auto_collapse(),
        }
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            include_code_context: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Load config by merging global defaults with per-directory overrides.
/// Priority: `.ar-config.toml` in `dir` > global `<config_dir>/agent-review/config.toml` > built-in defaults.
/// Merging is deep: individual fields within sections (e.g. `[navigation]`) override independently.
pub fn load_config(dir: &Path) -> ReviewConfig {
    load_layers(global_config_path().as_deref(), &dir.join(LOCAL_CONFIG))
}

fn load_layers(global: Option<&Path>, local: &Path) -> ReviewConfig {
    let global_table = global.and_then(read_table);
    let local_table = read_table(local);

    let merged = match (global_table, local_table) {
        (Some(mut global), Some(local)) => {
            deep_merge(&mut global, local);
            global
        }
        (Some(global), None) => global,
        (None, Some(local)) => local,
        (None, None) => return ReviewConfig::default(),
    };

    toml::Value::Table(merged).try_into().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "invalid config values, using defaults");
        ReviewConfig::default()
    })
}

/// A missing file is silent; an unparsable one is skipped with a warning
fn read_table(path: &Path) -> Option<toml::Table> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<toml::Table>(&content) {
        Ok(table) => Some(table),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Recursively merge `overlay` into `base`. Overlay values win; nested tables are merged recursively.
fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Save config to the global config dir (`<config_dir>/agent-review/config.toml`).
pub fn save_config(config: &ReviewConfig) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine config directory")?;
    write_config(config, &path)?;
    Ok(path)
}

fn write_config(config: &ReviewConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(config).context("failed to encode config")?;
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
