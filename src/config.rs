use serde::{Deserialize, Serialize};

use crate::status::{SectionKind, StatusSnapshot, VisibilityLevel};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EsConfig {
    #[serde(default)]
    pub status: StatusConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

/// [status] section configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Visibility level applied on first load (1..=4)
    #[serde(default = "default_level")]
    pub default_level: u8,
    /// Section names collapsed on first load
    #[serde(default)]
    pub collapsed_sections: Vec<String>,
    #[serde(default = "default_recent_count")]
    pub recent_commit_count: usize,
    /// Glob patterns hidden from the untracked section
    #[serde(default)]
    pub hide_untracked: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub signs: bool,
    #[serde(default = "default_true")]
    pub show_counts: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_level() -> u8 {
    2
}

fn default_recent_count() -> usize {
    10
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            default_level: default_level(),
            collapsed_sections: Vec::new(),
            recent_commit_count: default_recent_count(),
            hide_untracked: Vec::new(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            signs: true,
            show_counts: true,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl EsConfig {
    pub fn default_level(&self) -> VisibilityLevel {
        VisibilityLevel::new(self.status.default_level)
    }

    /// Configured collapsed sections; unknown names are dropped
    pub fn collapsed_sections(&self) -> Vec<SectionKind> {
        self.status
            .collapsed_sections
            .iter()
            .filter_map(|name| {
                let section = SectionKind::from_name(name);
                if section.is_none() {
                    tracing::warn!(name = %name, "unknown section in collapsed_sections");
                }
                section
            })
            .collect()
    }

    pub fn untracked_filter(&self) -> UntrackedFilter {
        UntrackedFilter::new(&self.status.hide_untracked)
    }
}

/// Compiled `hide_untracked` patterns
#[derive(Debug, Clone, Default)]
pub struct UntrackedFilter {
    patterns: Vec<glob::Pattern>,
}

impl UntrackedFilter {
    pub fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "invalid hide_untracked pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_hidden(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// Drop hidden entries from the snapshot's untracked list
    pub fn apply(&self, snapshot: &mut StatusSnapshot) {
        if !self.patterns.is_empty() {
            snapshot.untracked.retain(|f| !self.is_hidden(&f.path));
        }
    }
}

/// Load config by merging global defaults with per-repo overrides.
/// Priority: per-repo `.es-config.toml` > global `~/.config/es/config.toml` > built-in defaults.
/// Merging is deep: individual fields within sections (e.g. `[status]`) override independently.
pub fn load_config(repo_root: &str) -> EsConfig {
    let local_path = format!("{repo_root}/.es-config.toml");
    let global_path = dirs::config_dir()
        .map(|d| d.join("es/config.toml").to_string_lossy().to_string());

    let global_table = global_path.and_then(|p| read_table(&p));
    let local_table = read_table(&local_path);

    let merged = match (global_table, local_table) {
        (Some(mut global), Some(local)) => {
            deep_merge(&mut global, local);
            toml::Value::Table(global)
        }
        (Some(global), None) => toml::Value::Table(global),
        (None, Some(local)) => toml::Value::Table(local),
        (None, None) => return EsConfig::default(),
    };

    match merged.try_into() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "invalid config, using defaults");
            EsConfig::default()
        }
    }
}

fn read_table(path: &str) -> Option<toml::map::Map<String, toml::Value>> {
    let content = std::fs::read_to_string(path).ok()?;
    match content.parse::<toml::Value>() {
        Ok(toml::Value::Table(t)) => Some(t),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(path, error = %e, "failed to parse config file");
            None
        }
    }
}

/// Recursively merge `overlay` into `base`. Overlay values win; nested tables are merged recursively.
fn deep_merge(
    base: &mut toml::map::Map<String, toml::Value>,
    overlay: toml::map::Map<String, toml::Value>,
) {
    for (key, value) in overlay {
        match (base.get_mut(&key), &value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table.clone());
            }
            _ => {
                base.insert(key, value);
            }
        }
    }
}
