//! Configuration management for robomigrate
//!
//! Settings live in a TOML file: `--config <file>`, else `./robomigrate.toml`,
//! else `~/.config/robomigrate/config.toml`. Secrets come from the
//! environment only.

use crate::ai::AiOptions;
use crate::commit::CommitPolicy;
use crate::model::FileRole;
use crate::reader::ReadPolicy;
use crate::transform::DEFAULT_LIBRARY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const LOCAL_CONFIG: &str = "robomigrate.toml";
pub const API_KEY_VARS: &[&str] = &["ROBOMIGRATE_AI_API_KEY", "OPENROUTER_API_KEY"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub target_root: String,
    /// Prefixes stripped before re-rooting; empty means the built-in list
    pub source_roots: Vec<String>,
    /// Directories whose files are forced into a role, keyed by role name
    /// (`page_object = ["src/test/java/screens"]`)
    pub roles: BTreeMap<String, Vec<String>>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            target_root: "robot".to_string(),
            source_roots: Vec::new(),
            roles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub max_workers: usize,
    pub min_interval_ms: u64,
    pub backoff_secs: Vec<u64>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_workers: crate::reader::DEFAULT_MAX_WORKERS,
            min_interval_ms: crate::reader::DEFAULT_MIN_INTERVAL.as_millis() as u64,
            backoff_secs: crate::reader::DEFAULT_BACKOFF_SECS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    pub batch_size: usize,
    pub retry_delay_secs: u64,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            batch_size: crate::commit::DEFAULT_BATCH_SIZE,
            retry_delay_secs: crate::commit::DEFAULT_RETRY_DELAY.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub provider: String,
    pub model: String,
    pub region: Option<String>,
    /// Chat-completions endpoint; OpenRouter when unset
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        let options = AiOptions::default();
        Self {
            enabled: false,
            provider: options.provider,
            model: options.model,
            region: None,
            base_url: None,
            timeout_secs: options.timeout.as_secs(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Automation library imported by generated files
    pub library: String,
    pub paths: PathsConfig,
    pub reader: ReaderConfig,
    pub commit: CommitConfig,
    pub ai: AiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: DEFAULT_LIBRARY.to_string(),
            paths: PathsConfig::default(),
            reader: ReaderConfig::default(),
            commit: CommitConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl Config {
    /// Get the user config file path
    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("robomigrate").join("config.toml"))
    }

    /// First config file that exists, in lookup order
    pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let local = PathBuf::from(LOCAL_CONFIG);
        if local.is_file() {
            return Some(local);
        }
        Self::user_config_path().filter(|p| p.is_file())
    }

    /// Load config from disk, or return defaults
    pub fn load(explicit: Option<&Path>) -> Self {
        match Self::locate(explicit) {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load one file; a corrupt file is kept aside as `*.corrupt`.
    pub fn load_from(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), "could not read config, using defaults: {}", err);
                return Self::default();
            }
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(err) => {
                preserve_corrupt_config(path, &content);
                tracing::warn!(
                    path = %path.display(),
                    "config file was corrupted ({}); a backup was saved and defaults were loaded",
                    err
                );
                Self::default()
            }
        }
    }

    /// Save config to `path`
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        write_config_atomic(path, &content).with_context(|| format!("failed to write {}", path.display()))
    }

    /// AI key from the environment
    pub fn api_key(&self) -> Option<String> {
        API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Role path overrides; unknown role names are skipped with a warning.
    pub fn role_paths(&self) -> BTreeMap<FileRole, Vec<String>> {
        let mut out: BTreeMap<FileRole, Vec<String>> = BTreeMap::new();
        for (key, paths) in &self.paths.roles {
            match role_from_key(key) {
                Some(role) => out.entry(role).or_default().extend(paths.iter().cloned()),
                None => tracing::warn!(role = %key, "unknown role in [paths.roles]"),
            }
        }
        out
    }

    pub fn read_policy(&self) -> ReadPolicy {
        ReadPolicy {
            max_workers: self.reader.max_workers.max(1),
            min_interval: Duration::from_millis(self.reader.min_interval_ms),
            backoff: self.reader.backoff_secs.iter().map(|s| Duration::from_secs(*s)).collect(),
        }
    }

    pub fn commit_policy(&self) -> CommitPolicy {
        CommitPolicy {
            batch_size: self.commit.batch_size.max(1),
            retry_delay: Duration::from_secs(self.commit.retry_delay_secs),
        }
    }

    pub fn ai_options(&self) -> AiOptions {
        AiOptions {
            provider: self.ai.provider.clone(),
            model: self.ai.model.clone(),
            region: self.ai.region.clone(),
            temperature: self.ai.temperature,
            max_tokens: self.ai.max_tokens,
            timeout: Duration::from_secs(self.ai.timeout_secs.max(1)),
        }
    }
}

fn role_from_key(key: &str) -> Option<FileRole> {
    let key = key.trim().to_lowercase().replace(['-', ' '], "_");
    FileRole::ALL
        .into_iter()
        .find(|role| role.label().replace(' ', "_") == key)
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let mut corrupt = path.as_os_str().to_owned();
    corrupt.push(".corrupt");
    let corrupt_path = PathBuf::from(corrupt);
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

fn write_config_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            library = "Browser"

            [commit]
            batch_size = 3

            [paths.roles]
            page_object = ["src/test/java/screens"]
            gadgets = ["ignored"]
            "#,
        )
        .unwrap();
        assert_eq!(config.library, "Browser");
        assert_eq!(config.commit.batch_size, 3);
        assert_eq!(config.commit.retry_delay_secs, 5);
        assert_eq!(config.paths.target_root, "robot");
        assert_eq!(config.role_paths()[&FileRole::PageObject], vec!["src/test/java/screens"]);
        assert_eq!(config.read_policy().min_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.ai.enabled = true;
        config.paths.source_roots = vec!["tests/java".to_string()];
        config.save(&path).unwrap();
        assert_eq!(Config::load(Some(&path)), config);
    }

    #[test]
    fn test_corrupt_file_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "library = [unterminated").unwrap();
        let config = Config::load_from(&path);
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.toml.corrupt").is_file());
        assert!(!path.exists());
    }
}
