use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::agents::specialized::ResearchLimits;
use crate::agents::CoordinatorConfig;
use crate::providers::GenerationOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub coordinator: CoordinatorSettings,
    pub provider: ProviderSettings,
    pub retrieval: RetrievalSettings,
    pub web_search: WebSearchSettings,
    pub tasks: TaskSettings,
    pub log_level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    pub enable_parallel: bool,
    pub confidence_threshold: f64,
    pub default_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub name: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub max_sources: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchSettings {
    pub num_results: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub ttl_secs: u64,
    pub evict_every_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorSettings::default(),
            provider: ProviderSettings::default(),
            retrieval: RetrievalSettings::default(),
            web_search: WebSearchSettings::default(),
            tasks: TaskSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        let defaults = CoordinatorConfig::default();
        Self {
            enable_parallel: defaults.enable_parallel,
            confidence_threshold: defaults.confidence_threshold,
            default_agent: None,
        }
    }
}

impl Default for ProviderSettings {
    fn default() -> Self {
        let defaults = GenerationOptions::default();
        Self {
            name: "demo".to_string(),
            model: defaults.model,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        let defaults = ResearchLimits::default();
        Self {
            top_k: defaults.top_k,
            max_sources: defaults.max_sources,
        }
    }
}

impl Default for WebSearchSettings {
    fn default() -> Self {
        Self {
            num_results: ResearchLimits::default().web_results,
        }
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            evict_every_secs: 60,
        }
    }
}

impl Settings {
    /// Loads `path`, or the default config file when `None`. A missing file
    /// yields the defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::config_file_path(),
        };

        let mut settings = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(settings)
    }

    pub fn config_file_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("polyagent").join("config.toml"))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("POLYAGENT_PARALLEL") {
            self.coordinator.enable_parallel = value
                .parse()
                .with_context(|| format!("POLYAGENT_PARALLEL must be true or false, got '{}'", value))?;
        }
        if let Some(value) = lookup("POLYAGENT_CONFIDENCE_THRESHOLD") {
            self.coordinator.confidence_threshold = value.parse().with_context(|| {
                format!("POLYAGENT_CONFIDENCE_THRESHOLD must be a number, got '{}'", value)
            })?;
        }
        if let Some(value) = lookup("POLYAGENT_DEFAULT_AGENT") {
            self.coordinator.default_agent = Some(value);
        }
        if let Some(value) = lookup("POLYAGENT_LOG_LEVEL") {
            self.log_level = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.coordinator.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("coordinator.confidence_threshold must be within [0, 1], got {}", threshold);
        }
        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be positive");
        }
        if self.tasks.evict_every_secs == 0 {
            anyhow::bail!("tasks.evict_every_secs must be positive");
        }
        Ok(())
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            enable_parallel: self.coordinator.enable_parallel,
            confidence_threshold: self.coordinator.confidence_threshold,
        }
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.provider.model.clone(),
            temperature: self.provider.temperature,
            max_tokens: self.provider.max_tokens,
        }
    }

    pub fn research_limits(&self) -> ResearchLimits {
        ResearchLimits {
            top_k: self.retrieval.top_k,
            max_sources: self.retrieval.max_sources,
            web_results: self.web_search.num_results,
        }
    }

    pub fn task_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tasks.ttl_secs)
    }

    pub fn evict_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tasks.evict_every_secs)
    }
}
