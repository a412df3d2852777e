//! TOML configuration.
//!
//! A config file has three parts: where the document-search backend lives
//! (`[search]`), how the AI webhook is called and polled (`[webhook]`, with
//! one `[webhook.profiles.<name>]` table per poll profile), and optional
//! `[[saved]]` searches.
//!
//! ```toml
//! [search]
//! api_url = "http://localhost:5000"
//! k = 5
//!
//! [webhook]
//! url = "https://automation.example.com/webhook/recall"
//! profile = "full"
//!
//! [webhook.profiles.full]
//! max_attempts = 20
//! base_delay_ms = 2000
//! backoff_factor = 1.5
//! max_delay_ms = 10000
//! poll_strategy = "post"
//!
//! [[saved]]
//! name = "thermo"
//! query = "second law of thermodynamics"
//! k = 8
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::webhook::PollOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub saved: Vec<SavedSearch>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            k: default_k(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_k() -> usize {
    5
}
fn default_search_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Bounds a single HTTP call. Unset means the attempt budget is the only limit.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub include_context: bool,
    #[serde(default = "default_true")]
    pub fallback_to_results: bool,
    #[serde(default = "default_profiles")]
    pub profiles: BTreeMap<String, PollOptions>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            enabled: true,
            profile: default_profile(),
            request_timeout_secs: None,
            include_context: true,
            fallback_to_results: true,
            profiles: default_profiles(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_profile() -> String {
    "full".to_string()
}

/// Call sites pick a named poll profile instead of hard-coding their own
/// attempt counts and delays. `quick` and `full` always exist.
fn default_profiles() -> BTreeMap<String, PollOptions> {
    let mut profiles = BTreeMap::new();
    profiles.insert("quick".to_string(), PollOptions::quick());
    profiles.insert("full".to_string(), PollOptions::full());
    profiles
}

/// A search kept in the config file so it can be re-run by name.
#[derive(Debug, Deserialize, Clone)]
pub struct SavedSearch {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub k: Option<usize>,
    #[serde(default = "default_true")]
    pub enable_ai: bool,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

impl Config {
    /// Built-in defaults, used when no config file exists.
    pub fn minimal() -> Self {
        Self {
            search: SearchConfig::default(),
            webhook: WebhookConfig::default(),
            saved: Vec::new(),
        }
    }

    /// Look up a poll profile by name.
    pub fn profile(&self, name: &str) -> Result<&PollOptions> {
        self.webhook.profiles.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.webhook.profiles.keys().map(|k| k.as_str()).collect();
            anyhow::anyhow!(
                "Unknown poll profile: '{}'. Available: {}",
                name,
                known.join(", ")
            )
        })
    }

    /// The webhook URL to use, if the webhook is enabled and a non-blank URL is set.
    pub fn webhook_url(&self) -> Option<&str> {
        if !self.webhook.enabled {
            return None;
        }
        self.webhook
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    pub fn find_saved(&self, name: &str) -> Option<&SavedSearch> {
        self.saved.iter().find(|s| s.name == name)
    }

    fn validate(&self) -> Result<()> {
        if self.search.api_url.trim().is_empty() {
            anyhow::bail!("search.api_url must not be empty");
        }
        if self.search.k == 0 {
            anyhow::bail!("search.k must be >= 1");
        }

        for (name, profile) in &self.webhook.profiles {
            profile.validate(name)?;
        }
        self.profile(&self.webhook.profile)
            .with_context(|| "webhook.profile does not name a configured profile")?;

        for saved in &self.saved {
            if saved.name.trim().is_empty() {
                anyhow::bail!("saved searches must have a name");
            }
            if saved.query.trim().is_empty() {
                anyhow::bail!("saved search '{}' has an empty query", saved.name);
            }
            if saved.k == Some(0) {
                anyhow::bail!("saved search '{}': k must be >= 1", saved.name);
            }
            if let Some(profile) = &saved.profile {
                self.profile(profile)
                    .with_context(|| format!("saved search '{}'", saved.name))?;
            }
        }
        let mut names: Vec<&str> = self.saved.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            anyhow::bail!("duplicate saved search name: '{}'", dup[0]);
        }

        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // A file that only tunes one profile keeps the other built-in one.
    for (name, profile) in default_profiles() {
        config.webhook.profiles.entry(name).or_insert(profile);
    }

    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}
