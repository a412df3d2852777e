use anyhow::{bail, Result};
use std::path::Path;

use crate::ask::{run_ask, AskOptions};
use crate::config::{Config, SavedSearch};
use crate::export::ExportFormat;
use crate::progress::ProgressMode;

pub fn list_saved(config: &Config) -> Result<()> {
    if config.saved.is_empty() {
        println!("No saved searches. Add [[saved]] entries to the config file.");
        return Ok(());
    }

    println!("{:<16} {:<4} {:<6} {:<8} QUERY", "NAME", "K", "AI", "PROFILE");
    for saved in &config.saved {
        let k = saved.k.unwrap_or(config.search.k);
        let profile = saved.profile.as_deref().unwrap_or(&config.webhook.profile);
        println!(
            "{:<16} {:<4} {:<6} {:<8} {}",
            saved.name, k, saved.enable_ai, profile, saved.query
        );
    }

    Ok(())
}

/// Ask options for re-running a saved search.
pub fn saved_options(saved: &SavedSearch, progress: ProgressMode) -> AskOptions {
    AskOptions {
        k: saved.k,
        profile: saved.profile.clone(),
        webhook_url: saved.webhook_url.clone(),
        use_ai: saved.enable_ai,
        progress,
        ..AskOptions::new(saved.query.clone())
    }
}

pub async fn run_saved(
    config: &Config,
    name: &str,
    format: ExportFormat,
    output: Option<&Path>,
    progress: ProgressMode,
) -> Result<()> {
    let Some(saved) = config.find_saved(name) else {
        let known: Vec<&str> = config.saved.iter().map(|s| s.name.as_str()).collect();
        if known.is_empty() {
            bail!("Unknown saved search: '{}'. No saved searches configured.", name);
        }
        bail!(
            "Unknown saved search: '{}'. Available: {}",
            name,
            known.join(", ")
        );
    };

    tracing::info!("Running saved search '{}': {:?}", saved.name, saved.query);
    run_ask(config, &saved_options(saved, progress), format, output).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn saved_search_overrides_carry_into_ask() {
        let cfg = parse_config(
            r#"
[[saved]]
name = "thermo"
query = "second law"
k = 8
enable_ai = false
profile = "quick"
webhook_url = "http://other-hook"
"#,
        )
        .unwrap();
        let opts = saved_options(cfg.find_saved("thermo").unwrap(), ProgressMode::Json);
        assert_eq!(opts.query, "second law");
        assert_eq!(opts.k, Some(8));
        assert!(!opts.use_ai);
        assert!(opts.include_context);
        assert_eq!(opts.profile.as_deref(), Some("quick"));
        assert_eq!(opts.webhook_url.as_deref(), Some("http://other-hook"));
        assert_eq!(opts.progress, ProgressMode::Json);
    }

    #[tokio::test]
    async fn unknown_name_lists_available() {
        let cfg = parse_config("[[saved]]\nname = \"thermo\"\nquery = \"x\"\n").unwrap();
        let err = run_saved(&cfg, "optics", ExportFormat::Text, None, ProgressMode::Off)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown saved search: 'optics'. Available: thermo"
        );
    }
}
