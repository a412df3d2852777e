//! Answer export.
//!
//! Renders a finished [`Answer`] as plain text, Markdown, or JSON and writes
//! it to a file or stdout for piping.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Where the answer text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Normalized webhook response.
    Webhook,
    /// Study-context rendering of raw search hits.
    SearchResults,
}

/// Final result of one `ask`, ready for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub query: String,
    pub text: String,
    pub source: AnswerSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub polls: u32,
    pub hits: usize,
    /// Set when the webhook failed and the answer fell back to search results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_error: Option<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(ExportFormat::Text),
            "markdown" | "md" => Ok(ExportFormat::Markdown),
            "json" => Ok(ExportFormat::Json),
            other => bail!(
                "Unknown export format: {}. Use text, markdown, or json.",
                other
            ),
        }
    }
}

pub fn render(answer: &Answer, format: ExportFormat) -> Result<String> {
    let rendered = match format {
        ExportFormat::Text => answer.text.clone(),
        ExportFormat::Markdown => {
            let origin = match answer.source {
                AnswerSource::Webhook => "AI webhook",
                AnswerSource::SearchResults => "document search",
            };
            format!(
                "# {}\n\n{}\n\n---\n*Recall Me · {} · {}*\n",
                answer.query,
                answer.text.trim_end(),
                origin,
                answer.generated_at.format("%Y-%m-%d %H:%M UTC")
            )
        }
        ExportFormat::Json => serde_json::to_string_pretty(answer)?,
    };
    Ok(rendered)
}

/// Write `answer` to `output`, or to stdout when `output` is `None`.
pub fn write_answer(answer: &Answer, format: ExportFormat, output: Option<&Path>) -> Result<()> {
    let rendered = render(answer, format)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &rendered)?;
            eprintln!("Exported answer to {}", path.display());
        }
        None => {
            println!("{}", rendered);
        }
    }

    Ok(())
}
