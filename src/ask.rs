//! The `ask` flow: search, hand off to the AI webhook, normalize, deliver.
//!
//! Whether to search, which webhook to call, and what to do when the
//! webhook fails are decided here. The coordinator itself only ever
//! returns an answer or a [`WebhookError`].
//!
//! | Webhook | Context | Behavior |
//! |---------|---------|----------|
//! | none / `--no-ai` | n/a | search, answer with formatted study context |
//! | set | on | search, send hits, answer with normalized webhook text |
//! | set | off | skip search, send an empty context |
//!
//! When the webhook fails and `webhook.fallback_to_results` is on, the
//! formatted search results are returned instead and the failure is kept in
//! [`Answer::webhook_error`].

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::WebhookError;
use crate::export::{write_answer, Answer, AnswerSource, ExportFormat};
use crate::format::format_study_context;
use crate::models::{SearchContext, SearchResponse};
use crate::normalize::extract_text;
use crate::progress::ProgressMode;
use crate::search::search_documents;
use crate::webhook::{ReqwestTransport, WebhookCoordinator, WebhookTransport};

/// Per-invocation overrides on top of the config file.
#[derive(Debug, Clone)]
pub struct AskOptions {
    pub query: String,
    pub k: Option<usize>,
    pub profile: Option<String>,
    pub webhook_url: Option<String>,
    pub include_context: bool,
    pub use_ai: bool,
    pub progress: ProgressMode,
}

impl AskOptions {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            k: None,
            profile: None,
            webhook_url: None,
            include_context: true,
            use_ai: true,
            progress: ProgressMode::Off,
        }
    }
}

/// Answer `opts.query` over HTTP using the configured backends.
pub async fn answer_query(config: &Config, opts: &AskOptions) -> Result<Answer> {
    answer_query_with(config, opts, http_transport(config)?, &CancellationToken::new()).await
}

fn http_transport(config: &Config) -> Result<Arc<dyn WebhookTransport>> {
    let timeout = config
        .webhook
        .request_timeout_secs
        .map(Duration::from_secs);
    Ok(Arc::new(ReqwestTransport::new(timeout)?))
}

/// [`answer_query`] with an explicit webhook transport and cancellation token.
pub async fn answer_query_with(
    config: &Config,
    opts: &AskOptions,
    transport: Arc<dyn WebhookTransport>,
    cancel: &CancellationToken,
) -> Result<Answer> {
    let query = opts.query.trim();
    if query.is_empty() {
        bail!("Query must not be empty");
    }

    let webhook_url = resolve_webhook_url(config, opts);
    let include_context = opts.include_context && config.webhook.include_context;
    let k = opts.k.unwrap_or(config.search.k);

    let search = if include_context || webhook_url.is_none() {
        let response = search_documents(&config.search, query, k)
            .await
            .with_context(|| "Document search failed")?;
        Some(response)
    } else {
        tracing::debug!("Skipping document search: context disabled");
        None
    };
    let hits = search.as_ref().map(|s| s.hits.len()).unwrap_or(0);

    let Some(url) = webhook_url else {
        let response = search.unwrap_or_default();
        return Ok(Answer {
            query: query.to_string(),
            text: format_study_context(query, &response),
            source: AnswerSource::SearchResults,
            session_id: None,
            polls: 0,
            hits,
            webhook_error: None,
            generated_at: chrono::Utc::now(),
        });
    };

    let profile_name = opts
        .profile
        .as_deref()
        .unwrap_or(config.webhook.profile.as_str());
    let options = config.profile(profile_name)?.clone();
    let coordinator = WebhookCoordinator::new(transport, options)
        .with_reporter(Arc::from(opts.progress.reporter()));

    let context = match &search {
        Some(response) => SearchContext::from_response(query, response),
        None => SearchContext::empty(query),
    };

    match coordinator
        .request_answer_with_cancel(&url, query, context, cancel)
        .await
    {
        Ok(reply) => Ok(Answer {
            query: query.to_string(),
            text: extract_text(&reply.payload),
            source: AnswerSource::Webhook,
            session_id: Some(reply.session_id),
            polls: reply.polls,
            hits,
            webhook_error: None,
            generated_at: chrono::Utc::now(),
        }),
        Err(err) => match fallback(config, query, search.as_ref(), &err) {
            Some(text) => {
                tracing::warn!(code = err.code(), "Webhook failed ({}), falling back to search results", err);
                Ok(Answer {
                    query: query.to_string(),
                    text,
                    source: AnswerSource::SearchResults,
                    session_id: None,
                    polls: 0,
                    hits,
                    webhook_error: Some(err.to_string()),
                    generated_at: chrono::Utc::now(),
                })
            }
            None => Err(anyhow::Error::new(err).context("Webhook request failed")),
        },
    }
}

/// `--webhook` wins over the config; `--no-ai` disables the webhook entirely.
fn resolve_webhook_url(config: &Config, opts: &AskOptions) -> Option<String> {
    if !opts.use_ai {
        return None;
    }
    opts.webhook_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .or_else(|| config.webhook_url())
        .map(str::to_string)
}

/// Formatted search results to show in place of a failed webhook answer.
fn fallback(
    config: &Config,
    query: &str,
    search: Option<&SearchResponse>,
    err: &WebhookError,
) -> Option<String> {
    if !config.webhook.fallback_to_results || matches!(err, WebhookError::Cancelled { .. }) {
        return None;
    }
    let response = search.filter(|s| !s.hits.is_empty())?;
    Some(format_study_context(query, response))
}

/// CLI entry point for `recall ask`.
pub async fn run_ask(
    config: &Config,
    opts: &AskOptions,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let transport = http_transport(config)?;
    let answer = tokio::select! {
        biased;
        answer = answer_query_with(config, opts, transport, &cancel) => answer?,
        _ = cancel.cancelled() => bail!("Interrupted"),
    };

    if let Some(err) = &answer.webhook_error {
        eprintln!("Webhook failed: {}. Showing search results instead.", err);
    }
    write_answer(&answer, format, output)
}
