//! Document-search client.
//!
//! Talks to the retrieval backend's `GET {api_url}/search_lc?query=…&k=…`
//! endpoint. Only `hits` feed the webhook; `image_paths` is used when
//! rendering raw results, and `images` (base64 blobs) is never printed.

use anyhow::{bail, Context, Result};
use std::time::Duration;

use crate::config::{Config, SearchConfig};
use crate::format::format_study_context;
use crate::models::SearchResponse;

/// Query the search backend for the top `k` passages.
///
/// # Errors
///
/// Fails on transport errors, non-2xx responses (`HTTP <code>: <reason>`),
/// bodies that are not JSON, and bodies that carry an `error` field.
pub async fn search_documents(
    config: &SearchConfig,
    query: &str,
    k: usize,
) -> Result<SearchResponse> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let url = format!("{}/search_lc", config.api_url.trim_end_matches('/'));
    let k = k.to_string();

    let response = client
        .get(&url)
        .query(&[("query", query), ("k", k.as_str())])
        .send()
        .await
        .with_context(|| format!("Failed to reach search API at {}", url))?;

    let status = response.status();
    if !status.is_success() {
        bail!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        );
    }

    let body: SearchResponse = response
        .json()
        .await
        .with_context(|| "Search API returned an invalid response")?;

    if let Some(err) = &body.error {
        bail!("{}", err);
    }

    tracing::debug!("Search returned {} hits for {:?}", body.hits.len(), query);
    Ok(body)
}

/// CLI entry point for `recall search`.
pub async fn run_search(config: &Config, query: &str, k: Option<usize>, format: &str) -> Result<()> {
    match format {
        "text" | "json" => {}
        other => bail!("Unknown search output format: {}. Use text or json.", other),
    }

    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let k = k.unwrap_or(config.search.k);
    let mut response = search_documents(&config.search, query, k).await?;

    if format == "json" {
        response.images = None;
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", format_study_context(query, &response));
    }

    Ok(())
}
