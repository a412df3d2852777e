//! Study-context rendering of raw search results.
//!
//! This is what the user gets when no webhook is configured, or when the
//! webhook fails and the caller falls back to the documents themselves.
//! Images are listed by reference only.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::models::{Hit, SearchResponse};

const FOOTER: &str = "\n---\n*Retrieved from your documents using Recall Me*";

pub fn format_study_context(query: &str, response: &SearchResponse) -> String {
    let mut out = format!("**Study Context for: \"{}\"**\n\n", query);

    if response.hits.is_empty() {
        out.push_str("No relevant content found in your documents.\n");
        return out;
    }

    let _ = write!(out, "Found {} relevant results:\n\n", response.hits.len());

    let (image_hits, text_hits): (Vec<&Hit>, Vec<&Hit>) =
        response.hits.iter().partition(|h| h.is_image());

    for (i, hit) in text_hits.iter().enumerate() {
        let _ = writeln!(out, "**{}. Text{}**", i + 1, page_suffix(hit));
        let _ = write!(out, "{}\n\n", hit.content);
    }

    let empty: BTreeMap<String, String> = BTreeMap::new();
    let image_paths = response.image_paths.as_ref().unwrap_or(&empty);

    if !image_hits.is_empty() {
        out.push_str("\n**Images Found:**\n\n");
        for (i, hit) in image_hits.iter().enumerate() {
            let _ = writeln!(out, "**Image {}{}**", i + 1, page_suffix(hit));
            match hit.image_id() {
                Some(id) if image_paths.contains_key(id) => match hit.page() {
                    Some(page) => {
                        let _ = write!(out, "[Image from page {} - ID: {}]\n\n", page, id);
                    }
                    None => {
                        let _ = write!(out, "[Image - ID: {}]\n\n", id);
                    }
                },
                Some(id) => {
                    let _ = write!(out, "[Image data not available - {}]\n\n", id);
                }
                None => out.push_str("[Image data not available]\n\n"),
            }
        }
    }

    let standalone: Vec<&String> = image_paths
        .keys()
        .filter(|id| !image_hits.iter().any(|h| h.image_id() == Some(id.as_str())))
        .collect();

    if !standalone.is_empty() {
        out.push_str("\n**Additional Images:**\n\n");
        for (i, id) in standalone.iter().enumerate() {
            let _ = writeln!(out, "**Additional Image {}**", i + 1);
            let _ = write!(out, "[Additional Image - ID: {}]\n\n", id);
        }
    }

    out.push_str(FOOTER);
    out
}

fn page_suffix(hit: &Hit) -> String {
    hit.page()
        .map(|p| format!(" (Page {})", p))
        .unwrap_or_default()
}
