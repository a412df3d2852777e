//! # Recall Me
//!
//! Ask questions about your own documents. A query is run against the
//! document-search backend, the retrieved passages are handed to an AI
//! automation webhook, and the webhook's answer, in whatever shape it comes
//! back, is reduced to plain text.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────────┐   ┌────────────┐
//! │  query   │──▶│ search_lc    │──▶│ WebhookCoord.   │──▶│ normalize  │──▶ export
//! │ (CLI)    │   │ (hits)       │   │ send + poll     │   │ (text)     │
//! └──────────┘   └──────────────┘   └─────────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! recall search "second law of thermodynamics"
//! recall ask "what is entropy?" --profile quick
//! recall saved run thermo --format markdown --output notes/thermo.md
//! recall profiles
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, poll profiles, saved searches |
//! | [`models`] | Search hits, webhook payloads, session IDs |
//! | [`error`] | Webhook failure taxonomy |
//! | [`normalize`] | Answer text extraction and poll-body classification |
//! | [`webhook`] | Request/poll coordinator and HTTP transport |
//! | [`progress`] | Poll progress on stderr |
//! | [`search`] | Document-search client |
//! | [`format`] | Study-context rendering of raw results |
//! | [`export`] | Answer output as text, Markdown, or JSON |
//! | [`ask`] | Search → webhook → answer, with fallback |
//! | [`saved`] | Saved searches |
//! | [`profiles`] | Poll-profile listing |

pub mod ask;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod models;
pub mod normalize;
pub mod profiles;
pub mod progress;
pub mod saved;
pub mod search;
pub mod webhook;
