//! Webhook request/poll coordination.
//!
//! A webhook answers in one of two ways. Some automations reply to the
//! initial POST with the finished answer. Others reply with
//! `{"message": "Workflow was started"}` or `{"status": "processing"}` and
//! expect the caller to come back for the result. [`WebhookCoordinator`]
//! handles both: it sends the query plus retrieved context, and when the
//! work was handed off it polls with exponential backoff until an answer
//! shows up or the attempt budget runs out.
//!
//! # Poll schedule
//!
//! The delay before poll `n` (0-based) is
//! `min(base_delay_ms × backoff_factor^n, max_delay_ms)`. Timeouts are
//! attempt-count based, so the longest a caller can wait is the sum of that
//! schedule ([`PollOptions::worst_case_wait`]), plus however long the HTTP
//! calls themselves take. With the `full` defaults (20 attempts, 2 s base,
//! ×1.5, 10 s cap) that is 176.25 s of sleeping.
//!
//! # Failure handling
//!
//! | Where | What | Outcome |
//! |-------|------|---------|
//! | initial POST | non-2xx | [`WebhookError::Http`], no retry |
//! | initial POST | transport error | [`WebhookError::Network`] |
//! | initial POST | body not JSON | [`WebhookError::MalformedResponse`] |
//! | poll | transport error / non-2xx | logged, counts against the budget |
//! | poll | body not JSON | treated as `{"message": <body>}` |
//! | poll | budget spent | [`WebhookError::Timeout`] |
//! | any wait | token cancelled | [`WebhookError::Cancelled`] |

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WebhookError;
use crate::models::{PollState, SearchContext, WebhookRequestPayload};
use crate::normalize::{classify_poll, signals_started, PollVerdict};
use crate::progress::{NoProgress, PollProgressEvent, PollProgressReporter};

/// How a poll asks the webhook for the result of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStrategy {
    /// `GET {url}?session_id={id}`
    #[default]
    Get,
    /// `POST {url}` with `{"action": "get_response", "session_id": id}`
    Post,
}

impl PollStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStrategy::Get => "get",
            PollStrategy::Post => "post",
        }
    }
}

/// Attempt budget and backoff schedule for one coordinator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PollOptions {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    #[serde(default)]
    pub max_delay_ms: Option<u64>,
    #[serde(default)]
    pub poll_strategy: PollStrategy,
}

impl PollOptions {
    /// Fewer, slower-growing attempts; polls with `GET ?session_id=`.
    pub fn quick() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 3000,
            backoff_factor: 1.2,
            max_delay_ms: None,
            poll_strategy: PollStrategy::Get,
        }
    }

    /// Longer budget with a capped delay; polls with a POSTed `get_response` action.
    pub fn full() -> Self {
        Self {
            max_attempts: 20,
            base_delay_ms: 2000,
            backoff_factor: 1.5,
            max_delay_ms: Some(10_000),
            poll_strategy: PollStrategy::Post,
        }
    }

    /// Delay before poll `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.base_delay_ms as f64 * self.backoff_factor.powi(attempt as i32);
        let capped = match self.max_delay_ms {
            Some(cap) => raw.min(cap as f64),
            None => raw,
        };
        // f64 -> u64 saturates, so a runaway schedule tops out instead of wrapping.
        Duration::from_millis(capped.round() as u64)
    }

    /// Total sleep time if every poll comes back empty.
    pub fn worst_case_wait(&self) -> Duration {
        (0..self.max_attempts).fold(Duration::ZERO, |total, a| {
            total.saturating_add(self.delay_for(a))
        })
    }

    pub(crate) fn validate(&self, name: &str) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            anyhow::bail!("webhook.profiles.{}.max_attempts must be >= 1", name);
        }
        if self.base_delay_ms == 0 {
            anyhow::bail!("webhook.profiles.{}.base_delay_ms must be > 0", name);
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            anyhow::bail!("webhook.profiles.{}.backoff_factor must be >= 1.0", name);
        }
        if let Some(cap) = self.max_delay_ms {
            if cap < self.base_delay_ms {
                anyhow::bail!(
                    "webhook.profiles.{}.max_delay_ms ({}) must be >= base_delay_ms ({})",
                    name,
                    cap,
                    self.base_delay_ms
                );
            }
        }
        Ok(())
    }
}

/// Status line and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The HTTP side of the exchange.
///
/// [`ReqwestTransport`] is the real implementation; the seam exists so the
/// poll loop can be driven by scripted responses.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POST the initial payload.
    async fn send(&self, url: &str, payload: &WebhookRequestPayload) -> anyhow::Result<RawResponse>;

    /// Ask for the result of `session_id`.
    async fn poll(
        &self,
        url: &str,
        session_id: &str,
        strategy: PollStrategy,
    ) -> anyhow::Result<RawResponse>;
}

/// [`WebhookTransport`] over a shared `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// `timeout` bounds each HTTP call; `None` leaves calls unbounded.
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn read(response: reqwest::Response) -> anyhow::Result<RawResponse> {
        let status = response.status();
        let body = response.text().await?;
        Ok(RawResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            body,
        })
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn send(&self, url: &str, payload: &WebhookRequestPayload) -> anyhow::Result<RawResponse> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(payload)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn poll(
        &self,
        url: &str,
        session_id: &str,
        strategy: PollStrategy,
    ) -> anyhow::Result<RawResponse> {
        let request = match strategy {
            PollStrategy::Get => self
                .client
                .get(url)
                .query(&[("session_id", session_id)])
                .header("Content-Type", "application/json"),
            PollStrategy::Post => self.client.post(url).json(&serde_json::json!({
                "action": "get_response",
                "session_id": session_id,
            })),
        };
        let response = request.send().await?;
        Self::read(response).await
    }
}

/// A finished webhook exchange.
#[derive(Debug, Clone)]
pub struct WebhookReply {
    pub session_id: String,
    /// Poll calls issued; `0` when the initial reply was already the answer.
    pub polls: u32,
    /// The raw answer, ready for [`crate::normalize::extract_text`].
    pub payload: Value,
}

/// Drives the initial request and the optional poll loop against one webhook.
///
/// Calls are independent: each gets its own session ID and poll state, so
/// one coordinator can serve concurrent requests.
pub struct WebhookCoordinator {
    transport: Arc<dyn WebhookTransport>,
    options: PollOptions,
    reporter: Arc<dyn PollProgressReporter>,
}

impl WebhookCoordinator {
    pub fn new(transport: Arc<dyn WebhookTransport>, options: PollOptions) -> Self {
        Self {
            transport,
            options,
            reporter: Arc::new(NoProgress),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn PollProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// Send `query` and `context` to `webhook_url` and wait for the answer.
    pub async fn request_answer(
        &self,
        webhook_url: &str,
        query: &str,
        context: SearchContext,
    ) -> Result<WebhookReply, WebhookError> {
        self.request_answer_with_cancel(webhook_url, query, context, &CancellationToken::new())
            .await
    }

    /// Like [`request_answer`](Self::request_answer), but gives up with
    /// [`WebhookError::Cancelled`] once `cancel` fires.
    pub async fn request_answer_with_cancel(
        &self,
        webhook_url: &str,
        query: &str,
        context: SearchContext,
        cancel: &CancellationToken,
    ) -> Result<WebhookReply, WebhookError> {
        let url = webhook_url.trim();
        if url.is_empty() {
            return Err(WebhookError::InvalidUrl);
        }

        let payload = WebhookRequestPayload::new(query, context);
        let mut state = PollState::new(payload.session_id.clone());

        debug!(
            "Sending webhook request: session={} hits={}",
            state.session_id, payload.rag_context.total_results
        );
        let response = self
            .transport
            .send(url, &payload)
            .await
            .map_err(|e| WebhookError::Network(format!("{:#}", e)))?;
        self.reporter.report(PollProgressEvent::Sent {
            session_id: state.session_id.clone(),
        });

        if !response.is_success() {
            return Err(WebhookError::Http {
                status: response.status,
                status_text: response.status_text,
            });
        }

        let body: Value = serde_json::from_str(&response.body)
            .map_err(|e| WebhookError::MalformedResponse(e.to_string()))?;

        if !signals_started(&body) {
            debug!("Webhook answered immediately: session={}", state.session_id);
            return Ok(WebhookReply {
                session_id: state.session_id,
                polls: 0,
                payload: body,
            });
        }

        info!(
            "Webhook workflow started, polling: session={} strategy={} max_attempts={}",
            state.session_id,
            self.options.poll_strategy.as_str(),
            self.options.max_attempts
        );
        self.reporter.report(PollProgressEvent::Processing {
            session_id: state.session_id.clone(),
        });

        self.poll_until_ready(url, &mut state, cancel).await
    }

    async fn poll_until_ready(
        &self,
        url: &str,
        state: &mut PollState,
        cancel: &CancellationToken,
    ) -> Result<WebhookReply, WebhookError> {
        let max_attempts = self.options.max_attempts;

        for attempt in 0..max_attempts {
            state.attempt = attempt;
            let delay = self.options.delay_for(attempt);
            self.reporter.report(PollProgressEvent::Waiting {
                attempt: attempt + 1,
                max_attempts,
                delay_ms: delay.as_millis() as u64,
            });
            debug!(
                "Poll attempt {}/{} in {:?}: session={}",
                attempt + 1,
                max_attempts,
                delay,
                state.session_id
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WebhookError::Cancelled { attempts: attempt }),
                _ = tokio::time::sleep(delay) => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(WebhookError::Cancelled { attempts: attempt }),
                outcome = self.transport.poll(url, &state.session_id, self.options.poll_strategy) => outcome,
            };
            let polls = attempt + 1;

            let reason = match outcome {
                Err(e) => {
                    warn!("Poll attempt {} failed: {:#}", polls, e);
                    format!("{:#}", e)
                }
                Ok(response) if !response.is_success() => {
                    warn!(
                        "Poll attempt {} returned HTTP {} {}",
                        polls, response.status, response.status_text
                    );
                    format!("HTTP {} {}", response.status, response.status_text)
                }
                Ok(response) => {
                    let body = parse_poll_body(&response.body);
                    match classify_poll(&body) {
                        PollVerdict::Complete => {
                            info!(
                                "Webhook response received after {} polls ({}ms): session={}",
                                polls,
                                (chrono::Utc::now() - state.started_at).num_milliseconds(),
                                state.session_id
                            );
                            self.reporter.report(PollProgressEvent::Completed { polls });
                            return Ok(WebhookReply {
                                session_id: state.session_id.clone(),
                                polls,
                                payload: body,
                            });
                        }
                        PollVerdict::Pending => "still processing".to_string(),
                        PollVerdict::NotReady => "no answer in response".to_string(),
                    }
                }
            };
            self.reporter.report(PollProgressEvent::NotReady {
                attempt: polls,
                reason,
            });
        }

        warn!(
            "Webhook polling gave up after {} attempts: session={}",
            max_attempts, state.session_id
        );
        Err(WebhookError::Timeout {
            attempts: max_attempts,
        })
    }
}

/// Some backends answer polls with bare text instead of JSON.
fn parse_poll_body(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::json!({ "message": body }))
}
