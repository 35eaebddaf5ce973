//! Resilient request execution: bounded exponential backoff over an
//! [`HttpClient`].
//!
//! The retry loop is an explicit state machine. [`RetryPolicy::transition`]
//! is pure; [`RetryingExecutor`] drives it against a real (or fake)
//! transport and [`Sleeper`].

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{ConfigError, FetchError, TransientError};
use crate::fetch::client::HttpClient;
use crate::fetch::request::RequestSpec;
use crate::fetch::sleeper::Sleeper;

/// Longest error body kept in logs and errors.
const MAX_BODY_CHARS: usize = 512;

/// Retry budget and backoff multiplier.
///
/// One initial attempt plus up to `max_retries` retries. After failed attempt
/// `n` (0-based) the executor waits `backoff_factor^n` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: 2.0,
        }
    }
}

/// Where a single request currently stands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryState {
    Attempting { attempt: u32 },
    Backoff { attempt: u32, wait: Duration },
    Succeeded,
    Exhausted { attempts: u32 },
}

/// Classified result of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RateLimited,
    Failed,
    /// Not worth retrying (malformed request descriptor).
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryEvent {
    Completed(AttemptOutcome),
    BackoffElapsed,
}

impl RetryState {
    pub fn initial() -> Self {
        RetryState::Attempting { attempt: 0 }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded | RetryState::Exhausted { .. })
    }
}

impl AttemptOutcome {
    pub fn of(result: &Result<Value, FetchError>) -> Self {
        match result {
            Ok(_) => AttemptOutcome::Success,
            Err(FetchError::RateLimited) => AttemptOutcome::RateLimited,
            Err(FetchError::InvalidRequest(_)) => AttemptOutcome::Fatal,
            Err(_) => AttemptOutcome::Failed,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_factor: f64) -> Result<Self, ConfigError> {
        let policy = Self {
            max_retries,
            backoff_factor,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::invalid(
                "retry.backoff_factor",
                format!("must be a finite number >= 1, got {}", self.backoff_factor),
            ));
        }
        Ok(())
    }

    /// Wait applied after failed attempt `attempt`.
    pub fn wait_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Total attempts a request may make.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Pure transition function of the retry state machine. Events that make
    /// no sense for the current state leave it unchanged.
    pub fn transition(&self, state: RetryState, event: RetryEvent) -> RetryState {
        match (state, event) {
            (RetryState::Attempting { .. }, RetryEvent::Completed(AttemptOutcome::Success)) => {
                RetryState::Succeeded
            }
            (RetryState::Attempting { attempt }, RetryEvent::Completed(AttemptOutcome::Fatal)) => {
                RetryState::Exhausted {
                    attempts: attempt + 1,
                }
            }
            (RetryState::Attempting { attempt }, RetryEvent::Completed(_)) => {
                if attempt >= self.max_retries {
                    RetryState::Exhausted {
                        attempts: attempt + 1,
                    }
                } else {
                    RetryState::Backoff {
                        attempt,
                        wait: self.wait_for(attempt),
                    }
                }
            }
            (RetryState::Backoff { attempt, .. }, RetryEvent::BackoffElapsed) => {
                RetryState::Attempting {
                    attempt: attempt + 1,
                }
            }
            (state, _) => state,
        }
    }
}

/// Issues one logical request with rate-limit and transient-error retries.
pub struct RetryingExecutor<'a, C: ?Sized, S: ?Sized> {
    client: &'a C,
    sleeper: &'a S,
    policy: RetryPolicy,
}

impl<'a, C, S> RetryingExecutor<'a, C, S>
where
    C: HttpClient + ?Sized,
    S: Sleeper + ?Sized,
{
    pub fn new(client: &'a C, sleeper: &'a S, policy: RetryPolicy) -> Self {
        Self {
            client,
            sleeper,
            policy,
        }
    }

    /// Runs `spec` until it yields a JSON payload or the retry budget is spent.
    ///
    /// Rate limits and transient failures share the same backoff path. The
    /// caller decides what an exhausted unit means; nothing here panics or
    /// aborts other units.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<Value, FetchError> {
        let mut state = RetryState::initial();
        let mut last: Option<Result<Value, FetchError>> = None;

        while !state.is_terminal() {
            state = match state {
                RetryState::Attempting { attempt } => {
                    let result = self.attempt(spec).await;
                    let outcome = AttemptOutcome::of(&result);
                    let next = self.policy.transition(state, RetryEvent::Completed(outcome));
                    if let (Err(err), RetryState::Backoff { wait, .. }) = (&result, &next) {
                        if err.is_rate_limited() {
                            warn!(
                                attempt,
                                wait_secs = wait.as_secs_f64(),
                                "Rate limited, retrying"
                            );
                        } else {
                            error!(
                                attempt,
                                wait_secs = wait.as_secs_f64(),
                                error = %err,
                                "Request failed, retrying"
                            );
                        }
                    }
                    last = Some(result);
                    next
                }
                RetryState::Backoff { wait, .. } => {
                    self.sleeper.sleep(wait).await;
                    self.policy.transition(state, RetryEvent::BackoffElapsed)
                }
                terminal => terminal,
            };
        }

        match (state, last) {
            (_, Some(Err(err @ FetchError::InvalidRequest(_)))) => Err(err),
            (RetryState::Exhausted { attempts }, Some(Err(err))) => {
                Err(FetchError::RetriesExhausted {
                    attempts,
                    last: Box::new(err),
                })
            }
            (_, Some(result)) => result,
            (_, None) => Err(FetchError::InvalidRequest(
                "request loop ended without an attempt".to_string(),
            )),
        }
    }

    async fn attempt(&self, spec: &RequestSpec) -> Result<Value, FetchError> {
        let req = spec.build()?;
        debug!(url = %req.url().path(), "Sending request");

        let resp = self
            .client
            .execute(req)
            .await
            .map_err(TransientError::from)?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::status(status, truncate(body)));
        }

        let bytes = resp.bytes().await.map_err(TransientError::from)?;
        let payload = serde_json::from_slice(&bytes).map_err(TransientError::from)?;
        Ok(payload)
    }
}

fn truncate(mut body: String) -> String {
    if let Some((idx, _)) = body.char_indices().nth(MAX_BODY_CHARS) {
        body.truncate(idx);
    }
    body
}
