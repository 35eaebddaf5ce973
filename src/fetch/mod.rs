//! HTTP plumbing shared by every source adapter.
//!
//! - [`HttpClient`] is the transport seam, [`BasicClient`] the reqwest one.
//! - [`auth`] wraps a client to inject credentials.
//! - [`RequestSpec`] describes one GET independent of any client.
//! - [`RetryingExecutor`] runs a request with bounded exponential backoff.

mod basic;
mod client;
mod request;
mod retry;
mod sleeper;

pub mod auth;

#[cfg(test)]
pub(crate) mod testing;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use request::RequestSpec;
pub use retry::{AttemptOutcome, RetryEvent, RetryPolicy, RetryState, RetryingExecutor};
pub use sleeper::{Sleeper, TokioSleeper};
