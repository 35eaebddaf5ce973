//! Source adapters: one per upstream API.
//!
//! Each adapter turns (entities × metrics × window) into requests, runs them
//! through the [`RetryingExecutor`](crate::fetch::RetryingExecutor) one at a
//! time, stamps context onto the returned records and normalizes the batch.
//! A failed unit contributes no rows; only a whole-adapter failure surfaces
//! as [`SourceUnavailable`].

pub mod eia;
pub mod noaa;

pub use eia::EiaSource;
pub use noaa::{NoaaSource, WeatherMetric};

use async_trait::async_trait;

use crate::config::EntityRef;
use crate::error::{SourceKind, SourceUnavailable};
use crate::normalize::{Schema, Table};
use crate::window::DateWindow;

/// A time-series upstream producing one canonical table per run.
#[async_trait]
pub trait Source: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Canonical schema of the table this source produces.
    fn schema(&self) -> &'static Schema;

    async fn fetch(
        &self,
        entities: &[EntityRef],
        window: &DateWindow,
    ) -> Result<Table, SourceUnavailable>;
}

pub(crate) fn require_credential(
    kind: SourceKind,
    field: &str,
    value: Option<&str>,
) -> Result<String, SourceUnavailable> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SourceUnavailable::missing_credential(kind, field))
}
