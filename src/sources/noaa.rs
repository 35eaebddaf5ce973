//! NOAA Climate Data Online (GHCND daily summaries) weather adapter.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::{EntityRef, SourceSettings};
use crate::error::{SourceKind, SourceUnavailable};
use crate::fetch::auth::ApiKey;
use crate::fetch::{
    BasicClient, HttpClient, RequestSpec, RetryPolicy, RetryingExecutor, Sleeper, TokioSleeper,
};
use crate::normalize::{Schema, Table, TaggedRecord, WEATHER_SCHEMA, normalize};
use crate::sources::{Source, require_credential};
use crate::window::DateWindow;

const DATASET_ID: &str = "GHCND";
const PAGE_LIMIT: u32 = 1000;
const TOKEN_HEADER: &str = "token";

/// Daily temperature extremes requested per station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherMetric {
    Tmax,
    Tmin,
}

impl WeatherMetric {
    pub const ALL: [WeatherMetric; 2] = [WeatherMetric::Tmax, WeatherMetric::Tmin];

    pub fn code(&self) -> &'static str {
        match self {
            WeatherMetric::Tmax => "TMAX",
            WeatherMetric::Tmin => "TMIN",
        }
    }
}

pub struct NoaaSource<C = BasicClient, S = TokioSleeper> {
    client: C,
    sleeper: S,
    token: Option<String>,
    settings: SourceSettings,
    policy: RetryPolicy,
}

impl NoaaSource {
    pub fn new(token: Option<String>, settings: SourceSettings, policy: RetryPolicy) -> Self {
        Self::with_transport(BasicClient::new(), TokioSleeper, token, settings, policy)
    }
}

impl<C: HttpClient, S: Sleeper> NoaaSource<C, S> {
    pub fn with_transport(
        client: C,
        sleeper: S,
        token: Option<String>,
        settings: SourceSettings,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            sleeper,
            token,
            settings,
            policy,
        }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &C {
        &self.client
    }

    /// Request for one station and metric over `window`, sorted by date.
    pub fn request_for(
        &self,
        station_id: &str,
        metric: WeatherMetric,
        window: &DateWindow,
    ) -> RequestSpec {
        RequestSpec::get(&self.settings.base_url)
            .query("datasetid", DATASET_ID)
            .query("startdate", window.start_str())
            .query("enddate", window.end_str())
            .query("limit", PAGE_LIMIT.to_string())
            .query("units", "metric")
            .query("datatypeid", metric.code())
            .query("stationid", station_id)
            .query("includemetadata", "false")
            .query("sortfield", "date")
            .query("sortorder", "asc")
            .timeout(self.settings.timeout())
    }
}

/// Observation objects under `results`; absent means none.
fn results(payload: &Value) -> impl Iterator<Item = &serde_json::Map<String, Value>> {
    payload
        .get("results")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

#[async_trait]
impl<C: HttpClient, S: Sleeper> Source for NoaaSource<C, S> {
    fn kind(&self) -> SourceKind {
        SourceKind::Noaa
    }

    fn schema(&self) -> &'static Schema {
        &WEATHER_SCHEMA
    }

    async fn fetch(
        &self,
        entities: &[EntityRef],
        window: &DateWindow,
    ) -> Result<Table, SourceUnavailable> {
        let token = require_credential(SourceKind::Noaa, "noaa_api_key", self.token.as_deref())?;
        let client = ApiKey::new(&self.client, TOKEN_HEADER, &token)
            .map_err(|e| SourceUnavailable::invalid_credential(SourceKind::Noaa, e))?;
        let executor = RetryingExecutor::new(&client, &self.sleeper, self.policy);

        let mut records = Vec::new();
        let mut failed_units = 0usize;

        for entity in entities {
            let Some(station_id) = entity.noaa_station_id.as_deref() else {
                debug!(entity = %entity.name, "No NOAA station id, skipping");
                continue;
            };

            for metric in WeatherMetric::ALL {
                let span = info_span!(
                    "fetch_unit",
                    source = "noaa",
                    entity = %entity.name,
                    metric = metric.code()
                );
                let spec = self.request_for(station_id, metric, window);

                match executor.execute(&spec).instrument(span).await {
                    Ok(payload) => {
                        let before = records.len();
                        records.extend(results(&payload).map(|raw| {
                            TaggedRecord::new(
                                raw,
                                vec![
                                    ("city", entity.name.clone()),
                                    ("state", entity.state.clone()),
                                    ("datatype", metric.code().to_string()),
                                ],
                            )
                        }));
                        debug!(
                            entity = %entity.name,
                            metric = metric.code(),
                            records = records.len() - before,
                            "NOAA unit fetched"
                        );
                    }
                    Err(e) => {
                        failed_units += 1;
                        error!(
                            entity = %entity.name,
                            metric = metric.code(),
                            error = %e,
                            "NOAA fetch failed, skipping unit"
                        );
                    }
                }
            }
        }

        let table = normalize(&records, &WEATHER_SCHEMA);
        info!(rows = table.len(), failed_units, "NOAA weather data fetched");
        Ok(table)
    }
}
