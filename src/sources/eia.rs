//! EIA v2 hourly regional electricity demand adapter.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{Instrument, debug, error, info, info_span};

use crate::config::{EntityRef, SourceSettings};
use crate::error::{SourceKind, SourceUnavailable};
use crate::fetch::auth::UrlParam;
use crate::fetch::{
    BasicClient, HttpClient, RequestSpec, RetryPolicy, RetryingExecutor, Sleeper, TokioSleeper,
};
use crate::normalize::{ENERGY_SCHEMA, Schema, Table, TaggedRecord, normalize};
use crate::sources::{Source, require_credential};
use crate::window::DateWindow;

const API_KEY_PARAM: &str = "api_key";

pub struct EiaSource<C = BasicClient, S = TokioSleeper> {
    client: C,
    sleeper: S,
    api_key: Option<String>,
    settings: SourceSettings,
    policy: RetryPolicy,
}

impl EiaSource {
    pub fn new(api_key: Option<String>, settings: SourceSettings, policy: RetryPolicy) -> Self {
        Self::with_transport(BasicClient::new(), TokioSleeper, api_key, settings, policy)
    }
}

impl<C: HttpClient, S: Sleeper> EiaSource<C, S> {
    pub fn with_transport(
        client: C,
        sleeper: S,
        api_key: Option<String>,
        settings: SourceSettings,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            sleeper,
            api_key,
            settings,
            policy,
        }
    }

    #[cfg(test)]
    pub(crate) fn transport(&self) -> &C {
        &self.client
    }

    /// Hourly demand request for one respondent over `window`. The API key
    /// is added by the transport wrapper, not here.
    pub fn request_for(&self, region_code: &str, window: &DateWindow) -> RequestSpec {
        RequestSpec::get(&self.settings.base_url)
            .query("frequency", "hourly")
            .query("data[0]", "value")
            .query("facets[respondent][]", region_code)
            .query("start", window.start_str())
            .query("end", window.end_str())
            .timeout(self.settings.timeout())
    }
}

/// Rows under `response.data`; absent means none.
fn data_rows(payload: &Value) -> impl Iterator<Item = &Map<String, Value>> {
    payload
        .pointer("/response/data")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

#[async_trait]
impl<C: HttpClient, S: Sleeper> Source for EiaSource<C, S> {
    fn kind(&self) -> SourceKind {
        SourceKind::Eia
    }

    fn schema(&self) -> &'static Schema {
        &ENERGY_SCHEMA
    }

    async fn fetch(
        &self,
        entities: &[EntityRef],
        window: &DateWindow,
    ) -> Result<Table, SourceUnavailable> {
        let key = require_credential(SourceKind::Eia, "eia_api_key", self.api_key.as_deref())?;
        let client = UrlParam {
            inner: &self.client,
            param_name: API_KEY_PARAM.to_string(),
            key,
        };
        let executor = RetryingExecutor::new(&client, &self.sleeper, self.policy);

        let mut records = Vec::new();
        let mut failed_units = 0usize;

        for entity in entities {
            let Some(region_code) = entity.eia_region_code.as_deref() else {
                debug!(entity = %entity.name, "No EIA region code, skipping");
                continue;
            };

            let span = info_span!(
                "fetch_unit",
                source = "eia",
                entity = %entity.name,
                region = region_code
            );
            let spec = self.request_for(region_code, window);

            match executor.execute(&spec).instrument(span).await {
                Ok(payload) => {
                    let before = records.len();
                    records.extend(data_rows(&payload).map(|raw| {
                        TaggedRecord::new(
                            raw,
                            vec![
                                ("region", entity.name.clone()),
                                ("state", entity.state.clone()),
                            ],
                        )
                    }));
                    debug!(
                        entity = %entity.name,
                        records = records.len() - before,
                        "EIA unit fetched"
                    );
                }
                Err(e) => {
                    failed_units += 1;
                    error!(
                        entity = %entity.name,
                        region = region_code,
                        error = %e,
                        "EIA fetch failed, skipping unit"
                    );
                }
            }
        }

        let table = normalize(&records, &ENERGY_SCHEMA);
        info!(rows = table.len(), failed_units, "EIA energy data fetched");
        Ok(table)
    }
}
