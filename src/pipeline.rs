//! Collection orchestrator: one sequential run over both sources.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::config::{EntityRef, PipelineConfig};
use crate::error::OutputError;
use crate::normalize::Table;
use crate::output::{output_paths, write_table};
use crate::sources::{EiaSource, NoaaSource, Source};
use crate::window::DateWindow;

/// Both canonical tables of one run. They share the (name, state) key space
/// but are never joined here.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub window: DateWindow,
    pub weather: Table,
    pub energy: Table,
}

/// Runs `source`, substituting an empty canonical table if the whole source
/// is unavailable.
async fn fetch_or_empty(
    source: &dyn Source,
    entities: &[EntityRef],
    window: &DateWindow,
) -> Table {
    match source.fetch(entities, window).await {
        Ok(table) => table,
        Err(e) => {
            error!(source = %source.kind(), error = %e, "Source unavailable, using empty table");
            Table::empty(source.schema())
        }
    }
}

/// Fetches weather then energy for `entities` over the same `window`.
pub async fn collect(
    weather: &dyn Source,
    energy: &dyn Source,
    entities: &[EntityRef],
    window: DateWindow,
) -> Collection {
    info!(%window, entities = entities.len(), "Collecting");
    let weather = fetch_or_empty(weather, entities, &window).await;
    let energy = fetch_or_empty(energy, entities, &window).await;
    Collection {
        window,
        weather,
        energy,
    }
}

/// One pipeline run over the window ending today.
pub async fn run(config: &PipelineConfig) -> Collection {
    run_for_window(config, DateWindow::current()).await
}

pub async fn run_for_window(config: &PipelineConfig, window: DateWindow) -> Collection {
    let credentials = config.credentials();
    let noaa = NoaaSource::new(credentials.noaa_token, config.noaa.clone(), config.retry);
    let eia = EiaSource::new(credentials.eia_api_key, config.eia.clone(), config.retry);
    collect(&noaa, &eia, &config.entities, window).await
}

/// Writes both tables into `dir`. Both writes are attempted before the first
/// failure is returned.
pub fn write_collection(
    dir: &Path,
    collection: &Collection,
) -> Result<(PathBuf, PathBuf), OutputError> {
    let (weather_path, energy_path) = output_paths(dir);

    let weather = write_table(&weather_path, &collection.weather);
    if let Err(e) = &weather {
        error!(path = %weather_path.display(), error = %e, "Failed to write weather CSV");
    }
    let energy = write_table(&energy_path, &collection.energy);
    if let Err(e) = &energy {
        error!(path = %energy_path.display(), error = %e, "Failed to write energy CSV");
    }

    weather?;
    energy?;
    Ok((weather_path, energy_path))
}
