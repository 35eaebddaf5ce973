//! CSV persistence for normalized tables.
//!
//! Every write replaces the file and always emits the header row, so an
//! empty table still yields a correctly shaped CSV.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::OutputError;
use crate::normalize::Table;

pub const WEATHER_FILE: &str = "noaa_weather_data.csv";
pub const ENERGY_FILE: &str = "eia_energy_data.csv";

/// Paths of the two pipeline artifacts inside `dir`.
pub fn output_paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join(WEATHER_FILE), dir.join(ENERGY_FILE))
}

/// Renders one cell: strings verbatim, null as empty, everything else as JSON.
fn cell_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Writes `table` to `path`, creating parent directories as needed.
pub fn write_table(path: &Path, table: &Table) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    debug!(path = %path.display(), rows = table.len(), "Writing CSV");

    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(cell_text).map(|c| c.into_owned()))?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = table.len(), "Table written");
    Ok(())
}

/// Reads a CSV written by [`write_table`] back into a [`Table`] of string cells.
pub fn read_table(path: &Path) -> Result<Table, OutputError> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let columns = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|cell| Value::String(cell.to_string()))
                .collect(),
        );
    }

    Ok(Table::from_parts(columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{ENERGY_SCHEMA, TaggedRecord, WEATHER_SCHEMA, normalize};
    use serde_json::json;
    use std::env;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(name)
    }

    fn weather_table() -> Table {
        let raw = json!({"date": "2024-05-31T00:00:00", "value": 21.7, "attributes": ",,W,2400"});
        let record = TaggedRecord::new(
            raw.as_object().unwrap(),
            vec![
                ("city", "Seattle".to_string()),
                ("state", "Washington".to_string()),
                ("datatype", "TMAX".to_string()),
            ],
        );
        normalize(&[record], &WEATHER_SCHEMA)
    }

    #[test]
    fn test_empty_table_writes_header_only() {
        let path = temp_path("weather_energy_pipeline_test_empty.csv");
        let _ = fs::remove_file(&path);

        write_table(&path, &Table::empty(&ENERGY_SCHEMA)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "region,state,date,value\n");

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_round_trip_keeps_columns_and_values() {
        let path = temp_path("weather_energy_pipeline_test_roundtrip.csv");
        let _ = fs::remove_file(&path);
        let table = weather_table();

        write_table(&path, &table).unwrap();
        let back = read_table(&path).unwrap();

        assert_eq!(back.columns(), table.columns());
        assert_eq!(back.len(), 1);
        assert_eq!(
            back.rows()[0],
            vec![
                json!("Seattle"),
                json!("Washington"),
                json!("2024-05-31T00:00:00"),
                json!("TMAX"),
                json!("21.7")
            ]
        );

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_overwrites_previous_file() {
        let path = temp_path("weather_energy_pipeline_test_overwrite.csv");
        let _ = fs::remove_file(&path);

        write_table(&path, &weather_table()).unwrap();
        write_table(&path, &weather_table()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_creates_missing_directories() {
        let dir = temp_path("weather_energy_pipeline_test_nested");
        let _ = fs::remove_dir_all(&dir);
        let path = dir.join("a").join("b.csv");

        write_table(&path, &Table::empty(&WEATHER_SCHEMA)).unwrap();

        assert!(path.exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_null_cells_are_empty() {
        assert_eq!(cell_text(&Value::Null), "");
        assert_eq!(cell_text(&json!(3)), "3");
        assert_eq!(cell_text(&json!("x,y")), "x,y");
    }
}
