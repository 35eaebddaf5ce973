//! Flattening of heterogeneous JSON records into fixed-schema tables.
//!
//! Adapters wrap each raw payload object in a [`TaggedRecord`] together with
//! the entity/metric context it was requested for. [`normalize`] then maps a
//! batch of records onto a [`Schema`], resolving source field names once per
//! batch.

use serde_json::{Map, Value};
use tracing::warn;

/// Where a canonical column takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// Stamped by the adapter from request context (entity name, metric).
    Tag,
    /// Read from the payload under the first alias present in the batch.
    /// With `fallback_last`, an unresolved column takes the batch's last
    /// payload column instead.
    Field {
        aliases: &'static [&'static str],
        fallback_last: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub source: ColumnSource,
}

/// Canonical, ordered column set of one output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub name: &'static str,
    pub columns: &'static [Column],
}

const fn tag(name: &'static str) -> Column {
    Column {
        name,
        source: ColumnSource::Tag,
    }
}

const fn field(name: &'static str, aliases: &'static [&'static str]) -> Column {
    Column {
        name,
        source: ColumnSource::Field {
            aliases,
            fallback_last: false,
        },
    }
}

pub const WEATHER_SCHEMA: Schema = Schema {
    name: "weather",
    columns: &[
        tag("city"),
        tag("state"),
        field("date", &["date"]),
        tag("datatype"),
        field("value", &["value"]),
    ],
};

pub const ENERGY_SCHEMA: Schema = Schema {
    name: "energy",
    columns: &[
        tag("region"),
        tag("state"),
        field("date", &["period", "date"]),
        Column {
            name: "value",
            source: ColumnSource::Field {
                aliases: &["value"],
                fallback_last: true,
            },
        },
    ],
};

impl Schema {
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}

/// One raw payload object plus the context it was fetched under.
///
/// The payload is flattened on construction; tags win over payload fields
/// of the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedRecord {
    tags: Vec<(&'static str, String)>,
    fields: Map<String, Value>,
}

impl TaggedRecord {
    pub fn new(raw: &Map<String, Value>, tags: Vec<(&'static str, String)>) -> Self {
        let mut fields = Map::new();
        for (key, value) in raw {
            flatten_into(&mut fields, key, value);
        }
        Self { tags, fields }
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

fn flatten_into(out: &mut Map<String, Value>, key: &str, value: &Value) {
    match value {
        Value::Object(inner) if !inner.is_empty() => {
            for (child, v) in inner {
                flatten_into(out, &format!("{key}.{child}"), v);
            }
        }
        other => {
            out.insert(key.to_string(), other.clone());
        }
    }
}

/// Rows of JSON scalars under a fixed header.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// A table with the schema's header and no rows.
    pub fn empty(schema: &Schema) -> Self {
        Self {
            columns: schema.columns.iter().map(|c| c.name.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_parts(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Appends the rows of `other`; headers must match.
    pub fn extend(&mut self, other: Table) {
        debug_assert_eq!(self.columns, other.columns);
        self.rows.extend(other.rows);
    }
}

/// Resolved column source for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolved {
    Tag(&'static str),
    Field(String),
    Missing,
}

/// Ordered union of payload keys across the batch, first-seen order.
fn batch_columns(records: &[TaggedRecord]) -> Vec<&str> {
    let mut seen: Vec<&str> = Vec::new();
    for record in records {
        for name in record.field_names() {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
    }
    seen
}

fn resolve(schema: &Schema, records: &[TaggedRecord]) -> Vec<Resolved> {
    let available = batch_columns(records);
    schema
        .columns
        .iter()
        .map(|column| match column.source {
            ColumnSource::Tag => Resolved::Tag(column.name),
            ColumnSource::Field {
                aliases,
                fallback_last,
            } => {
                let found = aliases
                    .iter()
                    .find(|alias| available.contains(*alias))
                    .map(|alias| alias.to_string())
                    .or_else(|| {
                        fallback_last
                            .then(|| available.last().map(|s| s.to_string()))
                            .flatten()
                    });
                match found {
                    Some(name) => Resolved::Field(name),
                    None => {
                        warn!(
                            schema = schema.name,
                            column = column.name,
                            "No payload field matches column, leaving it empty"
                        );
                        Resolved::Missing
                    }
                }
            }
        })
        .collect()
}

/// Projects `records` onto `schema`.
///
/// The output always carries exactly the schema's columns in schema order,
/// also when `records` is empty. Extra payload fields are dropped; absent
/// values become `null`.
pub fn normalize(records: &[TaggedRecord], schema: &Schema) -> Table {
    if records.is_empty() {
        return Table::empty(schema);
    }

    let plan = resolve(schema, records);
    let rows = records
        .iter()
        .map(|record| {
            plan.iter()
                .map(|source| match source {
                    Resolved::Tag(name) => record
                        .tag(name)
                        .map(|v| Value::String(v.to_string()))
                        .unwrap_or(Value::Null),
                    Resolved::Field(name) => record.field(name).cloned().unwrap_or(Value::Null),
                    Resolved::Missing => Value::Null,
                })
                .collect()
        })
        .collect();

    Table {
        columns: schema.column_names().into_iter().map(String::from).collect(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(raw: Value, tags: &[(&'static str, &str)]) -> TaggedRecord {
        let raw = raw.as_object().cloned().unwrap();
        TaggedRecord::new(
            &raw,
            tags.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        )
    }

    #[test]
    fn test_empty_input_keeps_schema_columns() {
        let table = normalize(&[], &WEATHER_SCHEMA);
        assert_eq!(table.columns(), ["city", "state", "date", "datatype", "value"]);
        assert!(table.is_empty());

        let table = normalize(&[], &ENERGY_SCHEMA);
        assert_eq!(table.columns(), ["region", "state", "date", "value"]);
    }

    #[test]
    fn test_weather_tags_override_payload_and_extras_dropped() {
        let records = vec![record(
            json!({
                "date": "2024-03-04T00:00:00",
                "datatype": "PRCP",
                "station": "GHCND:USW00094728",
                "attributes": ",,W,2400",
                "value": 12.2
            }),
            &[("city", "New York"), ("state", "New York"), ("datatype", "TMAX")],
        )];

        let table = normalize(&records, &WEATHER_SCHEMA);

        assert_eq!(table.len(), 1);
        assert_eq!(
            table.rows()[0],
            vec![
                json!("New York"),
                json!("New York"),
                json!("2024-03-04T00:00:00"),
                json!("TMAX"),
                json!(12.2)
            ]
        );
    }

    #[test]
    fn test_energy_period_becomes_date() {
        let records = vec![record(
            json!({"period": "2024-03-04T05", "respondent": "NYIS", "value": 15321}),
            &[("region", "New York"), ("state", "New York")],
        )];

        let table = normalize(&records, &ENERGY_SCHEMA);

        assert_eq!(table.column("date").unwrap(), vec![&json!("2024-03-04T05")]);
        assert_eq!(table.column("value").unwrap(), vec![&json!(15321)]);
    }

    #[test]
    fn test_period_preferred_over_date() {
        let records = vec![record(
            json!({"date": "ignored", "period": "2024-03-04T05", "value": 1}),
            &[("region", "Houston"), ("state", "Texas")],
        )];

        let table = normalize(&records, &ENERGY_SCHEMA);
        assert_eq!(table.column("date").unwrap(), vec![&json!("2024-03-04T05")]);
    }

    #[test]
    fn test_energy_value_falls_back_to_last_payload_column() {
        let records = vec![record(
            json!({"period": "2024-03-04T05", "type": "D", "demand": 987}),
            &[("region", "Phoenix"), ("state", "Arizona")],
        )];

        let table = normalize(&records, &ENERGY_SCHEMA);
        assert_eq!(table.column("value").unwrap(), vec![&json!(987)]);
        assert_eq!(table.column("region").unwrap(), vec![&json!("Phoenix")]);
    }

    #[test]
    fn test_resolution_is_per_batch() {
        // The second record lacks the resolved field and gets a null.
        let records = vec![
            record(json!({"period": "p1", "value": 1}), &[("region", "A"), ("state", "S")]),
            record(json!({"value": 2}), &[("region", "B"), ("state", "S")]),
        ];

        let table = normalize(&records, &ENERGY_SCHEMA);
        assert_eq!(
            table.column("date").unwrap(),
            vec![&json!("p1"), &Value::Null]
        );
    }

    #[test]
    fn test_unresolvable_field_is_null() {
        let records = vec![record(
            json!({"value": 3}),
            &[("city", "X"), ("state", "Y"), ("datatype", "TMIN")],
        )];

        let table = normalize(&records, &WEATHER_SCHEMA);
        assert_eq!(table.column("date").unwrap(), vec![&Value::Null]);
    }

    #[test]
    fn test_nested_objects_flatten_with_dots() {
        let rec = record(
            json!({"meta": {"unit": "MWh", "src": {"id": 7}}, "tags": [1, 2], "empty": {}}),
            &[],
        );

        assert_eq!(rec.field("meta.unit"), Some(&json!("MWh")));
        assert_eq!(rec.field("meta.src.id"), Some(&json!(7)));
        assert_eq!(rec.field("tags"), Some(&json!([1, 2])));
        assert_eq!(rec.field("empty"), Some(&json!({})));
        assert!(rec.field("meta").is_none());
    }

    #[test]
    fn test_row_order_follows_input() {
        let records: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|d| {
                record(
                    json!({"date": d, "value": 0}),
                    &[("city", "C"), ("state", "S"), ("datatype", "TMAX")],
                )
            })
            .collect();

        let table = normalize(&records, &WEATHER_SCHEMA);
        assert_eq!(
            table.column("date").unwrap(),
            vec![&json!("a"), &json!("b"), &json!("c")]
        );
    }
}
