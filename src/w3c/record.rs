//! Output records built from W3C log lines.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::directives::DirectiveState;
use super::timestamp::Timestamp;

/// Key holding the raw line when fields are not expanded.
pub const MESSAGE_KEY: &str = "message";
/// Key holding the path of the file the line was read from.
pub const LOG_PATH_KEY: &str = "log-path";
/// Key holding the derived `{seconds, nanos}` timestamp.
pub const TIMESTAMP_KEY: &str = "timestamp";

/// A single structured record emitted for one log line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Get a raw value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a string value by key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The raw line, if fields were not expanded.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.get_str(MESSAGE_KEY)
    }

    /// The source file path.
    #[must_use]
    pub fn log_path(&self) -> Option<&str> {
        self.get_str(LOG_PATH_KEY)
    }

    /// The derived timestamp, if one could be parsed.
    #[must_use]
    pub fn timestamp(&self) -> Option<Timestamp> {
        self.0
            .get(TIMESTAMP_KEY)
            .and_then(|v| Timestamp::deserialize(v).ok())
    }

    /// Number of keys in the record.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }
}

/// Builds [`Record`]s for lines of a single log file.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    path: String,
}

impl RecordBuilder {
    /// Create a builder that stamps records with `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Build a record for a data row.
    ///
    /// Tokens are zipped positionally with the active `#Fields:` list. With
    /// `expand_fields` the mapping becomes the record body, otherwise the raw
    /// line is kept under `message`.
    #[must_use]
    pub fn data_record(
        &self,
        line: &str,
        directives: &DirectiveState,
        expand_fields: bool,
    ) -> Record {
        self.build(line, directives, expand_fields)
    }

    /// Build a record for a directive line.
    ///
    /// The line is mapped against `#Fields:` like any other line when
    /// deriving the timestamp, but is always kept whole under `message`.
    #[must_use]
    pub fn directive_record(&self, line: &str, directives: &DirectiveState) -> Record {
        self.build(line, directives, false)
    }

    fn build(&self, line: &str, directives: &DirectiveState, expand_fields: bool) -> Record {
        let mapping: Option<Vec<(&str, &str)>> = directives.fields.as_ref().map(|fields| {
            fields
                .iter()
                .map(String::as_str)
                .zip(line.split_whitespace())
                .collect()
        });

        // Later duplicates of a field name win.
        let lookup = |name: &str| {
            mapping
                .as_ref()
                .and_then(|m| m.iter().rev().find(|(field, _)| *field == name))
                .map(|(_, token)| *token)
        };
        let timestamp = Timestamp::derive(
            lookup("date"),
            lookup("time"),
            directives.date.as_deref(),
        );

        let mut record = Record::default();
        match mapping.as_ref() {
            Some(pairs) if expand_fields => {
                for (field, token) in pairs {
                    record.insert(*field, *token);
                }
            }
            _ => record.insert(MESSAGE_KEY, line),
        }

        self.finish(record, timestamp)
    }

    fn finish(&self, mut record: Record, timestamp: Option<Timestamp>) -> Record {
        record.insert(LOG_PATH_KEY, self.path.as_str());
        if let Some(ts) = timestamp {
            record.insert(
                TIMESTAMP_KEY,
                serde_json::json!({ "seconds": ts.seconds, "nanos": ts.nanos }),
            );
        }
        record
    }
}
