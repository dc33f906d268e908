use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// One CSV row keyed by header name, in header order. Read-only once built.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    data: Map<String, Value>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.data.get(column)
    }

    /// 欄位的字串值；缺欄位視為空字串
    pub fn text(&self, column: &str) -> Cow<'_, str> {
        match self.data.get(column) {
            Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
            None | Some(Value::Null) => Cow::Borrowed(""),
            Some(other) => Cow::Owned(other.to_string()),
        }
    }

    pub fn is_blank(&self, column: &str) -> bool {
        match self.data.get(column) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.data.values()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Map<String, Value>> for Record {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

/// A repeated column overwrites the earlier value but keeps its first position.
impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = Map::new();
        for (k, v) in iter {
            data.insert(k.into(), Value::String(v.into()));
        }
        Self { data }
    }
}


/// Raw payload as it came off the wire.
#[derive(Debug, Clone)]
pub struct SourceData {
    pub csv_text: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub parsed_count: usize,
    pub records: Vec<Record>,
    pub json_output: String,
    pub raw_csv: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub snapshot_key: String,
    pub archive_key: Option<String>,
    pub parsed_count: usize,
    pub records_stored: usize,
    pub fetched_at: DateTime<Utc>,
    #[serde(skip)]
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    Stored,
    Refreshed,
}

/// JSON body ready to be served, plus where it came from.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub body: String,
    pub origin: SnapshotOrigin,
}
