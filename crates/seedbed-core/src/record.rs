use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ID_FIELD: &str = "id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// String-keyed record stored in a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from a JSON object; other values yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&Value> {
        self.0.get(ID_FIELD).filter(|value| !value.is_null())
    }

    pub fn created_at(&self) -> Option<&str> {
        self.0.get(CREATED_AT_FIELD).and_then(Value::as_str)
    }

    pub fn updated_at(&self) -> Option<&str> {
        self.0.get(UPDATED_AT_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Field value, with `null` standing in for a missing field.
    pub fn value(&self, field: &str) -> &Value {
        self.0.get(field).unwrap_or(&Value::Null)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Whether this record's id matches `id` (`1` and `"1"` are the same id).
    pub fn has_id(&self, id: &Value) -> bool {
        self.id().is_some_and(|own| keys_match(own, id))
    }

    /// Merge `partial` over this record, keeping system fields intact.
    pub fn merge(&mut self, partial: Record) {
        for (field, value) in partial.0 {
            if is_system_field(&field) {
                continue;
            }
            self.0.insert(field, value);
        }
    }
}

impl From<Map<String, Value>> for Record {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}

/// Fields maintained by the store rather than the caller.
pub fn is_system_field(field: &str) -> bool {
    matches!(field, ID_FIELD | CREATED_AT_FIELD | UPDATED_AT_FIELD)
}

/// Canonical comparison key for an id value.
pub fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Key equality used for ids and foreign keys; `null` never matches.
pub fn keys_match(left: &Value, right: &Value) -> bool {
    match (id_key(left), id_key(right)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

/// Current time as an ISO-8601 UTC timestamp with millisecond precision.
pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

/// Timestamp strictly after `previous`, normally the current time.
pub fn next_timestamp(previous: Option<&str>) -> String {
    let now = Utc::now();
    let previous = previous
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|value| value.with_timezone(&Utc));
    match previous {
        Some(previous) if now <= previous => format_timestamp(previous + Duration::milliseconds(1)),
        _ => format_timestamp(now),
    }
}

fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn has_id_treats_numeric_and_text_ids_alike() {
        let record = Record::from_value(json!({ "id": 7, "name": "x" })).unwrap();
        assert!(record.has_id(&json!(7)));
        assert!(record.has_id(&json!("7")));
        assert!(!record.has_id(&json!(8)));
        assert!(!record.has_id(&Value::Null));
    }

    #[test]
    fn merge_ignores_system_fields() {
        let mut record =
            Record::from_value(json!({ "id": 1, "createdAt": "a", "name": "old" })).unwrap();
        record.merge(Record::from_value(json!({ "id": 9, "createdAt": "b", "name": "new" })).unwrap());
        assert_eq!(record.value("id"), &json!(1));
        assert_eq!(record.value("createdAt"), &json!("a"));
        assert_eq!(record.value("name"), &json!("new"));
    }

    #[test]
    fn next_timestamp_never_goes_backwards() {
        let future = "2999-01-01T00:00:00.000Z";
        let next = next_timestamp(Some(future));
        assert_eq!(next, "2999-01-01T00:00:00.001Z");
        assert!(next_timestamp(Some("not a date")).as_str() > "2000");
    }
}
