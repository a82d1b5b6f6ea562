//! Final output schema and its validation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::{type_name, CountBounds};
use crate::error::{BroodError, Result};

/// One recommended activity
///
/// Every field is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub name: String,
    pub location: String,
    /// Kilometres from the family's neighborhood
    pub distance: f64,
    pub category: String,
    pub min_age: u32,
    pub max_age: u32,
    pub learning_focus: Vec<String>,
    pub parent_involvement: String,
    pub price_per_person: f64,
    pub language: String,
    pub public_transport_access: bool,
    pub start_time: String,
    pub end_time: String,
    pub booking_required: bool,
    pub wheelchair_accessible: bool,
    pub stroller_friendly: bool,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Number,
    Integer,
    Boolean,
    TextList,
}

impl FieldKind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::Text => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => whole_number(value).is_some(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::TextList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            FieldKind::Text => "a string",
            FieldKind::Number => "a number",
            FieldKind::Integer => "a non-negative integer",
            FieldKind::Boolean => "a boolean",
            FieldKind::TextList => "a list of strings",
        }
    }
}

const FIELDS: &[(&str, FieldKind)] = &[
    ("name", FieldKind::Text),
    ("location", FieldKind::Text),
    ("distance", FieldKind::Number),
    ("category", FieldKind::Text),
    ("min_age", FieldKind::Integer),
    ("max_age", FieldKind::Integer),
    ("learning_focus", FieldKind::TextList),
    ("parent_involvement", FieldKind::Text),
    ("price_per_person", FieldKind::Number),
    ("language", FieldKind::Text),
    ("public_transport_access", FieldKind::Boolean),
    ("start_time", FieldKind::Text),
    ("end_time", FieldKind::Text),
    ("booking_required", FieldKind::Boolean),
    ("wheelchair_accessible", FieldKind::Boolean),
    ("stroller_friendly", FieldKind::Boolean),
    ("description", FieldKind::Text),
];

impl ActivityRecord {
    /// Field names in schema order
    pub fn field_names() -> impl Iterator<Item = &'static str> {
        FIELDS.iter().map(|(name, _)| *name)
    }

    fn from_object(index: usize, object: &Map<String, Value>) -> Result<Self> {
        let mut normalized = Map::with_capacity(FIELDS.len());

        for (field, kind) in FIELDS {
            // `type` is the older name for `category`; `category` wins when both are present.
            let value = match (*field, object.get(*field)) {
                (_, Some(value)) => value,
                ("category", None) => match object.get("type") {
                    Some(value) => value,
                    None => return Err(BroodError::schema(Some(index), *field, "is missing")),
                },
                (_, None) => return Err(BroodError::schema(Some(index), *field, "is missing")),
            };
            if !kind.accepts(value) {
                return Err(BroodError::schema(
                    Some(index),
                    *field,
                    format!("must be {}, found {}", kind.describe(), type_name(value)),
                ));
            }

            let value = match (kind, whole_number(value)) {
                (FieldKind::Integer, Some(n)) => Value::from(n),
                _ => value.clone(),
            };
            normalized.insert(field.to_string(), value);
        }

        serde_json::from_value(Value::Object(normalized))
            .map_err(|e| BroodError::schema(Some(index), "record", e.to_string()))
    }
}

/// A non-negative whole number that fits in `u32`, written either as `3` or `3.0`
fn whole_number(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    let f = value.as_f64()?;
    if f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f) {
        Some(f as u32)
    } else {
        None
    }
}

/// Ordered list of recommendations, serialized as `{"activities": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityList {
    pub activities: Vec<ActivityRecord>,
}

impl ActivityList {
    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ActivityRecord> {
        self.activities.iter()
    }

    /// Validate raw final-stage output against the schema
    ///
    /// Accepts the `{"activities": [...]}` envelope or a bare array, optionally
    /// wrapped in a Markdown code fence. Checks every record's fields before
    /// checking the count bound.
    pub fn validate(raw: &str, bounds: CountBounds) -> Result<Self> {
        let body = strip_code_fence(raw);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| BroodError::schema(None, "activities", format!("is not valid JSON: {e}")))?;

        let items = match &value {
            Value::Array(items) => items,
            Value::Object(object) => match object.get("activities") {
                Some(Value::Array(items)) => items,
                Some(other) => {
                    return Err(BroodError::schema(
                        None,
                        "activities",
                        format!("must be an array, found {}", type_name(other)),
                    ))
                }
                None => return Err(BroodError::schema(None, "activities", "is missing")),
            },
            other => {
                return Err(BroodError::schema(
                    None,
                    "activities",
                    format!("must be an object or array, found {}", type_name(other)),
                ))
            }
        };

        let activities = items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(object) => ActivityRecord::from_object(index, object),
                other => Err(BroodError::schema(
                    Some(index),
                    "record",
                    format!("must be an object, found {}", type_name(other)),
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        if !bounds.contains(activities.len()) {
            return Err(BroodError::CountBounds {
                min: bounds.min,
                max: bounds.max,
                actual: activities.len(),
            });
        }

        Ok(Self { activities })
    }
}

impl<'a> IntoIterator for &'a ActivityList {
    type Item = &'a ActivityRecord;
    type IntoIter = std::slice::Iter<'a, ActivityRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.activities.iter()
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const BOUNDS: CountBounds = CountBounds { min: 1, max: 3 };

    fn record(name: &str) -> Value {
        json!({
            "name": name,
            "location": "Tierpark Hellabrunn",
            "distance": 4.2,
            "category": "zoo",
            "min_age": 3,
            "max_age": 12,
            "learning_focus": ["animals", "nature"],
            "parent_involvement": "accompany",
            "price_per_person": 17,
            "language": "German",
            "public_transport_access": true,
            "start_time": "10:00",
            "end_time": "16:00",
            "booking_required": false,
            "wheelchair_accessible": true,
            "stroller_friendly": true,
            "description": "A walk through the zoo."
        })
    }

    fn envelope(records: Vec<Value>) -> String {
        json!({ "activities": records }).to_string()
    }

    #[test]
    fn test_valid_envelope() {
        let list = ActivityList::validate(&envelope(vec![record("a"), record("b")]), BOUNDS).unwrap();
        let names: Vec<_> = list.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(list.activities[0].price_per_person, 17.0);
    }

    #[test]
    fn test_bare_array_and_fence() {
        let raw = format!("```json\n{}\n```", json!([record("a")]));
        let list = ActivityList::validate(&raw, BOUNDS).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_type_alias_for_category() {
        let mut r = record("a");
        let category = r.as_object_mut().unwrap().remove("category").unwrap();
        r.as_object_mut().unwrap().insert("type".into(), category);
        let list = ActivityList::validate(&envelope(vec![r]), BOUNDS).unwrap();
        assert_eq!(list.activities[0].category, "zoo");
    }

    #[test]
    fn test_category_and_type_together() {
        let mut r = record("a");
        r.as_object_mut().unwrap().insert("type".into(), json!("outdoor"));
        let list = ActivityList::validate(&envelope(vec![r]), BOUNDS).unwrap();
        assert_eq!(list.activities[0].category, "zoo");
    }

    #[test]
    fn test_whole_float_ages_accepted() {
        let mut r = record("a");
        r["min_age"] = json!(3.0);
        r["max_age"] = json!(12.0);
        let list = ActivityList::validate(&envelope(vec![r]), BOUNDS).unwrap();
        assert_eq!(list.activities[0].min_age, 3);
        assert_eq!(list.activities[0].max_age, 12);
    }

    #[test]
    fn test_missing_field() {
        let mut bad = record("b");
        bad.as_object_mut().unwrap().remove("wheelchair_accessible");
        let err = ActivityList::validate(&envelope(vec![record("a"), bad]), BOUNDS).unwrap_err();
        match err {
            BroodError::SchemaValidation { index, field, .. } => {
                assert_eq!(index, Some(1));
                assert_eq!(field, "wheelchair_accessible");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_mistyped_fields() {
        let cases = [
            ("distance", json!("4 km")),
            ("min_age", json!(-1)),
            ("min_age", json!(3.5)),
            ("learning_focus", json!("animals")),
            ("learning_focus", json!(["animals", 3])),
            ("booking_required", json!("no")),
        ];
        for (field, value) in cases {
            let mut r = record("a");
            r[field] = value;
            let err = ActivityList::validate(&envelope(vec![r]), BOUNDS).unwrap_err();
            assert!(
                matches!(err, BroodError::SchemaValidation { field: ref f, .. } if f == field),
                "field {field}: {err:?}"
            );
        }
    }

    #[test]
    fn test_envelope_errors() {
        for raw in ["not json", "42", r#"{"items": []}"#, r#"{"activities": {}}"#, "[1]"] {
            assert!(
                matches!(
                    ActivityList::validate(raw, BOUNDS),
                    Err(BroodError::SchemaValidation { .. })
                ),
                "accepted {raw}"
            );
        }
    }

    #[test]
    fn test_count_bounds_enforced() {
        let exact = CountBounds { min: 3, max: 3 };
        let err = ActivityList::validate(&envelope(vec![record("a"), record("b")]), exact).unwrap_err();
        assert!(matches!(err, BroodError::CountBounds { min: 3, max: 3, actual: 2 }));

        let four = envelope(vec![record("a"), record("b"), record("c"), record("d")]);
        assert!(matches!(
            ActivityList::validate(&four, exact),
            Err(BroodError::CountBounds { actual: 4, .. })
        ));
    }

    #[test]
    fn test_serializes_as_envelope() {
        let list = ActivityList::validate(&envelope(vec![record("a")]), BOUNDS).unwrap();
        let value = serde_json::to_value(&list).unwrap();
        assert!(value["activities"].is_array());
        assert_eq!(value["activities"][0]["category"], "zoo");
        assert_eq!(
            value["activities"][0].as_object().unwrap().len(),
            ActivityRecord::field_names().count()
        );
    }
}
