//! Filter expressions for list and pivot queries, and their validation
//! against a project's event-field schema.

use crate::constants::filters::{BEFORE_FIELD, SINCE_FIELD};
use crate::errors::ToolError;
use crate::services::insight_hub_api::EventField;
use crate::utils::suggest::closest_matches;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Eq,
    Ne,
    Empty,
}

impl FilterType {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::Eq => "eq",
            FilterType::Ne => "ne",
            FilterType::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterScalar {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for FilterScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterScalar::Bool(v) => write!(f, "{}", v),
            FilterScalar::Number(v) => write!(f, "{}", v),
            FilterScalar::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for FilterScalar {
    fn from(value: &str) -> Self {
        FilterScalar::Text(value.to_string())
    }
}

impl From<String> for FilterScalar {
    fn from(value: String) -> Self {
        FilterScalar::Text(value)
    }
}

impl From<i64> for FilterScalar {
    fn from(value: i64) -> Self {
        FilterScalar::Number(value.into())
    }
}

impl From<bool> for FilterScalar {
    fn from(value: bool) -> Self {
        FilterScalar::Bool(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterValue {
    #[serde(rename = "type")]
    pub kind: FilterType,
    pub value: FilterScalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Hours,
    Days,
}

impl TimeUnit {
    fn suffix(self) -> char {
        match self {
            TimeUnit::Hours => 'h',
            TimeUnit::Days => 'd',
        }
    }
}

impl FilterValue {
    pub fn equals(value: impl Into<FilterScalar>) -> Self {
        Self {
            kind: FilterType::Eq,
            value: value.into(),
        }
    }

    pub fn not_equals(value: impl Into<FilterScalar>) -> Self {
        Self {
            kind: FilterType::Ne,
            value: value.into(),
        }
    }

    /// `empty` filters carry the flag as the string `"true"`/`"false"`.
    pub fn empty(is_empty: bool) -> Self {
        Self {
            kind: FilterType::Empty,
            value: FilterScalar::Text(is_empty.to_string()),
        }
    }

    pub fn relative_time(amount: u32, unit: TimeUnit) -> Self {
        Self::equals(format!("{}{}", amount, unit.suffix()))
    }

    pub fn iso_time(at: DateTime<Utc>) -> Self {
        Self::equals(at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Field name to constraints, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterExpression(IndexMap<String, Vec<FilterValue>>);

impl FilterExpression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&[FilterValue]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn add_filter(&mut self, field: &str, value: FilterValue) -> &mut Self {
        self.0.entry(field.to_string()).or_default().push(value);
        self
    }

    pub fn add_time_range(&mut self, since: DateTime<Utc>, before: DateTime<Utc>) -> &mut Self {
        self.add_filter(SINCE_FIELD, FilterValue::iso_time(since));
        self.add_filter(BEFORE_FIELD, FilterValue::iso_time(before))
    }

    pub fn add_relative_time_range(&mut self, amount: u32, unit: TimeUnit) -> &mut Self {
        self.add_filter(SINCE_FIELD, FilterValue::relative_time(amount, unit))
    }

    /// `filters[<field>][][type]` then `filters[<field>][][value]` for every
    /// constraint, fields in insertion order.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (field, values) in &self.0 {
            for value in values {
                pairs.push((format!("filters[{}][][type]", field), value.kind.as_str().to_string()));
                pairs.push((format!("filters[{}][][value]", field), value.value.to_string()));
            }
        }
        pairs
    }

    pub fn to_query_string(&self) -> Result<String, ToolError> {
        serde_urlencoded::to_string(self.to_query_pairs())
            .map_err(|err| ToolError::internal(format!("Failed to encode filters: {}", err)))
    }
}

/// Rejects the first field that is not a `display_id` in `fields`. Values are
/// not inspected.
pub fn validate_filters(filters: &FilterExpression, fields: &[EventField]) -> Result<(), ToolError> {
    for field in filters.fields() {
        if fields.iter().any(|known| known.display_id == field) {
            continue;
        }
        let known: Vec<&str> = fields.iter().map(|f| f.display_id.as_str()).collect();
        let mut err = ToolError::invalid_params(format!("Invalid filter key: {}", field))
            .with_details(serde_json::json!({ "field": field }));
        err.code = "INVALID_FILTER_FIELD".to_string();
        let suggestions = closest_matches(field, &known, 3);
        if !suggestions.is_empty() {
            err = err.with_hint(format!("Did you mean: {}", suggestions.join(", ")));
        }
        return Err(err);
    }
    Ok(())
}
