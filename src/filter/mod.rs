//! Declarative per-route filter definitions combined into a WHERE
//! clause with bound parameters. Clause fragments are route-author
//! literals; only values are bound.

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

use crate::database::SqlValue;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid value for filter '{filter}': {detail}")]
    InvalidValue { filter: String, detail: String },
}

impl From<FilterError> for crate::error::ApiError {
    fn from(err: FilterError) -> Self {
        crate::error::ApiError::validation_error("Filtros inválidos.", err.to_string())
    }
}

/// Transforms the raw received value into the bound parameter(s).
/// A multi-element result is spread, in order, into the parameter list.
pub type ValueFn = fn(&Value) -> Result<Vec<SqlValue>, String>;

#[derive(Clone)]
pub struct FilterDef {
    /// SQL fragment with `?` placeholders, e.g. `"status = ?"`.
    pub clause: &'static str,
    pub value: Option<ValueFn>,
}

/// Ordered map of filter name to definition, declared per route.
#[derive(Clone, Default)]
pub struct FilterSet {
    defs: Vec<(&'static str, FilterDef)>,
}

/// Fixed condition appended after all received filters, used for
/// officer scoping not exposed to the client.
pub struct Suffix {
    pub clause: String,
    pub params: Vec<SqlValue>,
}

/// Result of building: empty `where_clause` when nothing applied,
/// otherwise `"WHERE a AND b …"`.
#[derive(Debug, Default)]
pub struct BuiltFilter {
    pub where_clause: String,
    pub params: Vec<SqlValue>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, clause: &'static str) -> Self {
        self.defs.push((name, FilterDef { clause, value: None }));
        self
    }

    pub fn with_transform(
        mut self,
        name: &'static str,
        clause: &'static str,
        value: ValueFn,
    ) -> Self {
        self.defs.push((name, FilterDef { clause, value: Some(value) }));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    fn def(&self, name: &str) -> Option<&FilterDef> {
        self.defs.iter().find(|(n, _)| *n == name).map(|(_, d)| d)
    }

    /// Combine the filters actually received with this route's
    /// definitions. Unknown filter names are dropped silently;
    /// recognized ones keep their received order; the suffix, when
    /// present, is always the last clause.
    pub fn build(
        &self,
        received: &[(String, Value)],
        suffix: Option<Suffix>,
    ) -> Result<BuiltFilter, FilterError> {
        let mut clauses: Vec<String> = vec![];
        let mut params: Vec<SqlValue> = vec![];

        for (name, raw) in received {
            let Some(def) = self.def(name) else { continue };
            clauses.push(def.clause.to_string());
            match def.value {
                Some(transform) => {
                    let values = transform(raw).map_err(|detail| FilterError::InvalidValue {
                        filter: name.clone(),
                        detail,
                    })?;
                    params.extend(values);
                }
                None => params.push(SqlValue::from(raw)),
            }
        }

        if let Some(suffix) = suffix {
            clauses.push(suffix.clause);
            params.extend(suffix.params);
        }

        if clauses.is_empty() {
            return Ok(BuiltFilter::default());
        }

        Ok(BuiltFilter {
            where_clause: format!("WHERE {}", clauses.join(" AND ")),
            params,
        })
    }
}

/// `"YYYY-MM-DD"` → unix seconds at midnight UTC.
pub fn date_to_unix(raw: &Value) -> Result<Vec<SqlValue>, String> {
    let text = raw.as_str().ok_or_else(|| "expected a date string".to_string())?;
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}': {}", text, e))?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| "invalid date".to_string())?;
    Ok(vec![SqlValue::Int(midnight.and_utc().timestamp())])
}

/// `"YYYY-MM-DD"` → midnight DATETIME, for comparisons against
/// DATETIME columns.
pub fn date_to_datetime(raw: &Value) -> Result<Vec<SqlValue>, String> {
    let text = raw.as_str().ok_or_else(|| "expected a date string".to_string())?;
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}': {}", text, e))?;
    let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| "invalid date".to_string())?;
    Ok(vec![SqlValue::DateTime(midnight)])
}

/// Truthy option ("true"/"1") → 1, anything else → 0.
pub fn option_flag(raw: &Value) -> Result<Vec<SqlValue>, String> {
    let truthy = match raw {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64() == Some(1),
        Value::String(s) => s == "true" || s == "1",
        _ => false,
    };
    Ok(vec![SqlValue::Int(truthy as i64)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set() -> FilterSet {
        FilterSet::new()
            .with("status", "status = ?")
            .with("search", "name LIKE ?")
            .with_transform("after", "created >= ?", date_to_unix)
    }

    fn received(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs.iter().map(|(n, v)| (n.to_string(), v.clone())).collect()
    }

    #[test]
    fn unknown_filter_names_are_dropped() {
        let built = set()
            .build(&received(&[("bogus", json!("x")), ("status", json!(1))]), None)
            .unwrap();
        assert_eq!(built.where_clause, "WHERE status = ?");
        assert_eq!(built.params, vec![SqlValue::Int(1)]);
    }

    #[test]
    fn recognized_filters_keep_received_order() {
        let built = set()
            .build(&received(&[("search", json!("silva")), ("status", json!(1))]), None)
            .unwrap();
        assert_eq!(built.where_clause, "WHERE name LIKE ? AND status = ?");
        assert_eq!(
            built.params,
            vec![SqlValue::Text("silva".into()), SqlValue::Int(1)]
        );
    }

    #[test]
    fn suffix_clause_is_appended_last() {
        let suffix = Suffix {
            clause: "officer = ?".to_string(),
            params: vec![SqlValue::Int(111222333)],
        };
        let built = set()
            .build(&received(&[("status", json!(1))]), Some(suffix))
            .unwrap();
        assert_eq!(built.where_clause, "WHERE status = ? AND officer = ?");
        assert_eq!(built.params, vec![SqlValue::Int(1), SqlValue::Int(111222333)]);
    }

    #[test]
    fn no_applicable_filters_yield_empty_clause() {
        let built = set().build(&received(&[("bogus", json!("x"))]), None).unwrap();
        assert_eq!(built.where_clause, "");
        assert!(built.params.is_empty());
    }

    #[test]
    fn transform_values_are_spread_in_order() {
        fn range(_raw: &Value) -> Result<Vec<SqlValue>, String> {
            Ok(vec![SqlValue::Int(10), SqlValue::Int(20)])
        }
        let set = FilterSet::new().with_transform("window", "start >= ? AND end <= ?", range);
        let built = set.build(&received(&[("window", json!("ignored"))]), None).unwrap();
        assert_eq!(built.params, vec![SqlValue::Int(10), SqlValue::Int(20)]);
    }

    #[test]
    fn untransformed_filter_binds_raw_value() {
        let built = set()
            .build(&received(&[("search", json!("%mar%"))]), None)
            .unwrap();
        assert_eq!(built.params, vec![SqlValue::Text("%mar%".into())]);
    }

    #[test]
    fn date_transform_produces_unix_seconds() {
        let built = set()
            .build(&received(&[("after", json!("2024-03-01"))]), None)
            .unwrap();
        assert_eq!(built.params, vec![SqlValue::Int(1709251200)]);
    }

    #[test]
    fn bad_date_is_a_filter_error() {
        let err = set()
            .build(&received(&[("after", json!("not-a-date"))]), None)
            .unwrap_err();
        assert!(matches!(err, FilterError::InvalidValue { filter, .. } if filter == "after"));
    }
}
