use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Scalar bound into a parameterized query. Collected by the filter
/// builder and the repositories, bound positionally by the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::UInt(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => SqlValue::Null,
        }
    }
}

impl From<&Value> for SqlValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    SqlValue::UInt(u)
                } else {
                    SqlValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => SqlValue::Text(s.clone()),
            // Composite JSON has no scalar binding, serialize as text
            other => SqlValue::Text(other.to_string()),
        }
    }
}

/// Query parameters as accepted by the registry: nothing, a bare scalar
/// (wrapped into a one-element list) or an explicit list.
#[derive(Debug, Clone, Default)]
pub enum Params {
    #[default]
    None,
    One(SqlValue),
    Many(Vec<SqlValue>),
}

impl Params {
    pub fn into_vec(self) -> Vec<SqlValue> {
        match self {
            Params::None => vec![],
            Params::One(v) => vec![v],
            Params::Many(vs) => vs,
        }
    }
}

impl From<()> for Params {
    fn from(_: ()) -> Self {
        Params::None
    }
}

impl From<SqlValue> for Params {
    fn from(v: SqlValue) -> Self {
        Params::One(v)
    }
}

impl From<i64> for Params {
    fn from(v: i64) -> Self {
        Params::One(v.into())
    }
}

impl From<&str> for Params {
    fn from(v: &str) -> Self {
        Params::One(v.into())
    }
}

impl From<String> for Params {
    fn from(v: String) -> Self {
        Params::One(v.into())
    }
}

impl From<Vec<SqlValue>> for Params {
    fn from(vs: Vec<SqlValue>) -> Self {
        Params::Many(vs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_scalar_is_wrapped() {
        let params: Params = 123i64.into();
        assert_eq!(params.into_vec(), vec![SqlValue::Int(123)]);
    }

    #[test]
    fn missing_params_default_to_empty() {
        let params: Params = ().into();
        assert!(params.into_vec().is_empty());
    }

    #[test]
    fn json_values_map_to_scalars() {
        assert_eq!(SqlValue::from(&json!("abc")), SqlValue::Text("abc".into()));
        assert_eq!(SqlValue::from(&json!(7)), SqlValue::Int(7));
        assert_eq!(SqlValue::from(&json!(true)), SqlValue::Bool(true));
        assert_eq!(SqlValue::from(&json!(null)), SqlValue::Null);
    }
}
