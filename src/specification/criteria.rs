//! Serializable filter criteria.
//!
//! A small tagged union of comparisons over serialized column names. Unlike an
//! opaque predicate it can be inspected, logged and lowered to a query builder.
//! Column paths may be dotted (`dimensions.width`) to reach nested objects of
//! the serialized row. Navigation properties are not part of that row and
//! cannot be reached from criteria; filter on their foreign key instead.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, AppResult};

/// Filter criteria evaluated against an entity's JSON projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Criteria {
    Eq { column: String, value: Value },
    Ne { column: String, value: Value },
    Gt { column: String, value: Value },
    Ge { column: String, value: Value },
    Lt { column: String, value: Value },
    Le { column: String, value: Value },
    /// Case-insensitive substring match on string columns
    Contains { column: String, value: String },
    IsNull { column: String },
    In { column: String, values: Vec<Value> },
    And { all: Vec<Criteria> },
    Or { any: Vec<Criteria> },
    Not { inner: Box<Criteria> },
    /// A comparison value that failed to serialize; matching it is an error
    Invalid { column: String, reason: String },
}

/// Build a comparison, or `Invalid` when `value` cannot be serialized.
fn compared(
    column: impl Into<String>,
    value: impl Serialize,
    build: impl FnOnce(String, Value) -> Criteria,
) -> Criteria {
    let column = column.into();
    match serde_json::to_value(value) {
        Ok(value) => build(column, value),
        Err(err) => Criteria::Invalid {
            column,
            reason: err.to_string(),
        },
    }
}

impl Criteria {
    pub fn eq(column: impl Into<String>, value: impl Serialize) -> Self {
        compared(column, value, |column, value| Criteria::Eq { column, value })
    }

    pub fn ne(column: impl Into<String>, value: impl Serialize) -> Self {
        compared(column, value, |column, value| Criteria::Ne { column, value })
    }

    pub fn gt(column: impl Into<String>, value: impl Serialize) -> Self {
        compared(column, value, |column, value| Criteria::Gt { column, value })
    }

    pub fn ge(column: impl Into<String>, value: impl Serialize) -> Self {
        compared(column, value, |column, value| Criteria::Ge { column, value })
    }

    pub fn lt(column: impl Into<String>, value: impl Serialize) -> Self {
        compared(column, value, |column, value| Criteria::Lt { column, value })
    }

    pub fn le(column: impl Into<String>, value: impl Serialize) -> Self {
        compared(column, value, |column, value| Criteria::Le { column, value })
    }

    pub fn contains(column: impl Into<String>, value: impl Into<String>) -> Self {
        Criteria::Contains {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Criteria::IsNull {
            column: column.into(),
        }
    }

    pub fn is_in<V: Serialize>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let column = column.into();
        match values
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(values) => Criteria::In { column, values },
            Err(err) => Criteria::Invalid {
                column,
                reason: err.to_string(),
            },
        }
    }

    pub fn and(self, other: Criteria) -> Self {
        match self {
            Criteria::And { mut all } => {
                all.push(other);
                Criteria::And { all }
            }
            first => Criteria::And {
                all: vec![first, other],
            },
        }
    }

    pub fn or(self, other: Criteria) -> Self {
        match self {
            Criteria::Or { mut any } => {
                any.push(other);
                Criteria::Or { any }
            }
            first => Criteria::Or {
                any: vec![first, other],
            },
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Criteria::Not {
            inner: Box::new(self),
        }
    }

    /// Evaluate against a serialized row. Missing columns read as `null`.
    ///
    /// Fails with `Validation` when the criteria carry an `Invalid` value.
    pub fn matches(&self, row: &Value) -> AppResult<bool> {
        Ok(match self {
            Criteria::Eq { column, value } => lookup(row, column) == value,
            Criteria::Ne { column, value } => lookup(row, column) != value,
            Criteria::Gt { column, value } => {
                compare(lookup(row, column), value) == Some(Ordering::Greater)
            }
            Criteria::Ge { column, value } => matches!(
                compare(lookup(row, column), value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Criteria::Lt { column, value } => {
                compare(lookup(row, column), value) == Some(Ordering::Less)
            }
            Criteria::Le { column, value } => matches!(
                compare(lookup(row, column), value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Criteria::Contains { column, value } => lookup(row, column)
                .as_str()
                .is_some_and(|s| s.to_lowercase().contains(&value.to_lowercase())),
            Criteria::IsNull { column } => lookup(row, column).is_null(),
            Criteria::In { column, values } => {
                let actual = lookup(row, column);
                values.iter().any(|v| v == actual)
            }
            Criteria::And { all } => {
                for criteria in all {
                    if !criteria.matches(row)? {
                        return Ok(false);
                    }
                }
                true
            }
            Criteria::Or { any } => {
                for criteria in any {
                    if criteria.matches(row)? {
                        return Ok(true);
                    }
                }
                false
            }
            Criteria::Not { inner } => !inner.matches(row)?,
            Criteria::Invalid { column, reason } => {
                return Err(AppError::validation(format!(
                    "criteria on `{column}` has an unusable value: {reason}"
                )))
            }
        })
    }
}

static NULL: Value = Value::Null;

fn lookup<'a>(row: &'a Value, path: &str) -> &'a Value {
    path.split('.')
        .try_fold(row, |current, segment| current.get(segment))
        .unwrap_or(&NULL)
}

/// Ordering between two scalar JSON values of the same kind.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
