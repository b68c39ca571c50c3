//! # Filter Predicate Engine
//!
//! Turns declarative filter specifications into a `sea_orm::Condition`.
//!
//! A [`FilterSet`] is an ordered list of [`FilterSpec`]s joined with AND. Every spec is
//! resolved (field, operator and value) before any predicate is built, so a bad spec fails
//! the whole set without touching the store.
//!
//! ```json
//! [
//!   {"field": "year", "operator": ">=", "value": 2015},
//!   {"field": "model", "operator": "ilike", "value": "%civic%"},
//!   {"field": "year", "operator": "in", "value": [2019, 2020, 2021]}
//! ]
//! ```
//!
//! [`NamedFilters`] is the looser map form used by "last matching row" lookups.

mod conditions;
mod named;
mod operator;

pub use conditions::{compose, predicate, to_value};
pub use named::{NamedFilter, NamedFilters, compose_named};
pub use operator::{FilterOperator, PredicateBuilder};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_operator() -> String {
    "=".to_string()
}

/// One `{field, operator, value}` triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FilterSpec {
    /// Attribute name of the bound resource.
    pub field: String,
    /// Operator symbol, `=` when omitted.
    #[serde(default = "default_operator")]
    pub operator: String,
    /// Operand; `null` when omitted (only meaningful for `is_null`).
    #[serde(default)]
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

impl FilterSpec {
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::new(field, "=", value)
    }
}

/// Filter specifications composed with logical AND, in order.
pub type FilterSet = Vec<FilterSpec>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_and_value_defaults() {
        let spec: FilterSpec = serde_json::from_value(json!({"field": "year"})).unwrap();
        assert_eq!(spec.operator, "=");
        assert!(spec.value.is_null());
    }

    #[test]
    fn test_filter_set_from_json() {
        let set: FilterSet = serde_json::from_value(json!([
            {"field": "year", "operator": ">=", "value": 2015},
            {"field": "model", "value": "Civic"}
        ]))
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set[1], FilterSpec::eq("model", "Civic"));
    }
}
