//! Attribute-keyed filters for "last matching row" lookups.

use sea_orm::{ColumnTrait, Condition};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::conditions::predicate;
use super::operator::FilterOperator;
use crate::core::FieldTable;
use crate::errors::CrudError;

/// Operator and operand for one attribute in a [`NamedFilters`] map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NamedFilter {
    pub operator: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub value: JsonValue,
}

impl NamedFilter {
    pub fn new(operator: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self {
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Attribute name → filter. Keyed, so each attribute appears at most once.
pub type NamedFilters = BTreeMap<String, NamedFilter>;

/// Compose named filters into one AND condition.
///
/// Only `> < >= <= == != like is_null` are recognised. An entry with any other operator is
/// skipped with a warning rather than rejected. `like` matches the value anywhere in the
/// column (`%value%`).
///
/// # Errors
///
/// `UnknownField` for an attribute the resource does not have, `InvalidFilterValue` for an
/// operand that does not fit its operator.
pub fn compose_named<C>(fields: &FieldTable<C>, filters: &NamedFilters) -> Result<Condition, CrudError>
where
    C: ColumnTrait + Copy,
{
    let mut condition = Condition::all();
    for (field, filter) in filters {
        let column = fields.resolve(field)?;
        let Some(operator) = FilterOperator::from_named_symbol(&filter.operator) else {
            tracing::warn!(
                resource = fields.resource(),
                field = %field,
                operator = %filter.operator,
                "Skipping filter with unrecognised operator"
            );
            continue;
        };
        let value = match operator {
            FilterOperator::Like => JsonValue::String(format!("%{}%", scalar_text(&filter.value))),
            _ => filter.value.clone(),
        };
        condition = condition.add(predicate(column, field, operator, &value)?);
    }
    tracing::debug!(resource = fields.resource(), ?condition, "Composed named filters");
    Ok(condition)
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
