//! Filter specifications resolved against a field table and folded into one `Condition`.

use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, Value};
use serde_json::Value as JsonValue;

use super::FilterSpec;
use super::operator::{FilterOperator, PredicateBuilder};
use crate::core::FieldTable;
use crate::errors::CrudError;

/// A builder paired with its coerced operand.
enum Bound {
    Compare(fn(Expr, Value) -> SimpleExpr, Value),
    Pattern(fn(Expr, String) -> SimpleExpr, String),
    Set(fn(Expr, Vec<Value>) -> SimpleExpr, Vec<Value>),
    Unary(fn(Expr) -> SimpleExpr),
}

impl Bound {
    fn build<C: ColumnTrait>(self, column: C) -> SimpleExpr {
        let column = Expr::col(column);
        match self {
            Self::Compare(f, value) => f(column, value),
            Self::Pattern(f, pattern) => f(column, pattern),
            Self::Set(f, values) => f(column, values),
            Self::Unary(f) => f(column),
        }
    }
}

/// Compose a filter set into one AND condition.
///
/// Every spec is resolved first; nothing is built unless the whole set is valid. An empty
/// set yields an empty condition, which matches every row.
///
/// # Errors
///
/// `UnknownField`, `UnsupportedOperator` or `InvalidFilterValue` for the first spec that
/// fails to resolve.
pub fn compose<C>(fields: &FieldTable<C>, filters: &[FilterSpec]) -> Result<Condition, CrudError>
where
    C: ColumnTrait + Copy,
{
    let resolved = filters
        .iter()
        .map(|spec| resolve(fields, spec))
        .collect::<Result<Vec<_>, _>>()?;

    let condition = resolved
        .into_iter()
        .fold(Condition::all(), |condition, (column, bound)| {
            condition.add(bound.build(column))
        });
    tracing::debug!(resource = fields.resource(), ?condition, "Composed filter condition");
    Ok(condition)
}

/// Single predicate for `column <operator> value`. `field` is only used in errors.
///
/// # Errors
///
/// `InvalidFilterValue` if `value` does not fit the operator.
pub fn predicate<C>(
    column: C,
    field: &str,
    operator: FilterOperator,
    value: &JsonValue,
) -> Result<SimpleExpr, CrudError>
where
    C: ColumnTrait + Copy,
{
    Ok(bind(field, operator, value)?.build(column))
}

fn resolve<C>(fields: &FieldTable<C>, spec: &FilterSpec) -> Result<(C, Bound), CrudError>
where
    C: ColumnTrait + Copy,
{
    let column = fields.resolve(&spec.field)?;
    let operator: FilterOperator = spec.operator.parse()?;
    Ok((column, bind(&spec.field, operator, &spec.value)?))
}

fn bind(field: &str, operator: FilterOperator, value: &JsonValue) -> Result<Bound, CrudError> {
    match operator.builder() {
        PredicateBuilder::Compare(f) => {
            if value.is_null() {
                return Err(CrudError::invalid_value(
                    field,
                    "null cannot be compared, use is_null",
                ));
            }
            to_value(field, value).map(|value| Bound::Compare(f, value))
        }
        PredicateBuilder::Pattern(f) => match value {
            JsonValue::String(pattern) => Ok(Bound::Pattern(f, pattern.clone())),
            _ => Err(CrudError::invalid_value(field, "pattern must be a string")),
        },
        PredicateBuilder::Set(f) => match value {
            JsonValue::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_array() || item.is_null() {
                        Err(CrudError::invalid_value(
                            field,
                            "list items must be scalars",
                        ))
                    } else {
                        to_value(field, item)
                    }
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|values| Bound::Set(f, values)),
            _ => Err(CrudError::invalid_value(field, "expected a list of values")),
        },
        PredicateBuilder::Unary(f) => Ok(Bound::Unary(f)),
    }
}

/// Convert a JSON scalar into a bindable store value.
///
/// # Errors
///
/// `InvalidFilterValue` for objects and arrays.
pub fn to_value(field: &str, value: &JsonValue) -> Result<Value, CrudError> {
    match value {
        JsonValue::Null => Ok(Value::String(None)),
        JsonValue::Bool(b) => Ok(Value::from(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::from(f))
            } else {
                Err(CrudError::invalid_value(field, "number out of range"))
            }
        }
        JsonValue::String(s) => Ok(Value::from(s.clone())),
        JsonValue::Array(_) => Err(CrudError::invalid_value(
            field,
            "a list is only valid with in/notin",
        )),
        JsonValue::Object(_) => Err(CrudError::invalid_value(field, "objects are not supported")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::car;
    use sea_orm::{DbBackend, EntityTrait, QueryFilter, QueryTrait};
    use serde_json::json;

    fn fields() -> FieldTable<car::Column> {
        FieldTable::from_entity_columns("car")
    }

    fn sql(filters: &[FilterSpec]) -> String {
        let condition = compose(&fields(), filters).unwrap();
        car::Entity::find()
            .filter(condition)
            .build(DbBackend::Sqlite)
            .to_string()
    }

    #[test]
    fn test_predicates_are_anded_in_input_order() {
        let sql = sql(&[
            FilterSpec::new("year", ">=", 2015),
            FilterSpec::new("model", "like", "Civ%"),
        ]);
        assert!(
            sql.ends_with(r#"WHERE "cars"."year" >= 2015 AND "cars"."model" LIKE 'Civ%'"#)
                || sql.ends_with(r#"WHERE "year" >= 2015 AND "model" LIKE 'Civ%'"#),
            "{sql}"
        );
    }

    #[test]
    fn test_ilike_uppercases_both_sides() {
        let sql = sql(&[FilterSpec::new("model", "ilike", "%civic%")]);
        assert!(sql.contains(r#"UPPER("#), "{sql}");
        assert!(sql.contains("LIKE UPPER('%civic%')"), "{sql}");
    }

    #[test]
    fn test_set_operators() {
        let sql = sql(&[
            FilterSpec::new("year", "in", json!([2019, 2020])),
            FilterSpec::new("id", "notin", json!([1])),
        ]);
        assert!(sql.contains("IN (2019, 2020)"), "{sql}");
        assert!(sql.contains("NOT IN (1)"), "{sql}");
    }

    #[test]
    fn test_is_null_ignores_value() {
        let sql = sql(&[FilterSpec::new("model", "is_null", "anything")]);
        assert!(sql.contains("IS NULL"), "{sql}");
    }

    #[test]
    fn test_empty_set_matches_everything() {
        let sql = sql(&[]);
        assert!(
            sql.ends_with(r#"FROM "cars""#) || sql.ends_with("WHERE TRUE"),
            "{sql}"
        );
    }

    #[test]
    fn test_unknown_field_fails_whole_set() {
        let err = compose(
            &fields(),
            &[FilterSpec::eq("year", 2020), FilterSpec::eq("colour", "red")],
        )
        .unwrap_err();
        assert!(matches!(err, CrudError::UnknownField { ref field, .. } if field == "colour"));
    }

    #[test]
    fn test_unsupported_operator() {
        let err = compose(&fields(), &[FilterSpec::new("year", "between", json!([1, 2]))])
            .unwrap_err();
        assert!(matches!(err, CrudError::UnsupportedOperator(ref op) if op == "between"));
    }

    #[test]
    fn test_invalid_values() {
        for spec in [
            FilterSpec::new("year", "in", 2020),
            FilterSpec::new("year", "=", serde_json::Value::Null),
            FilterSpec::new("model", "like", 5),
            FilterSpec::new("year", ">", json!({"a": 1})),
            FilterSpec::new("year", "in", json!([[1]])),
        ] {
            let err = compose(&fields(), &[spec.clone()]).unwrap_err();
            assert!(
                matches!(err, CrudError::InvalidFilterValue { .. }),
                "{spec:?} gave {err:?}"
            );
        }
    }
}
