//! Operator dispatch table.
//!
//! Every supported operator is a [`FilterOperator`] variant, and [`FilterOperator::builder`]
//! maps each one to the function that builds its predicate. The `match` is exhaustive, so a
//! new variant does not compile until it has a builder.

use sea_orm::sea_query::{BinOper, Expr, Func, SimpleExpr};
use sea_orm::Value;
use std::fmt;
use std::str::FromStr;

use crate::errors::CrudError;

/// Comparison operators accepted in filter specifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// Equality (=)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// LIKE pattern matching, pattern used verbatim
    Like,
    /// Case-insensitive LIKE
    ILike,
    /// IN (array of values)
    In,
    /// NOT IN (array of values)
    NotIn,
    /// IS NULL, takes no value
    IsNull,
}

/// How a predicate is built from a column and the filter value.
#[derive(Clone, Copy)]
pub enum PredicateBuilder {
    /// Binary comparison against one scalar.
    Compare(fn(Expr, Value) -> SimpleExpr),
    /// Pattern match against a string.
    Pattern(fn(Expr, String) -> SimpleExpr),
    /// Membership test against a list of scalars.
    Set(fn(Expr, Vec<Value>) -> SimpleExpr),
    /// Unary test; the filter value is ignored.
    Unary(fn(Expr) -> SimpleExpr),
}

impl fmt::Debug for PredicateBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Compare(_) => "Compare",
            Self::Pattern(_) => "Pattern",
            Self::Set(_) => "Set",
            Self::Unary(_) => "Unary",
        };
        f.write_str(kind)
    }
}

fn eq(column: Expr, value: Value) -> SimpleExpr {
    column.eq(value)
}

fn ne(column: Expr, value: Value) -> SimpleExpr {
    column.ne(value)
}

fn lt(column: Expr, value: Value) -> SimpleExpr {
    column.lt(value)
}

fn lte(column: Expr, value: Value) -> SimpleExpr {
    column.lte(value)
}

fn gt(column: Expr, value: Value) -> SimpleExpr {
    column.gt(value)
}

fn gte(column: Expr, value: Value) -> SimpleExpr {
    column.gte(value)
}

fn like(column: Expr, pattern: String) -> SimpleExpr {
    column.like(pattern)
}

// UPPER() on both sides instead of ILIKE, which only Postgres has. Both sides are folded by
// the store so they agree on which characters have a case.
fn ilike(column: Expr, pattern: String) -> SimpleExpr {
    Expr::expr(Func::upper(column)).binary(BinOper::Like, Func::upper(Expr::val(pattern)))
}

fn is_in(column: Expr, values: Vec<Value>) -> SimpleExpr {
    column.is_in(values)
}

fn is_not_in(column: Expr, values: Vec<Value>) -> SimpleExpr {
    column.is_not_in(values)
}

fn is_null(column: Expr) -> SimpleExpr {
    column.is_null()
}

impl FilterOperator {
    pub const ALL: [Self; 11] = [
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::Like,
        Self::ILike,
        Self::In,
        Self::NotIn,
        Self::IsNull,
    ];

    /// The predicate builder for this operator.
    #[must_use]
    pub const fn builder(self) -> PredicateBuilder {
        match self {
            Self::Eq => PredicateBuilder::Compare(eq),
            Self::Ne => PredicateBuilder::Compare(ne),
            Self::Lt => PredicateBuilder::Compare(lt),
            Self::Lte => PredicateBuilder::Compare(lte),
            Self::Gt => PredicateBuilder::Compare(gt),
            Self::Gte => PredicateBuilder::Compare(gte),
            Self::Like => PredicateBuilder::Pattern(like),
            Self::ILike => PredicateBuilder::Pattern(ilike),
            Self::In => PredicateBuilder::Set(is_in),
            Self::NotIn => PredicateBuilder::Set(is_not_in),
            Self::IsNull => PredicateBuilder::Unary(is_null),
        }
    }

    /// Canonical symbol, as accepted by [`FromStr`].
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::IsNull => "is_null",
        }
    }

    /// The smaller operator set of "last by filters" lookups. Anything else is `None`.
    #[must_use]
    pub fn from_named_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Gte),
            "<=" => Some(Self::Lte),
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "like" => Some(Self::Like),
            "is_null" => Some(Self::IsNull),
            _ => None,
        }
    }
}

impl FromStr for FilterOperator {
    type Err = CrudError;

    fn from_str(symbol: &str) -> Result<Self, Self::Err> {
        match symbol.trim().to_ascii_lowercase().as_str() {
            "=" | "==" | "eq" => Ok(Self::Eq),
            "!=" | "<>" | "ne" | "neq" => Ok(Self::Ne),
            "<" | "lt" => Ok(Self::Lt),
            "<=" | "lte" => Ok(Self::Lte),
            ">" | "gt" => Ok(Self::Gt),
            ">=" | "gte" => Ok(Self::Gte),
            "like" => Ok(Self::Like),
            "ilike" => Ok(Self::ILike),
            "in" => Ok(Self::In),
            "notin" | "not_in" => Ok(Self::NotIn),
            "is_null" | "isnull" => Ok(Self::IsNull),
            _ => Err(CrudError::UnsupportedOperator(symbol.to_string())),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbols_parse_back() {
        for operator in FilterOperator::ALL {
            assert_eq!(operator.symbol().parse::<FilterOperator>().unwrap(), operator);
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("==".parse::<FilterOperator>().unwrap(), FilterOperator::Eq);
        assert_eq!("<>".parse::<FilterOperator>().unwrap(), FilterOperator::Ne);
        assert_eq!("NOT_IN".parse::<FilterOperator>().unwrap(), FilterOperator::NotIn);
        assert_eq!(" ILIKE ".parse::<FilterOperator>().unwrap(), FilterOperator::ILike);
    }

    #[test]
    fn test_unknown_operator_names_the_operator() {
        let err = "between".parse::<FilterOperator>().unwrap_err();
        match err {
            CrudError::UnsupportedOperator(op) => assert_eq!(op, "between"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_builder_kinds() {
        assert!(matches!(FilterOperator::Gte.builder(), PredicateBuilder::Compare(_)));
        assert!(matches!(FilterOperator::ILike.builder(), PredicateBuilder::Pattern(_)));
        assert!(matches!(FilterOperator::NotIn.builder(), PredicateBuilder::Set(_)));
        assert!(matches!(FilterOperator::IsNull.builder(), PredicateBuilder::Unary(_)));
    }

    #[test]
    fn test_named_symbols_are_a_closed_set() {
        assert_eq!(FilterOperator::from_named_symbol("=="), Some(FilterOperator::Eq));
        assert_eq!(FilterOperator::from_named_symbol("is_null"), Some(FilterOperator::IsNull));
        assert_eq!(FilterOperator::from_named_symbol("="), None);
        assert_eq!(FilterOperator::from_named_symbol("in"), None);
    }
}
