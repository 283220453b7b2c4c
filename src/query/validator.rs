//! Semantic validation: every filter's value type must suit its field.

use crate::query::parser::{Field, QueryNode, ValueType};
use serde::Serialize;
use thiserror::Error;

/// Field/value-type mismatch
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error(
    "field '{field}' must use {} value, not {actual}",
    join_value_types(.allowed)
)]
pub struct ValidationError {
    pub field: Field,
    pub allowed: &'static [ValueType],
    pub actual: ValueType,
}

/// Value types accepted by each field
pub fn allowed_value_types(field: Field) -> &'static [ValueType] {
    match field {
        Field::Since | Field::Until => &[ValueType::Date, ValueType::RelativeDate],
        Field::Amount => &[ValueType::Range],
        Field::Status
        | Field::Category
        | Field::Description
        | Field::Account
        | Field::Type => &[ValueType::Pattern],
        Field::Credit | Field::Debit => &[ValueType::Boolean],
    }
}

/// Check the whole tree, returning the first violation depth-first
pub fn validate(node: &QueryNode) -> Result<(), ValidationError> {
    match node {
        QueryNode::Filter(filter) => {
            let allowed = allowed_value_types(filter.field);
            if allowed.contains(&filter.value_type) {
                Ok(())
            } else {
                Err(ValidationError {
                    field: filter.field,
                    allowed,
                    actual: filter.value_type,
                })
            }
        }
        QueryNode::BinaryOp(op) => {
            validate(&op.left)?;
            validate(&op.right)
        }
    }
}

/// "a", "a or b", "a, b or c"
fn join_value_types(types: &[ValueType]) -> String {
    match types {
        [] => String::new(),
        [only] => only.to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(|t| t.as_str()).collect();
            format!("{} or {}", head.join(", "), last)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::lexer::tokenize;
    use crate::query::parser::parse_tokens;

    fn parse(input: &str) -> QueryNode {
        let tokens = tokenize(input).into_result().unwrap();
        parse_tokens(&tokens).unwrap().unwrap()
    }

    #[test]
    fn test_valid_queries() {
        let queries = [
            "since:7d until:2024-12-31",
            "amount:10..100",
            "status:held category:*food* description:\"x\" account:abc type:transfer",
            "credit:true OR debit:false",
        ];
        for query in queries {
            assert_eq!(validate(&parse(query)), Ok(()), "{query}");
        }
    }

    #[test]
    fn test_amount_rejects_pattern() {
        let err = validate(&parse("amount:pending")).unwrap_err();
        assert_eq!(err.field, Field::Amount);
        assert_eq!(err.actual, ValueType::Pattern);
        assert_eq!(
            err.to_string(),
            "field 'amount' must use range value, not pattern"
        );
    }

    #[test]
    fn test_date_fields_list_both_types() {
        let err = validate(&parse("since:yesterday")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field 'since' must use date or relativeDate value, not pattern"
        );
    }

    #[test]
    fn test_boolean_fields() {
        let err = validate(&parse("credit:yes")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "field 'credit' must use boolean value, not pattern"
        );
        let err = validate(&parse("description:true")).unwrap_err();
        assert_eq!(err.actual, ValueType::Boolean);
    }

    #[test]
    fn test_first_violation_wins() {
        let err = validate(&parse("status:held (amount:abc OR since:50) credit:1")).unwrap_err();
        assert_eq!(err.field, Field::Amount);
    }

    #[test]
    fn test_nested_violation_under_negation() {
        let err = validate(&parse("status:held !(debit:true OR until:xyz)")).unwrap_err();
        assert_eq!(err.field, Field::Until);
    }

    #[test]
    fn test_revalidation_is_stable() {
        let node = parse("amount:pending");
        assert_eq!(validate(&node), validate(&node));
        let node = parse("amount:5");
        assert_eq!(validate(&node), validate(&node));
    }

    #[test]
    fn test_join_value_types() {
        assert_eq!(join_value_types(&[ValueType::Range]), "range");
        assert_eq!(
            join_value_types(&[ValueType::Date, ValueType::RelativeDate]),
            "date or relativeDate"
        );
        assert_eq!(
            join_value_types(&[ValueType::Date, ValueType::Range, ValueType::Boolean]),
            "date, range or boolean"
        );
    }
}
