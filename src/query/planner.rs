use crate::query::dates::resolve_date;
use crate::query::parser::{BinaryOperator, Field, FilterNode, QueryNode, ValueType};
use crate::transaction::TransactionRecord;
use chrono::{DateTime, Utc};
use regex::Regex;

/// A query compiled against a fixed reference instant.
///
/// Dates are resolved, patterns compiled and numbers parsed once here so
/// that evaluating each record does no parsing.
#[derive(Debug)]
pub struct QueryPlan {
    root: PlanNode,
}

#[derive(Debug)]
enum PlanNode {
    Filter {
        test: FilterTest,
        negated: bool,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<PlanNode>,
        right: Box<PlanNode>,
        negated: bool,
    },
}

/// Field-specific test for one filter
#[derive(Debug)]
pub enum FilterTest {
    Since(DateTime<Utc>),
    Until(DateTime<Utc>),
    /// Uppercased status code
    Status(String),
    Category(TextPattern),
    Amount(AmountTest),
    Description(TextPattern),
    Account(TextPattern),
    TransactionType(TextPattern),
    Credit(bool),
    Debit(bool),
    /// Vacuously true (unusable date or boolean value)
    Always,
    /// Fail closed (unusable amount expression)
    Never,
}

/// Comparison on the absolute transaction amount
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmountTest {
    Exact(f64),
    Between(f64, f64),
    Greater(f64),
    GreaterOrEqual(f64),
    Less(f64),
    LessOrEqual(f64),
    NotEqual(f64),
}

impl AmountTest {
    /// Parse `N`, `A..B`, or `N` prefixed with `>`, `>=`, `<`, `<=`, `!=`
    pub fn parse(expr: &str) -> Option<Self> {
        fn number(s: &str) -> Option<f64> {
            s.parse::<f64>().ok().filter(|n| n.is_finite())
        }

        const PREFIXES: [(&str, fn(f64) -> AmountTest); 5] = [
            (">=", AmountTest::GreaterOrEqual),
            ("<=", AmountTest::LessOrEqual),
            ("!=", AmountTest::NotEqual),
            (">", AmountTest::Greater),
            ("<", AmountTest::Less),
        ];

        for (prefix, build) in PREFIXES {
            if let Some(rest) = expr.strip_prefix(prefix) {
                return number(rest).map(build);
            }
        }

        if let Some((min, max)) = expr.split_once("..") {
            return Some(AmountTest::Between(number(min)?, number(max)?));
        }

        number(expr).map(AmountTest::Exact)
    }

    pub fn matches(&self, amount: f64) -> bool {
        match *self {
            AmountTest::Exact(n) => amount == n,
            AmountTest::Between(min, max) => amount >= min && amount <= max,
            AmountTest::Greater(n) => amount > n,
            AmountTest::GreaterOrEqual(n) => amount >= n,
            AmountTest::Less(n) => amount < n,
            AmountTest::LessOrEqual(n) => amount <= n,
            AmountTest::NotEqual(n) => amount != n,
        }
    }
}

/// Case-insensitive text pattern.
///
/// Surrounding double quotes are stripped. A pattern containing `*` is a
/// wildcard expression where each `*` matches any run of characters;
/// otherwise it is a plain substring test.
#[derive(Debug, Clone)]
pub enum TextPattern {
    Substring(String),
    Wildcard(Regex),
}

impl TextPattern {
    pub fn new(raw: &str) -> Self {
        let pattern = strip_quotes(raw).to_lowercase();

        if !pattern.contains('*') {
            return TextPattern::Substring(pattern);
        }

        let expr = pattern
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");

        match Regex::new(&format!("(?s){expr}")) {
            Ok(re) => TextPattern::Wildcard(re),
            Err(e) => {
                log::warn!("could not compile pattern '{}': {}", raw, e);
                TextPattern::Substring(pattern.replace('*', ""))
            }
        }
    }

    pub fn matches(&self, subject: &str) -> bool {
        let subject = subject.to_lowercase();
        match self {
            TextPattern::Substring(needle) => subject.contains(needle.as_str()),
            TextPattern::Wildcard(re) => re.is_match(&subject),
        }
    }
}

impl QueryPlan {
    /// Compile a parsed query
    pub fn from_query(query: &QueryNode, now: DateTime<Utc>) -> Self {
        Self {
            root: plan_node(query, now),
        }
    }

    /// Evaluate the plan against one record
    pub fn matches<T: TransactionRecord + ?Sized>(&self, record: &T) -> bool {
        self.root.matches(record)
    }
}

fn plan_node(node: &QueryNode, now: DateTime<Utc>) -> PlanNode {
    match node {
        QueryNode::Filter(filter) => PlanNode::Filter {
            test: FilterTest::compile(filter, now),
            negated: filter.negated,
        },
        QueryNode::BinaryOp(op) => PlanNode::Binary {
            operator: op.operator,
            left: Box::new(plan_node(&op.left, now)),
            right: Box::new(plan_node(&op.right, now)),
            negated: op.negated,
        },
    }
}

impl PlanNode {
    fn matches<T: TransactionRecord + ?Sized>(&self, record: &T) -> bool {
        match self {
            PlanNode::Filter { test, negated } => test.matches(record) != *negated,
            PlanNode::Binary {
                operator,
                left,
                right,
                negated,
            } => {
                let result = match operator {
                    BinaryOperator::And => left.matches(record) && right.matches(record),
                    BinaryOperator::Or => left.matches(record) || right.matches(record),
                };
                result != *negated
            }
        }
    }
}

impl FilterTest {
    pub fn compile(filter: &FilterNode, now: DateTime<Utc>) -> Self {
        let value = filter.value.as_str();

        match filter.field {
            Field::Since | Field::Until => {
                match resolve_date(value, filter.value_type, now) {
                    Some(date) if filter.field == Field::Since => FilterTest::Since(date),
                    Some(date) => FilterTest::Until(date),
                    None => {
                        log::warn!(
                            "invalid date value '{}' for {}, filter ignored",
                            value,
                            filter.field
                        );
                        FilterTest::Always
                    }
                }
            }
            Field::Status => FilterTest::Status(strip_quotes(value).to_uppercase()),
            Field::Category => FilterTest::Category(TextPattern::new(value)),
            Field::Description => FilterTest::Description(TextPattern::new(value)),
            Field::Account => FilterTest::Account(TextPattern::new(value)),
            Field::Type => FilterTest::TransactionType(TextPattern::new(value)),
            Field::Amount => match AmountTest::parse(value) {
                Some(test) => FilterTest::Amount(test),
                None => {
                    log::warn!("invalid amount expression '{}', filter matches nothing", value);
                    FilterTest::Never
                }
            },
            Field::Credit | Field::Debit => match parse_bool(value, filter.value_type) {
                Some(expected) if filter.field == Field::Credit => FilterTest::Credit(expected),
                Some(expected) => FilterTest::Debit(expected),
                None => {
                    log::warn!(
                        "invalid boolean value '{}' for {}, filter ignored",
                        value,
                        filter.field
                    );
                    FilterTest::Always
                }
            },
        }
    }

    pub fn matches<T: TransactionRecord + ?Sized>(&self, record: &T) -> bool {
        match self {
            FilterTest::Since(date) => record.created_at() >= *date,
            FilterTest::Until(date) => record.created_at() <= *date,
            FilterTest::Status(status) => record.status().to_uppercase() == *status,
            FilterTest::Category(pattern) => {
                pattern.matches(record.category_id().unwrap_or(""))
                    || pattern.matches(record.parent_category_id().unwrap_or(""))
            }
            FilterTest::Amount(test) => test.matches(record.amount().abs()),
            FilterTest::Description(pattern) => pattern.matches(record.description()),
            FilterTest::Account(pattern) => pattern.matches(record.account_id()),
            FilterTest::TransactionType(pattern) => {
                pattern.matches(record.transaction_type().unwrap_or(""))
            }
            FilterTest::Credit(expected) => is_credit(record) == *expected,
            FilterTest::Debit(expected) => is_credit(record) != *expected,
            FilterTest::Always => true,
            FilterTest::Never => false,
        }
    }
}

fn is_credit<T: TransactionRecord + ?Sized>(record: &T) -> bool {
    record.amount() > 0.0
}

fn parse_bool(value: &str, value_type: ValueType) -> Option<bool> {
    if value_type != ValueType::Boolean && value_type != ValueType::Pattern {
        return None;
    }
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
