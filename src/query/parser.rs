use crate::query::lexer::{Span, Token, TokenKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum nesting depth of parenthesised groups
pub const MAX_DEPTH: usize = 64;

/// Maximum number of filters in one query
pub const MAX_FILTERS: usize = 1024;

/// Transaction attribute a filter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Since,
    Until,
    Category,
    Status,
    Amount,
    Description,
    Account,
    Type,
    Credit,
    Debit,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Since,
        Field::Until,
        Field::Category,
        Field::Status,
        Field::Amount,
        Field::Description,
        Field::Account,
        Field::Type,
        Field::Credit,
        Field::Debit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::Since => "since",
            Field::Until => "until",
            Field::Category => "category",
            Field::Status => "status",
            Field::Amount => "amount",
            Field::Description => "description",
            Field::Account => "account",
            Field::Type => "type",
            Field::Credit => "credit",
            Field::Debit => "debit",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == keyword)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lexical type of a filter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    Range,
    Pattern,
    Date,
    RelativeDate,
    Boolean,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Range => "range",
            ValueType::Pattern => "pattern",
            ValueType::Date => "date",
            ValueType::RelativeDate => "relativeDate",
            ValueType::Boolean => "boolean",
        }
    }

    pub fn from_token(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::RangeValue => Some(ValueType::Range),
            TokenKind::PatternValue => Some(ValueType::Pattern),
            TokenKind::DateValue => Some(ValueType::Date),
            TokenKind::RelativeDateValue => Some(ValueType::RelativeDate),
            TokenKind::BooleanValue => Some(ValueType::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `field:value` predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterNode {
    pub field: Field,
    /// Raw matched text
    pub value: String,
    pub value_type: ValueType,
    pub negated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BinaryOperator {
    And,
    Or,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOperator::And => f.write_str("AND"),
            BinaryOperator::Or => f.write_str("OR"),
        }
    }
}

/// AND/OR combination of two subexpressions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryOpNode {
    pub operator: BinaryOperator,
    pub left: Box<QueryNode>,
    pub right: Box<QueryNode>,
    /// Inverts the combined result; only set by a negated group
    pub negated: bool,
}

/// Query AST node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueryNode {
    Filter(FilterNode),
    BinaryOp(BinaryOpNode),
}

impl QueryNode {
    pub fn filter(field: Field, value: impl Into<String>, value_type: ValueType) -> Self {
        QueryNode::Filter(FilterNode {
            field,
            value: value.into(),
            value_type,
            negated: false,
        })
    }

    pub fn binary(operator: BinaryOperator, left: QueryNode, right: QueryNode) -> Self {
        QueryNode::BinaryOp(BinaryOpNode {
            operator,
            left: Box::new(left),
            right: Box::new(right),
            negated: false,
        })
    }

    pub fn and(left: QueryNode, right: QueryNode) -> Self {
        Self::binary(BinaryOperator::And, left, right)
    }

    pub fn or(left: QueryNode, right: QueryNode) -> Self {
        Self::binary(BinaryOperator::Or, left, right)
    }

    /// Invert this node's result (post-hoc, never distributed)
    pub fn negate(self) -> Self {
        match self {
            QueryNode::Filter(mut filter) => {
                filter.negated = !filter.negated;
                QueryNode::Filter(filter)
            }
            QueryNode::BinaryOp(mut op) => {
                op.negated = !op.negated;
                QueryNode::BinaryOp(op)
            }
        }
    }

    pub fn is_negated(&self) -> bool {
        match self {
            QueryNode::Filter(filter) => filter.negated,
            QueryNode::BinaryOp(op) => op.negated,
        }
    }

    /// Visit every filter depth-first, left before right
    pub fn for_each_filter<'a>(&'a self, f: &mut impl FnMut(&'a FilterNode)) {
        match self {
            QueryNode::Filter(filter) => f(filter),
            QueryNode::BinaryOp(op) => {
                op.left.for_each_filter(f);
                op.right.for_each_filter(f);
            }
        }
    }

    pub fn filter_count(&self) -> usize {
        let mut count = 0;
        self.for_each_filter(&mut |_| count += 1);
        count
    }
}

/// Renders canonical query text that parses back to the same AST
impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Filter(filter) => {
                if filter.negated {
                    f.write_str("!")?;
                }
                write!(f, "{}:{}", filter.field, filter.value)
            }
            QueryNode::BinaryOp(op) => {
                if op.negated {
                    f.write_str("!")?;
                }
                write!(f, "({} {} {})", op.left, op.operator, op.right)
            }
        }
    }
}

/// Grammar violation
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ParseError {
    #[error("unexpected {found} '{text}' at offset {}, expected {expected}", .span.start)]
    UnexpectedToken {
        found: TokenKind,
        text: String,
        span: Span,
        expected: &'static str,
    },
    #[error("unexpected end of query, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("unmatched '{paren}' at offset {}", .span.start)]
    UnmatchedParen { paren: char, span: Span },
    #[error("missing value after '{field}:' at offset {}", .span.end)]
    MissingValue { field: Field, span: Span },
    #[error("groups nested deeper than {limit} levels")]
    TooDeep { limit: usize },
    #[error("query has more than {limit} filters")]
    TooManyFilters { limit: usize },
}

/// Parse a token sequence.
///
/// Returns `Ok(None)` when there are no tokens (an empty query).
pub fn parse_tokens(tokens: &[Token<'_>]) -> Result<Option<QueryNode>, ParseError> {
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut parser = Parser::new(tokens);
    let root = parser.parse_or()?;

    match parser.peek() {
        None => Ok(Some(root)),
        Some(token) if token.kind == TokenKind::RParen => Err(ParseError::UnmatchedParen {
            paren: ')',
            span: token.span,
        }),
        Some(token) => Err(unexpected(token, "AND, OR or end of query")),
    }
}

fn unexpected(token: &Token<'_>, expected: &'static str) -> ParseError {
    ParseError::UnexpectedToken {
        found: token.kind,
        text: token.text.to_string(),
        span: token.span,
        expected,
    }
}

/// Recursive descent parser, one method per grammar rule
struct Parser<'t, 'a> {
    tokens: &'t [Token<'a>],
    pos: usize,
    depth: usize,
    filters: usize,
}

impl<'t, 'a> Parser<'t, 'a> {
    fn new(tokens: &'t [Token<'a>]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            filters: 0,
        }
    }

    fn peek(&self) -> Option<&'t Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<&'t Token<'a>> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn consume(&mut self, kind: TokenKind) -> Option<&'t Token<'a>> {
        if self.peek_kind() == Some(kind) {
            self.advance()
        } else {
            None
        }
    }

    /// orExpression := andExpression ( OR andExpression )*
    fn parse_or(&mut self) -> Result<QueryNode, ParseError> {
        let mut node = self.parse_and()?;

        while self.consume(TokenKind::Or).is_some() {
            let rhs = self.parse_and()?;
            node = QueryNode::or(node, rhs);
        }

        Ok(node)
    }

    /// andExpression := atomicExpression ( AND? atomicExpression )*
    fn parse_and(&mut self) -> Result<QueryNode, ParseError> {
        let mut node = self.parse_atomic()?;

        loop {
            let explicit = self.consume(TokenKind::And).is_some();
            let implicit = matches!(
                self.peek_kind(),
                Some(TokenKind::Not | TokenKind::LParen | TokenKind::Field)
            );
            if !explicit && !implicit {
                break;
            }

            let rhs = self.parse_atomic()?;
            node = QueryNode::and(node, rhs);
        }

        Ok(node)
    }

    /// atomicExpression := NOT? '(' orExpression ')' | filter
    fn parse_atomic(&mut self) -> Result<QueryNode, ParseError> {
        let negated = self.consume(TokenKind::Not).is_some();

        match self.peek() {
            Some(token) if token.kind == TokenKind::LParen => {
                self.advance();
                let node = self.parse_group(token.span)?;
                Ok(if negated { node.negate() } else { node })
            }
            Some(token) if token.kind == TokenKind::Field => self.parse_filter(negated),
            Some(token) => Err(unexpected(
                token,
                if negated {
                    "a filter or '('"
                } else {
                    "a filter, '(' or '!'"
                },
            )),
            None => Err(ParseError::UnexpectedEnd {
                expected: "a filter or '('",
            }),
        }
    }

    fn parse_group(&mut self, open: Span) -> Result<QueryNode, ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep { limit: MAX_DEPTH });
        }

        let node = self.parse_or()?;

        match self.peek() {
            Some(token) if token.kind == TokenKind::RParen => {
                self.advance();
            }
            Some(token) => return Err(unexpected(token, "')'")),
            None => {
                return Err(ParseError::UnmatchedParen {
                    paren: '(',
                    span: open,
                });
            }
        }

        self.depth -= 1;
        Ok(node)
    }

    /// filter := NOT? FIELD ':' value
    fn parse_filter(&mut self, negated: bool) -> Result<QueryNode, ParseError> {
        let Some(field_token) = self.advance() else {
            return Err(ParseError::UnexpectedEnd { expected: "a field" });
        };
        let field = Field::from_keyword(field_token.text)
            .ok_or_else(|| unexpected(field_token, "a field"))?;

        let colon = match self.advance() {
            Some(token) if token.kind == TokenKind::Colon => token,
            Some(token) => return Err(unexpected(token, "':'")),
            None => return Err(ParseError::UnexpectedEnd { expected: "':'" }),
        };

        let value_token = match self.peek() {
            Some(token) if token.kind.is_value() => token,
            _ => {
                return Err(ParseError::MissingValue {
                    field,
                    span: colon.span,
                });
            }
        };
        self.advance();

        self.filters += 1;
        if self.filters > MAX_FILTERS {
            return Err(ParseError::TooManyFilters { limit: MAX_FILTERS });
        }

        let value_type = ValueType::from_token(value_token.kind)
            .ok_or_else(|| unexpected(value_token, "a value"))?;

        Ok(QueryNode::Filter(FilterNode {
            field,
            value: value_token.text.to_string(),
            value_type,
            negated,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::lexer::tokenize;

    fn parse(input: &str) -> Result<Option<QueryNode>, ParseError> {
        let tokens = tokenize(input)
            .into_result()
            .expect("test query should lex");
        parse_tokens(&tokens)
    }

    fn parse_ok(input: &str) -> QueryNode {
        parse(input)
            .expect("test query should parse")
            .expect("test query should not be empty")
    }

    fn filter(field: Field, value: &str, value_type: ValueType) -> QueryNode {
        QueryNode::filter(field, value, value_type)
    }

    #[test]
    fn test_single_filter() {
        let node = parse_ok("category:food");
        assert_eq!(node, filter(Field::Category, "food", ValueType::Pattern));
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(parse("").unwrap(), None);
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn test_value_types() {
        let cases = [
            ("since:2024-01-01", ValueType::Date),
            ("since:7d", ValueType::RelativeDate),
            ("amount:>50", ValueType::Range),
            ("credit:true", ValueType::Boolean),
            ("description:*coffee*", ValueType::Pattern),
        ];
        for (query, expected) in cases {
            match parse_ok(query) {
                QueryNode::Filter(f) => assert_eq!(f.value_type, expected, "{query}"),
                other => panic!("expected filter for {query}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_implicit_and_matches_explicit() {
        assert_eq!(
            parse_ok("category:food debit:true"),
            parse_ok("category:food AND debit:true")
        );
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let node = parse_ok("status:held OR category:food debit:true");
        let expected = QueryNode::or(
            filter(Field::Status, "held", ValueType::Pattern),
            QueryNode::and(
                filter(Field::Category, "food", ValueType::Pattern),
                filter(Field::Debit, "true", ValueType::Boolean),
            ),
        );
        assert_eq!(node, expected);
    }

    #[test]
    fn test_left_fold() {
        let node = parse_ok("status:a status:b status:c");
        let expected = QueryNode::and(
            QueryNode::and(
                filter(Field::Status, "a", ValueType::Pattern),
                filter(Field::Status, "b", ValueType::Pattern),
            ),
            filter(Field::Status, "c", ValueType::Pattern),
        );
        assert_eq!(node, expected);

        let node = parse_ok("status:a OR status:b OR status:c");
        match node {
            QueryNode::BinaryOp(op) => {
                assert_eq!(op.operator, BinaryOperator::Or);
                assert!(matches!(*op.left, QueryNode::BinaryOp(_)));
                assert!(matches!(*op.right, QueryNode::Filter(_)));
            }
            other => panic!("expected binary op, got {other:?}"),
        }
    }

    #[test]
    fn test_grouping_overrides_precedence() {
        let node = parse_ok("(status:held OR category:food) debit:true");
        match node {
            QueryNode::BinaryOp(op) => {
                assert_eq!(op.operator, BinaryOperator::And);
                assert!(!op.negated);
                assert!(matches!(&*op.left, QueryNode::BinaryOp(inner) if inner.operator == BinaryOperator::Or));
            }
            other => panic!("expected binary op, got {other:?}"),
        }
    }

    #[test]
    fn test_negated_filter() {
        match parse_ok("!type:transfer") {
            QueryNode::Filter(f) => {
                assert!(f.negated);
                assert_eq!(f.field, Field::Type);
            }
            other => panic!("expected filter, got {other:?}"),
        }
    }

    #[test]
    fn test_negated_group_is_not_distributed() {
        match parse_ok("!(category:transfer OR type:transfer)") {
            QueryNode::BinaryOp(op) => {
                assert!(op.negated);
                assert_eq!(op.operator, BinaryOperator::Or);
                assert!(!op.left.is_negated());
                assert!(!op.right.is_negated());
            }
            other => panic!("expected binary op, got {other:?}"),
        }
    }

    #[test]
    fn test_negated_single_filter_group() {
        let node = parse_ok("!(status:held)");
        assert!(node.is_negated());
        assert_eq!(node, parse_ok("!status:held"));
        // Negating an already negated filter cancels out
        assert_eq!(parse_ok("!(!status:held)"), parse_ok("status:held"));
    }

    #[test]
    fn test_missing_value() {
        let err = parse("category:").unwrap_err();
        assert!(matches!(err, ParseError::MissingValue { field: Field::Category, .. }));

        let err = parse("category: AND status:held").unwrap_err();
        assert!(matches!(err, ParseError::MissingValue { .. }));
    }

    #[test]
    fn test_missing_colon() {
        let err = parse("category food").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { expected: "':'", .. }));
    }

    #[test]
    fn test_unmatched_parens() {
        let err = parse("(status:held").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnmatchedParen {
                paren: '(',
                span: Span::new(0, 1)
            }
        );

        let err = parse("status:held)").unwrap_err();
        assert!(matches!(err, ParseError::UnmatchedParen { paren: ')', .. }));
    }

    #[test]
    fn test_bare_value_is_rejected() {
        let err = parse("coffee").unwrap_err();
        assert!(matches!(
            err,
            ParseError::UnexpectedToken {
                found: TokenKind::PatternValue,
                ..
            }
        ));
    }

    #[test]
    fn test_dangling_operator() {
        assert!(matches!(
            parse("status:held AND").unwrap_err(),
            ParseError::UnexpectedEnd { .. }
        ));
        assert!(matches!(
            parse("OR status:held").unwrap_err(),
            ParseError::UnexpectedToken { found: TokenKind::Or, .. }
        ));
        assert!(matches!(
            parse("status:held !").unwrap_err(),
            ParseError::UnexpectedEnd { .. }
        ));
    }

    #[test]
    fn test_empty_group() {
        assert!(parse("()").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let deep = format!("{}status:held{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(parse(&deep).unwrap_err(), ParseError::TooDeep { limit: MAX_DEPTH });

        let ok = format!("{}status:held{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(parse(&ok).is_ok());
    }

    #[test]
    fn test_filter_limit() {
        let many = vec!["status:held"; MAX_FILTERS + 1].join(" ");
        assert_eq!(
            parse(&many).unwrap_err(),
            ParseError::TooManyFilters { limit: MAX_FILTERS }
        );
    }

    #[test]
    fn test_display_round_trip() {
        let queries = [
            "category:food",
            "!type:transfer",
            "category:food debit:true",
            "status:held OR category:*dining* amount:10..100",
            "!(category:transfer OR type:transfer) since:7d",
            r#"description:"coffee shop" OR !(credit:true AND amount:>=5)"#,
        ];
        for query in queries {
            let node = parse_ok(query);
            let rendered = node.to_string();
            assert_eq!(parse_ok(&rendered), node, "{query} -> {rendered}");
        }
    }

    #[test]
    fn test_display_format() {
        let node = parse_ok("!(status:held OR amount:>5) debit:true");
        assert_eq!(node.to_string(), "(!(status:held OR amount:>5) AND debit:true)");
    }

    #[test]
    fn test_serialize_shape() {
        let node = parse_ok("!amount:>50");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "filter");
        assert_eq!(json["field"], "amount");
        assert_eq!(json["valueType"], "range");
        assert_eq!(json["negated"], true);

        let node = parse_ok("status:held OR debit:true");
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "binaryOp");
        assert_eq!(json["operator"], "OR");
    }

    #[test]
    fn test_filter_count() {
        assert_eq!(parse_ok("status:a (status:b OR !status:c)").filter_count(), 3);
    }
}
