//! Query language pipeline.
//!
//! ```text
//! query string -> lexer -> tokens -> parser -> AST -> validator
//!                                               |--> bounds (fetch hint)
//!                                               '--> planner -> executor (filtered records)
//! ```

pub mod bounds;
pub mod dates;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod planner;
pub mod validator;

pub use bounds::{DateBounds, extract_date_bounds};
pub use executor::{QueryExecutor, evaluate_query};
pub use lexer::{LexError, Span, Token, TokenKind, tokenize};
pub use parser::{
    BinaryOpNode, BinaryOperator, Field, FilterNode, ParseError, QueryNode, ValueType,
};
pub use planner::{AmountTest, QueryPlan, TextPattern};
pub use validator::{ValidationError, allowed_value_types, validate};

use thiserror::Error;

/// Any failure turning a query string into a usable AST
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("{}", join_lex_errors(.0))]
    Lex(Vec<LexError>),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Validation(#[from] ValidationError),
}

impl QueryError {
    /// One human-readable line per problem
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            QueryError::Lex(errors) => errors.iter().map(|e| e.to_string()).collect(),
            QueryError::Parse(e) => vec![e.to_string()],
            QueryError::Validation(e) => vec![e.to_string()],
        }
    }
}

fn join_lex_errors(errors: &[LexError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Tokenize and parse a query.
///
/// `Ok(None)` means the query was empty. Lex errors abort before parsing.
pub fn parse_query(input: &str) -> Result<Option<QueryNode>, QueryError> {
    let tokens = tokenize(input).into_result().map_err(QueryError::Lex)?;
    log::debug!("lexed {} tokens", tokens.len());
    Ok(parser::parse_tokens(&tokens)?)
}

/// Parse and validate a query
pub fn compile_query(input: &str) -> Result<Option<QueryNode>, QueryError> {
    let node = parse_query(input)?;
    if let Some(node) = &node {
        validate(node)?;
    }
    Ok(node)
}
