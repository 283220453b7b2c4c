//! Query tokenizer.
//!
//! Rules are tried in a fixed priority order at every offset and the first
//! rule that matches wins. Word-like rules (keywords, field names, dates,
//! numbers, booleans) only match when the next character cannot continue a
//! word, so `types` lexes as a pattern value rather than `type` + `s`.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Lexical category of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    And,
    Or,
    Not,
    #[serde(rename = "LPAREN")]
    LParen,
    #[serde(rename = "RPAREN")]
    RParen,
    Colon,
    Field,
    RangeValue,
    DateValue,
    RelativeDateValue,
    BooleanValue,
    PatternValue,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::Colon => "COLON",
            TokenKind::Field => "FIELD",
            TokenKind::RangeValue => "RANGE_VALUE",
            TokenKind::DateValue => "DATE_VALUE",
            TokenKind::RelativeDateValue => "RELATIVE_DATE_VALUE",
            TokenKind::BooleanValue => "BOOLEAN_VALUE",
            TokenKind::PatternValue => "PATTERN_VALUE",
        }
    }

    /// Whether this token can appear after `field:`
    pub fn is_value(self) -> bool {
        matches!(
            self,
            TokenKind::RangeValue
                | TokenKind::DateValue
                | TokenKind::RelativeDateValue
                | TokenKind::BooleanValue
                | TokenKind::PatternValue
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte range in the source query (half-open)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// A typed lexical unit borrowing its text from the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

/// A run of characters that no rule recognises
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("unrecognized input '{text}' at offset {}", .span.start)]
pub struct LexError {
    pub text: String,
    pub span: Span,
}

/// What must (not) follow a rule's match
#[derive(Debug, Clone, Copy)]
enum Boundary {
    Any,
    /// The next character must not continue a word
    Word,
    /// `!` is negation unless it starts `!=`
    NotEquals,
}

impl Boundary {
    fn accepts(self, next: Option<char>) -> bool {
        match self {
            Boundary::Any => true,
            Boundary::Word => !next.is_some_and(is_word_char),
            Boundary::NotEquals => next != Some('='),
        }
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '*' | '.')
}

struct Rule {
    /// `None` for skipped input (whitespace)
    kind: Option<TokenKind>,
    pattern: Regex,
    boundary: Boundary,
}

impl Rule {
    fn new(kind: Option<TokenKind>, pattern: &str, boundary: Boundary) -> Self {
        let pattern = Regex::new(&format!("^(?:{pattern})"))
            .unwrap_or_else(|e| panic!("invalid lexer rule {pattern}: {e}"));
        Self {
            kind,
            pattern,
            boundary,
        }
    }

    /// Length of the match at the start of `rest`, if any
    fn match_len(&self, rest: &str) -> Option<usize> {
        let m = self.pattern.find(rest)?;
        let len = m.end();
        if len == 0 || !self.boundary.accepts(rest[len..].chars().next()) {
            return None;
        }
        Some(len)
    }
}

/// Tokenizer rules in priority order
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    use TokenKind::*;
    vec![
        Rule::new(None, r"\s+", Boundary::Any),
        Rule::new(Some(And), "AND", Boundary::Word),
        Rule::new(Some(Or), "OR", Boundary::Word),
        Rule::new(Some(LParen), r"\(", Boundary::Any),
        Rule::new(Some(RParen), r"\)", Boundary::Any),
        Rule::new(Some(Colon), ":", Boundary::Any),
        Rule::new(Some(Not), "!", Boundary::NotEquals),
        Rule::new(
            Some(Field),
            "since|until|category|status|amount|description|account|type|credit|debit",
            Boundary::Word,
        ),
        Rule::new(Some(DateValue), r"\d{4}-\d{2}-\d{2}", Boundary::Word),
        Rule::new(Some(RelativeDateValue), r"\d+[dwmy]", Boundary::Word),
        Rule::new(Some(BooleanValue), "(?i:true|false)", Boundary::Word),
        Rule::new(
            Some(RangeValue),
            r"(?:>=|<=|!=|>|<)?\d+(?:\.\d+)?(?:\.\.\d+(?:\.\d+)?)?",
            Boundary::Word,
        ),
        Rule::new(
            Some(PatternValue),
            r#""[^"]*"|\*?[A-Za-z0-9_-]+\*?"#,
            Boundary::Any,
        ),
    ]
});

/// Streaming tokenizer over a query string.
///
/// Yields tokens in source order; each unrecognised run of characters is
/// yielded as one `LexError` and lexing resumes after it.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn match_rule(&self, pos: usize) -> Option<(Option<TokenKind>, usize)> {
        let rest = &self.input[pos..];
        RULES
            .iter()
            .find_map(|rule| rule.match_len(rest).map(|len| (rule.kind, len)))
    }

    fn advance_char(&mut self) {
        if let Some(ch) = self.input[self.pos..].chars().next() {
            self.pos += ch.len_utf8();
        }
    }

    /// Consume characters until some rule matches again
    fn unmatched(&mut self) -> LexError {
        let start = self.pos;
        self.advance_char();
        while self.pos < self.input.len() && self.match_rule(self.pos).is_none() {
            self.advance_char();
        }
        LexError {
            text: self.input[start..self.pos].to_string(),
            span: Span::new(start, self.pos),
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.input.len() {
            let Some((kind, len)) = self.match_rule(self.pos) else {
                return Some(Err(self.unmatched()));
            };

            let span = Span::new(self.pos, self.pos + len);
            self.pos += len;

            if let Some(kind) = kind {
                return Some(Ok(Token {
                    kind,
                    text: &self.input[span.start..span.end],
                    span,
                }));
            }
        }
        None
    }
}

/// Result of tokenizing a whole query
#[derive(Debug, Clone, Default, Serialize)]
pub struct LexOutput<'a> {
    pub tokens: Vec<Token<'a>>,
    pub errors: Vec<LexError>,
}

impl<'a> LexOutput<'a> {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Vec<Token<'a>>, Vec<LexError>> {
        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }
}

/// Tokenize a query, collecting every token and every lex error
pub fn tokenize(input: &str) -> LexOutput<'_> {
    let mut output = LexOutput::default();
    for item in Lexer::new(input) {
        match item {
            Ok(token) => output.tokens.push(token),
            Err(error) => output.errors.push(error),
        }
    }
    output
}
