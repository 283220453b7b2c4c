//! Output formatting for query results, tokens and diagnostics

use crate::query::{DateBounds, LexError, QueryError, QueryNode, Token};
use crate::service::{QueryMetadata, QueryOutcome};
use crate::transaction::{Transaction, TransactionRecord, TransactionSummary};
use serde::Serialize;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

fn color_choice(color: bool) -> ColorChoice {
    if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Print one line per transaction followed by a summary line
pub fn print_transactions(outcome: &QueryOutcome, color: bool) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(color_choice(color));

    for t in &outcome.transactions {
        write_transaction(&mut stdout, t)?;
    }

    write_summary(&mut stdout, &outcome.metadata, outcome.transactions.len())
}

/// `2024-06-14  SETTLED    -4.50  Morning coffee  [restaurants-and-cafes]`
pub fn write_transaction<W: WriteColor>(out: &mut W, t: &Transaction) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
    write!(out, "{}", t.created_at().format("%Y-%m-%d %H:%M"))?;
    out.reset()?;

    write!(out, "  {:<8}", t.status())?;

    let amount_color = if t.amount() > 0.0 { Color::Green } else { Color::Red };
    out.set_color(ColorSpec::new().set_fg(Some(amount_color)).set_bold(true))?;
    write!(out, " {:>10.2}", t.amount())?;
    out.reset()?;

    write!(out, "  {}", t.description())?;

    if let Some(category) = t.category_id().or(t.parent_category_id()) {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(out, "  [{}]", category)?;
        out.reset()?;
    }

    writeln!(out)
}

fn write_summary<W: WriteColor>(out: &mut W, metadata: &QueryMetadata, shown: usize) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_dimmed(true))?;
    write!(
        out,
        "{} matched of {} fetched",
        metadata.total_filtered, metadata.total_fetched
    )?;
    if shown < metadata.total_filtered {
        write!(out, " (showing {})", shown)?;
    }
    if let Some(since) = metadata.date_bounds.since_iso() {
        write!(out, ", since {}", since)?;
    }
    if let Some(until) = metadata.date_bounds.until_iso() {
        write!(out, ", until {}", until)?;
    }
    writeln!(out)?;
    out.reset()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutcome<'a> {
    transactions: Vec<TransactionSummary<'a>>,
    metadata: &'a QueryMetadata,
}

/// Print the outcome as pretty JSON
pub fn print_json_outcome(outcome: &QueryOutcome) -> io::Result<()> {
    let json = JsonOutcome {
        transactions: outcome.transactions.iter().map(TransactionSummary::from).collect(),
        metadata: &outcome.metadata,
    };
    print_json(&json)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)
}

/// Print the canonical form of a parsed query
pub fn print_ast(node: Option<&QueryNode>, color: bool) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(color_choice(color));
    match node {
        Some(node) => {
            stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
            write!(stdout, "ok")?;
            stdout.reset()?;
            writeln!(stdout, "  {}", node)
        }
        None => writeln!(stdout, "empty query"),
    }
}

pub fn print_bounds(bounds: &DateBounds) -> io::Result<()> {
    print_json(bounds)
}

/// Print a token table, then any lex errors
pub fn print_tokens(tokens: &[Token<'_>], errors: &[LexError], color: bool) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(color_choice(color));

    for token in tokens {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(stdout, "{:>4}..{:<4}", token.span.start, token.span.end)?;
        stdout.reset()?;
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(stdout, " {:<20}", token.kind.name())?;
        stdout.reset()?;
        writeln!(stdout, " {}", token.text)?;
    }

    for error in errors {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(stdout, "{:>4}..{:<4} error", error.span.start, error.span.end)?;
        stdout.reset()?;
        writeln!(stdout, " {}", error.text)?;
    }

    Ok(())
}

/// Print query diagnostics to stderr
pub fn print_diagnostics(error: &QueryError, color: bool) -> io::Result<()> {
    let mut stderr = StandardStream::stderr(color_choice(color));
    let label = match error {
        QueryError::Lex(_) => "lex error",
        QueryError::Parse(_) => "parse error",
        QueryError::Validation(_) => "invalid query",
    };

    for line in error.diagnostics() {
        stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
        write!(stderr, "{}", label)?;
        stderr.reset()?;
        writeln!(stderr, ": {}", line)?;
    }

    Ok(())
}
