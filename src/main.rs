use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use txq::config::{AppConfig, get_config_path};
use txq::output;
use txq::query::{QueryError, compile_query, extract_date_bounds, parse_query, tokenize};
use txq::service::{QueryService, SortOrder};
use txq::source::JsonFileSource;

#[derive(Parser)]
#[command(name = "txq")]
#[command(about = "Filter bank transactions with a small query language")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    search: SearchArgs,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    color: ColorMode,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorMode {
    Auto,
    Never,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query against a transactions file (default command)
    Search(SearchArgs),
    /// Parse and validate a query, printing its canonical form
    Check {
        /// Query text
        query: Vec<String>,

        /// Print the AST as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the since/until envelope a query implies
    Bounds {
        /// Query text
        query: Vec<String>,

        /// Reference instant for relative dates (RFC 3339, defaults to now)
        #[arg(long, value_parser = parse_instant)]
        now: Option<DateTime<Utc>>,
    },
    /// Show the token stream of a query
    Tokens {
        /// Query text
        query: Vec<String>,
    },
    /// Show or initialise the configuration file
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Query text
    query: Vec<String>,

    /// Transactions file (JSON page or array); defaults to the configured file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Emit results as JSON
    #[arg(long)]
    json: bool,

    /// Result order
    #[arg(long, value_enum)]
    sort: Option<SortOrder>,

    /// Maximum number of results
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Run queries that fail validation anyway
    #[arg(long)]
    lenient: bool,

    /// Reference instant for relative dates (RFC 3339, defaults to now)
    #[arg(long, value_parser = parse_instant)]
    now: Option<DateTime<Utc>>,
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.to_utc())
        .map_err(|e| format!("invalid RFC 3339 timestamp '{}': {}", s, e))
}

fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    let color = cli.color == ColorMode::Auto;

    match cli.command {
        Some(Commands::Search(args)) => run_search(args, color),
        Some(Commands::Check { query, json }) => run_check(&query.join(" "), json, color),
        Some(Commands::Bounds { query, now }) => run_bounds(&query.join(" "), now, color),
        Some(Commands::Tokens { query }) => {
            let query = query.join(" ");
            let lexed = tokenize(&query);
            output::print_tokens(&lexed.tokens, &lexed.errors, color)?;
            Ok(if lexed.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Some(Commands::Config { init }) => run_config(init),
        None => run_search(cli.search, color),
    }
}

fn run_search(args: SearchArgs, color: bool) -> Result<ExitCode> {
    let config = AppConfig::load()?;

    let Some(file) = args.file.or_else(|| config.transactions_file.clone()) else {
        bail!(
            "No transactions file: pass --file or set transactions_file in {}",
            get_config_path()?.display()
        );
    };

    let mut options = config.query_options();
    if let Some(sort) = args.sort {
        options.sort = sort;
    }
    options.limit = args.limit;
    if args.lenient {
        options.strict_validation = false;
    }

    let service = QueryService::new(JsonFileSource::new(file), options);
    let now = args.now.unwrap_or_else(Utc::now);

    match service.run(&args.query.join(" "), now) {
        Ok(outcome) => {
            if args.json {
                output::print_json_outcome(&outcome)?;
            } else {
                output::print_transactions(&outcome, color)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => match e.downcast_ref::<QueryError>() {
            Some(query_error) => {
                output::print_diagnostics(query_error, color)?;
                Ok(ExitCode::FAILURE)
            }
            None => Err(e),
        },
    }
}

fn run_check(query: &str, json: bool, color: bool) -> Result<ExitCode> {
    match compile_query(query) {
        Ok(node) => {
            if json {
                output::print_json(&node)?;
            } else {
                output::print_ast(node.as_ref(), color)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            output::print_diagnostics(&e, color)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_bounds(query: &str, now: Option<DateTime<Utc>>, color: bool) -> Result<ExitCode> {
    match parse_query(query) {
        Ok(node) => {
            let now = now.unwrap_or_else(Utc::now);
            let bounds = node
                .map(|n| extract_date_bounds(&n, now))
                .unwrap_or_default();
            output::print_bounds(&bounds)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            output::print_diagnostics(&e, color)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_config(init: bool) -> Result<ExitCode> {
    let path = get_config_path()?;

    if init {
        if path.exists() {
            println!("Config already exists: {}", path.display());
        } else {
            AppConfig::default()
                .save_to(&path)
                .with_context(|| format!("Failed to initialise {}", path.display()))?;
            println!("Wrote default config: {}", path.display());
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = AppConfig::load()?;
    println!("# {}", path.display());
    output::print_json(&config)?;
    Ok(ExitCode::SUCCESS)
}
