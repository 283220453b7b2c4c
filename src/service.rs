//! End-to-end query service: parse, validate, bound, fetch and evaluate.

use crate::query::{
    DateBounds, QueryError, QueryExecutor, QueryNode, extract_date_bounds, parse_query, validate,
};
use crate::query::executor::DEFAULT_PARALLEL_THRESHOLD;
use crate::source::TransactionSource;
use crate::transaction::{Transaction, TransactionRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Order of returned transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Keep the order the source returned
    #[default]
    Input,
    /// Oldest first
    Oldest,
    /// Newest first
    Newest,
}

/// Service options
#[derive(Debug, Clone)]
pub struct QueryOptions {
    pub sort: SortOrder,
    /// Maximum results (None = unlimited)
    pub limit: Option<usize>,
    /// Refuse to evaluate queries that fail validation
    pub strict_validation: bool,
    pub parallel_threshold: usize,
    /// Parsed-query cache capacity (0 disables caching)
    pub cache_size: usize,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            sort: SortOrder::Input,
            limit: None,
            strict_validation: true,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            cache_size: 128,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    pub date_bounds: DateBounds,
    pub total_fetched: usize,
    /// Matches before `limit` was applied
    pub total_filtered: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    pub transactions: Vec<Transaction>,
    pub metadata: QueryMetadata,
}

/// Runs queries against a transaction source
pub struct QueryService<S> {
    source: S,
    options: QueryOptions,
    cache: Option<Mutex<LruCache<String, Option<QueryNode>>>>,
}

impl<S: TransactionSource> QueryService<S> {
    pub fn new(source: S, options: QueryOptions) -> Self {
        let cache = NonZeroUsize::new(options.cache_size).map(|n| Mutex::new(LruCache::new(n)));
        Self {
            source,
            options,
            cache,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Parse a query, reusing a cached AST when the same trimmed text was
    /// seen before. Failed parses are not cached, and their offsets refer to
    /// `query` as given.
    pub fn parse(&self, query: &str) -> Result<Option<QueryNode>, QueryError> {
        let key = query.trim();

        if let Some(cache) = &self.cache {
            if let Ok(mut cache) = cache.lock() {
                if let Some(node) = cache.get(key) {
                    log::debug!("parse cache hit for '{}'", key);
                    return Ok(node.clone());
                }
            }
        }

        let node = parse_query(query)?;

        if let Some(cache) = &self.cache {
            if let Ok(mut cache) = cache.lock() {
                cache.put(key.to_string(), node.clone());
            }
        }

        Ok(node)
    }

    /// Run a query end to end.
    ///
    /// Query errors are returned as [`QueryError`] inside the `anyhow::Error`
    /// so callers can downcast and show diagnostics.
    ///
    /// Only records inside the query's date bounds are fetched. When a date
    /// filter is negated or sits inside an `OR`, records outside the bounds
    /// that the query would otherwise match are not returned.
    pub fn run(&self, query: &str, now: DateTime<Utc>) -> Result<QueryOutcome> {
        let ast = self.parse(query)?;

        let bounds = match &ast {
            Some(node) => {
                if let Err(e) = validate(node) {
                    if self.options.strict_validation {
                        return Err(QueryError::Validation(e).into());
                    }
                    log::warn!("running invalid query best-effort: {}", e);
                }
                extract_date_bounds(node, now)
            }
            None => DateBounds::default(),
        };
        log::debug!("date bounds: {:?}", bounds);

        let fetched = self
            .source
            .fetch(&bounds)
            .context("Failed to fetch transactions")?;
        let total_fetched = fetched.len();

        let mut transactions: Vec<Transaction> = match &ast {
            Some(node) => QueryExecutor::new(now)
                .with_parallel_threshold(self.options.parallel_threshold)
                .execute(node, &fetched)
                .into_iter()
                .cloned()
                .collect(),
            None => fetched,
        };

        sort_transactions(&mut transactions, self.options.sort);
        let total_filtered = transactions.len();
        if let Some(limit) = self.options.limit {
            transactions.truncate(limit);
        }

        log::debug!("fetched {}, kept {}", total_fetched, total_filtered);

        Ok(QueryOutcome {
            transactions,
            metadata: QueryMetadata {
                date_bounds: bounds,
                total_fetched,
                total_filtered,
            },
        })
    }
}

fn sort_transactions(transactions: &mut [Transaction], order: SortOrder) {
    match order {
        SortOrder::Input => {}
        SortOrder::Oldest => transactions.sort_by_key(|t| t.created_at()),
        SortOrder::Newest => transactions.sort_by_key(|t| std::cmp::Reverse(t.created_at())),
    }
}
