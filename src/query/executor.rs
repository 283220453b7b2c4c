use crate::query::parser::QueryNode;
use crate::query::planner::QueryPlan;
use crate::transaction::TransactionRecord;
use chrono::{DateTime, Utc};
use rayon::prelude::*;

/// Record count at which filtering switches to rayon
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Query executor
pub struct QueryExecutor {
    now: DateTime<Utc>,
    parallel_threshold: usize,
}

impl QueryExecutor {
    /// Create an executor that resolves relative dates against `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Compile a query for repeated evaluation
    pub fn plan(&self, query: &QueryNode) -> QueryPlan {
        QueryPlan::from_query(query, self.now)
    }

    /// Return the records the query keeps, in input order
    pub fn execute<'r, T>(&self, query: &QueryNode, records: &'r [T]) -> Vec<&'r T>
    where
        T: TransactionRecord + Sync,
    {
        let plan = self.plan(query);
        self.execute_plan(&plan, records)
    }

    pub fn execute_plan<'r, T>(&self, plan: &QueryPlan, records: &'r [T]) -> Vec<&'r T>
    where
        T: TransactionRecord + Sync,
    {
        let results: Vec<&T> = if records.len() >= self.parallel_threshold {
            records.par_iter().filter(|r| plan.matches(*r)).collect()
        } else {
            records.iter().filter(|r| plan.matches(*r)).collect()
        };

        log::debug!("query kept {} of {} records", results.len(), records.len());
        results
    }

    /// Evaluate a query against a single record
    pub fn matches<T: TransactionRecord + ?Sized>(&self, query: &QueryNode, record: &T) -> bool {
        self.plan(query).matches(record)
    }
}

/// Filter `records` with `query`, resolving relative dates against `now`
pub fn evaluate_query<'r, T>(query: &QueryNode, records: &'r [T], now: DateTime<Utc>) -> Vec<&'r T>
where
    T: TransactionRecord + Sync,
{
    QueryExecutor::new(now).execute(query, records)
}
