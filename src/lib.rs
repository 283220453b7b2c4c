//! # txq - Transaction Query Language
//!
//! txq compiles a free-text query such as
//! `category:*dining* amount:>50 since:7d` into a boolean filter and applies
//! it to bank transaction records.
//!
//! ## Architecture
//!
//! - [`query`] - Tokenizer, parser, validator, date bounds and evaluator
//! - [`transaction`] - Transaction record contract and the API's JSON model
//! - [`source`] - Where transactions are fetched from
//! - [`service`] - End-to-end query runs with a parse cache
//! - [`config`] - Application configuration file
//! - [`output`] - Terminal and JSON rendering
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::Utc;
//! use txq::query::{compile_query, evaluate_query, extract_date_bounds};
//! use txq::source::{JsonFileSource, TransactionSource};
//!
//! let ast = compile_query("category:*dining* amount:>50 since:7d")
//!     .unwrap()
//!     .expect("non-empty query");
//!
//! // Narrow the fetch, then apply the full query
//! let now = Utc::now();
//! let bounds = extract_date_bounds(&ast, now);
//! let records = JsonFileSource::new("transactions.json").fetch(&bounds).unwrap();
//!
//! for t in evaluate_query(&ast, &records, now) {
//!     println!("{} {}", t.id, t.attributes.description);
//! }
//! ```

pub mod config;
pub mod output;
pub mod query;
pub mod service;
pub mod source;
pub mod transaction;
