//! End-to-end tests of the query pipeline against a recorded transactions page.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::path::PathBuf;
use std::sync::OnceLock;
use txq::query::{
    QueryError, QueryNode, compile_query, evaluate_query, extract_date_bounds, parse_query,
};
use txq::service::{QueryOptions, QueryService, SortOrder};
use txq::source::JsonFileSource;
use txq::transaction::{Transaction, load_transactions};

static FIXTURE: OnceLock<Vec<Transaction>> = OnceLock::new();

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("transactions.json")
}

fn fixture() -> &'static [Transaction] {
    FIXTURE.get_or_init(|| {
        let bytes = std::fs::read(fixture_path()).expect("Failed to read fixture");
        load_transactions(&bytes).expect("Failed to decode fixture")
    })
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap()
}

fn ast(query: &str) -> QueryNode {
    compile_query(query)
        .unwrap_or_else(|e| panic!("'{}' should compile: {}", query, e))
        .expect("non-empty query")
}

fn run(query: &str) -> Vec<&'static str> {
    evaluate_query(&ast(query), fixture(), now())
        .into_iter()
        .map(|t| t.id.as_str())
        .collect()
}

#[test]
fn test_fixture_loads() {
    assert_eq!(fixture().len(), 8);
}

#[test]
fn test_relative_since() {
    assert_eq!(run("since:7d"), vec!["tx-01", "tx-02", "tx-06", "tx-08"]);
}

#[test]
fn test_since_is_inclusive() {
    let boundary = now() - TimeDelta::days(7);
    let records = vec![
        Transaction::new("on", "SETTLED", "x", -100, boundary, "acc"),
        Transaction::new("off", "SETTLED", "x", -100, boundary - TimeDelta::seconds(1), "acc"),
    ];

    for query in ["since:7d", "since:2024-06-08"] {
        let kept: Vec<_> = evaluate_query(&ast(query), &records, now())
            .into_iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(kept, vec!["on"], "{query}");
    }
}

#[test]
fn test_until_is_inclusive() {
    assert_eq!(run("until:2024-06-01"), vec!["tx-05", "tx-07"]);
}

#[test]
fn test_credit_and_debit_follow_sign() {
    assert_eq!(run("description:woolworths debit:true"), vec!["tx-05"]);
    assert!(run("description:woolworths credit:true").is_empty());
    assert_eq!(run("credit:true"), vec!["tx-03", "tx-07"]);
}

#[test]
fn test_amount_range_is_inclusive_on_absolute_value() {
    assert_eq!(
        run("amount:10..100"),
        vec!["tx-02", "tx-04", "tx-05", "tx-08"]
    );
    assert_eq!(run("amount:>=3500"), vec!["tx-03"]);
}

#[test]
fn test_wildcard_and_substring_patterns() {
    assert_eq!(run("description:*dining*"), vec!["tx-06", "tx-08"]);
    assert_eq!(run("description:coffee"), vec!["tx-01"]);
    assert_eq!(run("description:tea*"), vec!["tx-02"]);
    assert_eq!(run("description:\"fine dining\""), vec!["tx-08"]);
}

#[test]
fn test_category_matches_parent() {
    assert_eq!(
        run("category:good-life"),
        vec!["tx-01", "tx-02", "tx-06", "tx-08"]
    );
    assert_eq!(run("category:groceries"), vec!["tx-05"]);
}

#[test]
fn test_account_status_and_type() {
    assert_eq!(run("account:acc-joint"), vec!["tx-05", "tx-06"]);
    assert_eq!(run("status:held"), vec!["tx-02", "tx-08"]);
    assert_eq!(
        run("type:purchase"),
        vec!["tx-01", "tx-02", "tx-05", "tx-06", "tx-08"]
    );
}

#[test]
fn test_negation_is_a_complement() {
    let held = run("status:held");
    let not_held = run("!status:held");
    assert_eq!(held.len() + not_held.len(), fixture().len());
    assert!(held.iter().all(|id| !not_held.contains(id)));
}

#[test]
fn test_group_negation() {
    assert_eq!(
        run("!(status:held OR category:transfer)"),
        vec!["tx-01", "tx-03", "tx-05", "tx-06", "tx-07"]
    );
}

#[test]
fn test_juxtaposition_means_and() {
    assert_eq!(run("category:good-life amount:>50"), vec!["tx-06", "tx-08"]);
    assert_eq!(
        run("category:good-life amount:>50"),
        run("category:good-life AND amount:>50")
    );
}

#[test]
fn test_and_binds_tighter_than_or() {
    assert_eq!(
        run("status:held OR description:salary amount:>1000"),
        vec!["tx-02", "tx-03", "tx-08"]
    );
}

#[test]
fn test_validation_rejects_wrong_value_type() {
    let err = compile_query("amount:pending").unwrap_err();
    assert!(matches!(err, QueryError::Validation(_)));
    assert_eq!(
        err.to_string(),
        "field 'amount' must use range value, not pattern"
    );
}

#[test]
fn test_date_bounds_envelope() {
    let node = parse_query("since:7d OR since:2024-06-01 until:2024-06-10")
        .unwrap()
        .unwrap();
    let bounds = extract_date_bounds(&node, now());
    assert_eq!(bounds.since_iso().as_deref(), Some("2024-06-01T00:00:00.000Z"));
    assert_eq!(bounds.until_iso().as_deref(), Some("2024-06-10T00:00:00.000Z"));
}

#[test]
fn test_service_over_json_file() {
    let options = QueryOptions {
        sort: SortOrder::Newest,
        ..QueryOptions::default()
    };
    let service = QueryService::new(JsonFileSource::new(fixture_path()), options);
    let outcome = service.run("since:7d description:*dining*", now()).unwrap();

    let ids: Vec<_> = outcome.transactions.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["tx-08", "tx-06"]);
    assert_eq!(outcome.metadata.total_fetched, 4);
    assert_eq!(outcome.metadata.total_filtered, 2);
}
