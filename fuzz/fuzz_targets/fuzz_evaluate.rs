#![no_main]

use arbitrary::Arbitrary;
use chrono::{DateTime, TimeDelta, Utc};
use libfuzzer_sys::fuzz_target;
use txq::query::{QueryExecutor, extract_date_bounds, parse_query};
use txq::transaction::Transaction;

#[derive(Arbitrary, Debug)]
struct Record {
    status: bool,
    description: String,
    amount: i64,
    age_minutes: u32,
    category: Option<String>,
}

#[derive(Arbitrary, Debug)]
struct Input {
    query: String,
    records: Vec<Record>,
}

fuzz_target!(|input: Input| {
    let Ok(Some(node)) = parse_query(&input.query) else {
        return;
    };

    let now = DateTime::<Utc>::from_timestamp(1_718_409_600, 0).unwrap();
    let records: Vec<Transaction> = input
        .records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            Transaction::new(
                i.to_string(),
                if r.status { "HELD" } else { "SETTLED" },
                &r.description,
                r.amount,
                now - TimeDelta::minutes(r.age_minutes.into()),
                "acc",
            )
            .with_category(r.category.as_deref(), None)
        })
        .collect();

    // Sequential and parallel evaluation agree, and negation is a complement
    let sequential = QueryExecutor::new(now).with_parallel_threshold(usize::MAX);
    let parallel = QueryExecutor::new(now).with_parallel_threshold(0);
    let matched = sequential.execute(&node, &records);
    assert_eq!(matched, parallel.execute(&node, &records));

    let negated = node.clone().negate();
    assert_eq!(
        matched.len() + sequential.execute(&negated, &records).len(),
        records.len()
    );

    // Date bounds only widen: anything matched by a pure date filter lies inside
    if node.filter_count() == 1 {
        let bounds = extract_date_bounds(&node, now);
        if !node.is_negated() {
            assert!(matched.iter().all(|t| bounds.contains(t.attributes.created_at)));
        }
    }
});
