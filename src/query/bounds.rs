//! Date-bound envelope used to narrow what a transaction source fetches.

use crate::query::dates::resolve_date;
use crate::query::parser::{Field, QueryNode};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive `[since, until]` envelope; either side may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateBounds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
}

impl DateBounds {
    pub fn is_unbounded(&self) -> bool {
        self.since.is_none() && self.until.is_none()
    }

    /// Check a timestamp against the envelope (both ends inclusive)
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.since.is_none_or(|since| timestamp >= since)
            && self.until.is_none_or(|until| timestamp <= until)
    }

    /// `since` as an ISO-8601 instant with millisecond precision
    pub fn since_iso(&self) -> Option<String> {
        self.since.map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    /// `until` as an ISO-8601 instant with millisecond precision
    pub fn until_iso(&self) -> Option<String> {
        self.until.map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Collect the widest since/until envelope from every date filter.
///
/// Boolean structure and negation are ignored. The envelope only covers
/// what evaluation keeps when every date filter is a positive conjunct;
/// a date filter under `!` or inside an `OR` can match records outside it.
pub fn extract_date_bounds(node: &QueryNode, now: DateTime<Utc>) -> DateBounds {
    let mut bounds = DateBounds::default();

    node.for_each_filter(&mut |filter| {
        let slot = match filter.field {
            Field::Since => &mut bounds.since,
            Field::Until => &mut bounds.until,
            _ => return,
        };

        let Some(date) = resolve_date(&filter.value, filter.value_type, now) else {
            log::debug!(
                "ignoring unresolvable {}:{} for date bounds",
                filter.field,
                filter.value
            );
            return;
        };

        *slot = Some(match (*slot, filter.field) {
            (Some(current), Field::Since) => current.min(date),
            (Some(current), _) => current.max(date),
            (None, _) => date,
        });
    });

    bounds
}
