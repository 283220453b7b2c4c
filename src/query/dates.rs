//! Resolution of `since`/`until` values to instants.

use crate::query::parser::ValueType;
use chrono::{DateTime, Months, NaiveDate, TimeDelta, Utc};

/// Resolve a date-typed filter value against `now`.
///
/// Absolute dates are midnight UTC. Relative dates (`Nd`, `Nw`, `Nm`, `Ny`)
/// are `now` minus N days, weeks, calendar months or years. Any other
/// value type, or an unparseable value, yields `None`.
pub fn resolve_date(value: &str, value_type: ValueType, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match value_type {
        ValueType::Date => parse_absolute(value),
        ValueType::RelativeDate => parse_relative(value, now),
        _ => None,
    }
}

/// `YYYY-MM-DD` at 00:00 UTC
pub fn parse_absolute(value: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// `<digits><d|w|m|y>` subtracted from `now`
pub fn parse_relative(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let split = value.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = value.split_at(split);
    let amount: u32 = digits.parse().ok()?;

    match unit {
        "d" => now.checked_sub_signed(TimeDelta::try_days(i64::from(amount))?),
        "w" => now.checked_sub_signed(TimeDelta::try_weeks(i64::from(amount))?),
        "m" => now.checked_sub_months(Months::new(amount)),
        "y" => now.checked_sub_months(Months::new(amount.checked_mul(12)?)),
        _ => None,
    }
}
