// =============================================================================
// Merge Engine — outer join of date-keyed tables
// =============================================================================
//
// Each input table is a `DateTable` (date -> DailyRecord) that normally fills
// only its own columns.  The join keeps every date seen in any input, copies
// each non-null field into the merged row, and leaves the rest `None`.
//
// Two tables may only supply the same field for the same date if the values
// are equal.  That keeps the join commutative and idempotent instead of
// letting table order decide which value survives.
// =============================================================================

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::{DailyRecord, DateTable};

#[derive(Debug, Error, PartialEq)]
pub enum MergeError {
    #[error("conflicting values for '{field}' on {date}")]
    Conflict { date: NaiveDate, field: &'static str },
}

/// Outer-join `tables` on date.  An empty input yields an empty table.
pub fn merge_tables(tables: &[DateTable]) -> Result<DateTable, MergeError> {
    let mut merged = DateTable::new();

    for table in tables {
        for (date, incoming) in table {
            let row = merged.entry(*date).or_default();
            absorb(row, incoming, *date)?;
        }
    }

    Ok(merged)
}

/// Copy every populated field of `incoming` into `row`.
fn absorb(row: &mut DailyRecord, incoming: &DailyRecord, date: NaiveDate) -> Result<(), MergeError> {
    fill(&mut row.news, &incoming.news, date, "news")?;
    fill(&mut row.ema_short, &incoming.ema_short, date, "ema_short")?;
    fill(&mut row.ema_long, &incoming.ema_long, date, "ema_long")?;
    fill(&mut row.macd_value, &incoming.macd_value, date, "macd_value")?;
    fill(&mut row.macd_signal, &incoming.macd_signal, date, "macd_signal")?;
    fill(&mut row.rsi, &incoming.rsi, date, "rsi")?;
    Ok(())
}

fn fill<T: PartialEq + Clone>(
    slot: &mut Option<T>,
    incoming: &Option<T>,
    date: NaiveDate,
    field: &'static str,
) -> Result<(), MergeError> {
    match (slot.as_ref(), incoming) {
        (_, None) => Ok(()),
        (None, Some(v)) => {
            *slot = Some(v.clone());
            Ok(())
        }
        (Some(current), Some(v)) if current == v => Ok(()),
        (Some(_), Some(_)) => Err(MergeError::Conflict { date, field }),
    }
}

/// Group `(date, headline)` pairs by date, keeping input order within a date.
pub fn group_news<I>(items: I) -> BTreeMap<NaiveDate, Vec<String>>
where
    I: IntoIterator<Item = (NaiveDate, String)>,
{
    let mut grouped: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
    for (date, title) in items {
        grouped.entry(date).or_default().push(title);
    }
    grouped
}
