use chrono::NaiveDate;
use learn_core::model::{DATE_FORMAT, Domain, SlotKey, SlotKind, SubjectId, parse_date};
use sqlx::Row;

use crate::repository::{ProgressRecord, StorageError};

/// `slot_date` value for slots without a date.
pub(crate) const NO_DATE: &str = "";
/// `item_index` value for slots without an item.
pub(crate) const NO_ITEM: i64 = -1;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn date_to_column(date: Option<NaiveDate>) -> String {
    date.map_or_else(|| NO_DATE.to_owned(), |d| d.format(DATE_FORMAT).to_string())
}

pub(crate) fn item_to_column(item: Option<u32>) -> i64 {
    item.map_or(NO_ITEM, i64::from)
}

/// Column values `(slot_kind, slot_date, item_index)` for a slot.
pub(crate) fn slot_columns(slot: &SlotKey) -> (&'static str, String, i64) {
    (
        slot.kind().as_str(),
        date_to_column(slot.date()),
        item_to_column(slot.item()),
    )
}

fn slot_from_columns(kind: &str, date: &str, item: i64) -> Result<SlotKey, StorageError> {
    let kind = SlotKind::parse(kind).map_err(ser)?;
    let date = if date == NO_DATE {
        None
    } else {
        Some(parse_date(date).map_err(ser)?)
    };
    let item = if item == NO_ITEM {
        None
    } else {
        Some(
            u32::try_from(item)
                .map_err(|_| StorageError::Serialization(format!("invalid item_index: {item}")))?,
        )
    };
    SlotKey::from_parts(kind, date, item).map_err(ser)
}

pub(crate) fn map_progress_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ProgressRecord, StorageError> {
    let domain: Domain = row
        .try_get::<String, _>("domain")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let subject: SubjectId = row
        .try_get::<String, _>("subject")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;
    let slot = slot_from_columns(
        row.try_get::<String, _>("slot_kind").map_err(ser)?.as_str(),
        row.try_get::<String, _>("slot_date").map_err(ser)?.as_str(),
        row.try_get::<i64, _>("item_index").map_err(ser)?,
    )?;

    Ok(ProgressRecord {
        domain,
        subject,
        slot,
        learned_payload: row.try_get("learned_payload").map_err(ser)?,
        stats_payload: row.try_get("stats_payload").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}
