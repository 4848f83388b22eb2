// crates/shardline-store-sqlite/src/codec.rs
// ============================================================================
// Module: SQLite Map Row Codec
// Description: Parameter binding and row decoding per map kind.
// Purpose: Translate map rows to bound values and back without copying.
// Dependencies: rusqlite, shardline-core, time
// ============================================================================

//! ## Overview
//! Every map row type implements [`MapRowCodec`]. Binding pushes borrowed
//! [`ToSqlOutput`] values in schema column order, so payload blobs are never
//! copied into the statement. Decoding reads the columns of the select
//! template (map key first, then values) and reattaches identity from the
//! caller's filter; stored identity columns are never echoed back.
//!
//! Timestamps are stored as signed UTC microseconds since the Unix epoch.
//! Finer precision is truncated toward negative infinity on write.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::Row;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::Type;
use rusqlite::types::Value;
use rusqlite::types::ValueRef;
use shardline_core::ActivityInfoMapsRow;
use shardline_core::ChildExecutionInfoMapsRow;
use shardline_core::ExecutionFilter;
use shardline_core::MapKind;
use shardline_core::MapPayload;
use shardline_core::MapStoreError;
use shardline_core::RequestCancelInfoMapsRow;
use shardline_core::SignalInfoMapsRow;
use shardline_core::SignalsRequestedSetsRow;
use shardline_core::TimerInfoMapsRow;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Nanoseconds per stored microsecond.
const NANOS_PER_MICRO: i128 = 1_000;

// ============================================================================
// SECTION: Codec Contract
// ============================================================================

/// Binding and decoding for one map row type.
///
/// # Invariants
/// - `bind_row` pushes exactly `1 + value_columns.len()` values.
/// - `decode` reads columns in select-template order.
pub trait MapRowCodec: Sized {
    /// Map kind this row belongs to.
    const KIND: MapKind;

    /// Returns the owning execution.
    fn execution(&self) -> &ExecutionFilter;

    /// Pushes the map key followed by the value columns.
    ///
    /// # Errors
    ///
    /// Returns [`MapStoreError::Invalid`] when a value cannot be stored.
    fn bind_row<'a>(&'a self, out: &mut Vec<ToSqlOutput<'a>>) -> Result<(), MapStoreError>;

    /// Decodes one selected row, stamping `filter` as its identity.
    ///
    /// # Errors
    ///
    /// Returns a `rusqlite` error when a column is missing or mistyped.
    fn decode(filter: &ExecutionFilter, row: &Row<'_>) -> rusqlite::Result<Self>;
}

// ============================================================================
// SECTION: Primitive Binding
// ============================================================================

/// Pushes the four identity columns of `execution`.
pub fn bind_execution<'a>(execution: &'a ExecutionFilter, out: &mut Vec<ToSqlOutput<'a>>) {
    out.push(bind_integer(execution.shard_id.as_column()));
    out.push(bind_text(execution.domain_id.as_str()));
    out.push(bind_text(execution.workflow_id.as_str()));
    out.push(bind_text(execution.run_id.as_str()));
}

/// Binds an integer.
#[must_use]
pub const fn bind_integer<'a>(value: i64) -> ToSqlOutput<'a> {
    ToSqlOutput::Owned(Value::Integer(value))
}

/// Binds borrowed text.
#[must_use]
pub const fn bind_text(value: &str) -> ToSqlOutput<'_> {
    ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes()))
}

/// Binds a borrowed blob.
#[must_use]
pub const fn bind_blob(value: &[u8]) -> ToSqlOutput<'_> {
    ToSqlOutput::Borrowed(ValueRef::Blob(value))
}

/// Pushes the `data` and `data_encoding` columns.
fn bind_payload<'a>(payload: &'a MapPayload, out: &mut Vec<ToSqlOutput<'a>>) {
    out.push(bind_blob(&payload.data));
    out.push(bind_text(&payload.data_encoding));
}

/// Decodes `data` and `data_encoding` starting at column `first`.
fn decode_payload(row: &Row<'_>, first: usize) -> rusqlite::Result<MapPayload> {
    Ok(MapPayload {
        data: row.get(first)?,
        data_encoding: row.get(first + 1)?,
    })
}

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// Converts a timestamp to stored UTC microseconds.
///
/// # Errors
///
/// Returns [`MapStoreError::Invalid`] when the value does not fit in `i64`.
pub fn encode_timestamp(value: OffsetDateTime) -> Result<i64, MapStoreError> {
    let micros = value.unix_timestamp_nanos().div_euclid(NANOS_PER_MICRO);
    i64::try_from(micros)
        .map_err(|_| MapStoreError::Invalid(format!("timestamp out of range: {value}")))
}

/// Converts stored UTC microseconds back to a timestamp.
///
/// # Errors
///
/// Returns [`time::error::ComponentRange`] when the value is outside the
/// representable calendar range.
pub fn decode_timestamp(micros: i64) -> Result<OffsetDateTime, time::error::ComponentRange> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * NANOS_PER_MICRO)
}

/// Reads a stored timestamp column.
fn get_timestamp(row: &Row<'_>, index: usize) -> rusqlite::Result<OffsetDateTime> {
    let micros: i64 = row.get(index)?;
    decode_timestamp(micros).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(index, Type::Integer, Box::new(err))
    })
}

// ============================================================================
// SECTION: Row Codecs
// ============================================================================

impl MapRowCodec for ActivityInfoMapsRow {
    const KIND: MapKind = MapKind::ActivityInfo;

    fn execution(&self) -> &ExecutionFilter {
        &self.execution
    }

    fn bind_row<'a>(&'a self, out: &mut Vec<ToSqlOutput<'a>>) -> Result<(), MapStoreError> {
        let heartbeat = encode_timestamp(self.last_heartbeat_updated_time)?;
        out.push(bind_integer(self.schedule_id));
        bind_payload(&self.payload, out);
        out.push(bind_blob(&self.last_heartbeat_details));
        out.push(bind_integer(heartbeat));
        Ok(())
    }

    fn decode(filter: &ExecutionFilter, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            execution: filter.clone(),
            schedule_id: row.get(0)?,
            payload: decode_payload(row, 1)?,
            last_heartbeat_details: row.get(3)?,
            last_heartbeat_updated_time: get_timestamp(row, 4)?,
        })
    }
}

impl MapRowCodec for TimerInfoMapsRow {
    const KIND: MapKind = MapKind::TimerInfo;

    fn execution(&self) -> &ExecutionFilter {
        &self.execution
    }

    fn bind_row<'a>(&'a self, out: &mut Vec<ToSqlOutput<'a>>) -> Result<(), MapStoreError> {
        out.push(bind_text(&self.timer_id));
        bind_payload(&self.payload, out);
        Ok(())
    }

    fn decode(filter: &ExecutionFilter, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            execution: filter.clone(),
            timer_id: row.get(0)?,
            payload: decode_payload(row, 1)?,
        })
    }
}

impl MapRowCodec for ChildExecutionInfoMapsRow {
    const KIND: MapKind = MapKind::ChildExecutionInfo;

    fn execution(&self) -> &ExecutionFilter {
        &self.execution
    }

    fn bind_row<'a>(&'a self, out: &mut Vec<ToSqlOutput<'a>>) -> Result<(), MapStoreError> {
        out.push(bind_integer(self.initiated_id));
        bind_payload(&self.payload, out);
        Ok(())
    }

    fn decode(filter: &ExecutionFilter, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            execution: filter.clone(),
            initiated_id: row.get(0)?,
            payload: decode_payload(row, 1)?,
        })
    }
}

impl MapRowCodec for RequestCancelInfoMapsRow {
    const KIND: MapKind = MapKind::RequestCancelInfo;

    fn execution(&self) -> &ExecutionFilter {
        &self.execution
    }

    fn bind_row<'a>(&'a self, out: &mut Vec<ToSqlOutput<'a>>) -> Result<(), MapStoreError> {
        out.push(bind_integer(self.initiated_id));
        bind_payload(&self.payload, out);
        Ok(())
    }

    fn decode(filter: &ExecutionFilter, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            execution: filter.clone(),
            initiated_id: row.get(0)?,
            payload: decode_payload(row, 1)?,
        })
    }
}

impl MapRowCodec for SignalInfoMapsRow {
    const KIND: MapKind = MapKind::SignalInfo;

    fn execution(&self) -> &ExecutionFilter {
        &self.execution
    }

    fn bind_row<'a>(&'a self, out: &mut Vec<ToSqlOutput<'a>>) -> Result<(), MapStoreError> {
        out.push(bind_integer(self.initiated_id));
        bind_payload(&self.payload, out);
        Ok(())
    }

    fn decode(filter: &ExecutionFilter, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            execution: filter.clone(),
            initiated_id: row.get(0)?,
            payload: decode_payload(row, 1)?,
        })
    }
}

impl MapRowCodec for SignalsRequestedSetsRow {
    const KIND: MapKind = MapKind::SignalsRequested;

    fn execution(&self) -> &ExecutionFilter {
        &self.execution
    }

    fn bind_row<'a>(&'a self, out: &mut Vec<ToSqlOutput<'a>>) -> Result<(), MapStoreError> {
        out.push(bind_text(&self.signal_id));
        Ok(())
    }

    fn decode(filter: &ExecutionFilter, row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            execution: filter.clone(),
            signal_id: row.get(0)?,
        })
    }
}
