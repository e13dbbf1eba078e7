//! SQLite-backed warehouse implementation.

use std::path::Path;
use std::sync::Mutex;

use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
    TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::DateTime;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::Connection;

use crate::error::{Result, WarehouseError};
use crate::gateway::{SqlValue, Warehouse, SQL_DATETIME_FORMAT};

pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
}

impl SqliteWarehouse {
    /// Open or create a SQLite warehouse database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the parent directory cannot be
    /// created or the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory warehouse (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`] when the connection cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| WarehouseError::LockPoisoned)
    }
}

impl rusqlite::ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            SqlValue::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            SqlValue::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
        })
    }
}

fn cell_from_ref(value: ValueRef<'_>) -> Result<SqlValue> {
    match value {
        ValueRef::Null => Ok(SqlValue::Null),
        ValueRef::Integer(v) => Ok(SqlValue::Integer(v)),
        ValueRef::Real(v) => Ok(SqlValue::Real(v)),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| WarehouseError::Decode(format!("invalid utf-8 in text cell: {e}")))?;
            Ok(SqlValue::Text(text.to_string()))
        }
        ValueRef::Blob(_) => Err(WarehouseError::Decode(
            "blob columns are not part of the warehouse model".to_string(),
        )),
    }
}

fn row_to_values(row: &rusqlite::Row<'_>) -> Result<Vec<SqlValue>> {
    let column_count = row.as_ref().column_count();
    let mut values = Vec::with_capacity(column_count);
    for idx in 0..column_count {
        values.push(cell_from_ref(row.get_ref(idx)?)?);
    }
    Ok(values)
}

/// Convert one Arrow cell to its SQL representation. Timestamps are
/// rendered as `YYYY-MM-DD HH:MM:SS` text so date-range filters compare
/// lexicographically.
fn cell_from_batch(column: &dyn Array, row: usize) -> Result<SqlValue> {
    if column.is_null(row) {
        return Ok(SqlValue::Null);
    }
    let any = column.as_any();
    let unsupported = || {
        WarehouseError::Decode(format!(
            "unsupported column type {} in batch append",
            column.data_type()
        ))
    };
    match column.data_type() {
        DataType::Int64 => {
            let array = any.downcast_ref::<Int64Array>().ok_or_else(unsupported)?;
            Ok(SqlValue::Integer(array.value(row)))
        }
        DataType::Int32 => {
            let array = any.downcast_ref::<Int32Array>().ok_or_else(unsupported)?;
            Ok(SqlValue::Integer(i64::from(array.value(row))))
        }
        DataType::Float64 => {
            let array = any.downcast_ref::<Float64Array>().ok_or_else(unsupported)?;
            Ok(SqlValue::Real(array.value(row)))
        }
        DataType::Float32 => {
            let array = any.downcast_ref::<Float32Array>().ok_or_else(unsupported)?;
            Ok(SqlValue::Real(f64::from(array.value(row))))
        }
        DataType::Utf8 => {
            let array = any.downcast_ref::<StringArray>().ok_or_else(unsupported)?;
            Ok(SqlValue::Text(array.value(row).to_string()))
        }
        DataType::Timestamp(unit, _) => {
            let datetime = match unit {
                TimeUnit::Second => {
                    let array = any.downcast_ref::<TimestampSecondArray>().ok_or_else(unsupported)?;
                    DateTime::from_timestamp(array.value(row), 0)
                }
                TimeUnit::Millisecond => {
                    let array = any
                        .downcast_ref::<TimestampMillisecondArray>()
                        .ok_or_else(unsupported)?;
                    DateTime::from_timestamp_millis(array.value(row))
                }
                TimeUnit::Microsecond => {
                    let array = any
                        .downcast_ref::<TimestampMicrosecondArray>()
                        .ok_or_else(unsupported)?;
                    DateTime::from_timestamp_micros(array.value(row))
                }
                TimeUnit::Nanosecond => {
                    let array = any
                        .downcast_ref::<TimestampNanosecondArray>()
                        .ok_or_else(unsupported)?;
                    Some(DateTime::from_timestamp_nanos(array.value(row)))
                }
            }
            .ok_or_else(|| {
                WarehouseError::Decode(format!("timestamp out of range in batch row {row}"))
            })?;
            Ok(SqlValue::Text(
                datetime.naive_utc().format(SQL_DATETIME_FORMAT).to_string(),
            ))
        }
        _ => Err(unsupported()),
    }
}

impl Warehouse for SqliteWarehouse {
    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_values(row)?);
        }
        Ok(out)
    }

    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let conn = self.lock()?;
        let affected = conn.execute(sql, rusqlite::params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn replace_table(&self, script: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(script)?;
        Ok(())
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn row_count(&self, table: &str, filter: Option<(&str, &[SqlValue])>) -> Result<u64> {
        let conn = self.lock()?;
        let (sql, params) = match filter {
            Some((fragment, params)) => {
                (format!("SELECT COUNT(*) FROM {table} WHERE {fragment}"), params)
            }
            None => (format!("SELECT COUNT(*) FROM {table}"), &[][..]),
        };
        let count: i64 = conn.query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| {
            row.get(0)
        })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn append_batch(&self, table: &str, batch: &RecordBatch) -> Result<u64> {
        if batch.num_rows() == 0 {
            return Ok(0);
        }
        let columns: Vec<&str> = batch
            .schema_ref()
            .fields()
            .iter()
            .map(|field| field.name().as_str())
            .collect::<Vec<_>>();
        let placeholders: Vec<String> = (1..=columns.len()).map(|n| format!("?{n}")).collect();
        let insert_sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&insert_sql)?;
            for row in 0..batch.num_rows() {
                let mut values = Vec::with_capacity(columns.len());
                for column in batch.columns() {
                    values.push(cell_from_batch(column.as_ref(), row)?);
                }
                stmt.execute(rusqlite::params_from_iter(values.iter()))?;
            }
        }
        tx.commit()?;
        Ok(batch.num_rows() as u64)
    }
}
