//! Warehouse gateway trait and typed SQL parameters.
//!
//! Statements never embed values in their text: every dynamic value is
//! bound separately as a [`SqlValue`]. Table names are the one exception
//! (identifiers cannot be bound) and come from validated configuration.

use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;

use crate::error;

/// Timestamp text format at the SQL boundary.
pub const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A typed SQL parameter or result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlValue::Real(v) => Some(*v),
            SqlValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        SqlValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(value: NaiveDateTime) -> Self {
        SqlValue::Text(value.format(SQL_DATETIME_FORMAT).to_string())
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}

/// SQL-queryable storage behind the pipeline layers.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn Warehouse>`.
pub trait Warehouse: Send + Sync {
    /// Run a read query with bound parameters, returning all result rows.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn query(&self, sql: &str, params: &[SqlValue]) -> error::Result<Vec<Vec<SqlValue>>>;

    /// Run a DML statement with bound parameters, returning affected rows.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn execute(&self, sql: &str, params: &[SqlValue]) -> error::Result<u64>;

    /// Execute a DDL script that (re)creates a table wholesale. The script
    /// may contain multiple statements; it runs as a batch.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn replace_table(&self, script: &str) -> error::Result<()>;

    /// Whether a table with the given name exists.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn table_exists(&self, name: &str) -> error::Result<bool>;

    /// Row count of `table`, optionally restricted by a WHERE fragment with
    /// `?n` placeholders bound from the accompanying parameters.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure.
    fn row_count(&self, table: &str, filter: Option<(&str, &[SqlValue])>) -> error::Result<u64>;

    /// Append an Arrow batch to `table` in one transaction. Returns the
    /// number of rows appended.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError`](crate::WarehouseError) on storage failure
    /// or when a batch column type has no SQL mapping.
    fn append_batch(&self, table: &str, batch: &RecordBatch) -> error::Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (can be used as `dyn Warehouse`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn Warehouse) {}
    }

    #[test]
    fn test_sql_value_accessors() {
        assert_eq!(SqlValue::Integer(7).as_i64(), Some(7));
        assert_eq!(SqlValue::Integer(7).as_f64(), Some(7.0));
        assert_eq!(SqlValue::Real(1.5).as_f64(), Some(1.5));
        assert_eq!(SqlValue::Text("x".into()).as_str(), Some("x"));
        assert_eq!(SqlValue::Null.as_i64(), None);
    }

    #[test]
    fn test_datetime_formats_as_sql_text() {
        let ts = NaiveDateTime::parse_from_str("2024-03-15 08:30:00", SQL_DATETIME_FORMAT).unwrap();
        assert_eq!(
            SqlValue::from(ts),
            SqlValue::Text("2024-03-15 08:30:00".into())
        );
    }

    #[test]
    fn test_option_maps_to_null() {
        let none: Option<i64> = None;
        assert_eq!(SqlValue::from(none), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3i64)), SqlValue::Integer(3));
    }
}
