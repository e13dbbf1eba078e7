//! Warehouse gateway for the tripline pipeline.
//!
//! Provides the [`Warehouse`] trait (the only surface the rest of the
//! system uses to talk to the SQL store), a [`SqliteWarehouse`]
//! implementation, and the DDL scripts for every pipeline table.

pub mod error;
pub mod gateway;
pub mod schema;
pub mod sqlite;

pub use error::WarehouseError;
pub use gateway::{SqlValue, Warehouse};
pub use sqlite::SqliteWarehouse;
