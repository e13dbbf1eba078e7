//! Run-ledger persistence for the tripline pipeline.
//!
//! Provides the [`RunLedger`] trait and a [`WarehouseLedger`]
//! implementation that stores run history through the warehouse gateway.

pub mod ledger;
pub mod warehouse_ledger;

pub use ledger::RunLedger;
pub use warehouse_ledger::WarehouseLedger;
