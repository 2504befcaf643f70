//! Populates tabular display targets from coordinator results.
//!
//! A [`ColumnSpec`] says how each record turns into a row: plain fields,
//! formatted fields, or action buttons bound to the record. The
//! [`TableLoader`] requests a kind from the coordinator and writes the rows
//! into a [`Bound`] display target, optionally keeping the old rows visible
//! until the new ones arrive.

mod columns;
mod loader;
mod table;

pub use columns::{formatters, lookup, ButtonSpec, ButtonStyle, Column, ColumnSpec};
pub use loader::{records, Bound, LoadOptions, TableLoader};
pub use table::{ActionButton, Cell, DisplayTarget, Notice, NoticeLevel, TableModel, NOTICE_LIFETIME};
