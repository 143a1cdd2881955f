//! # ODBC cursors for data frames
//!
//! Binds the column vectors of a host runtime (think of the data frames of a statistical language)
//! to the parameter sets of prepared statements, and materializes result sets back into such
//! columns.
//!
//! A [`Connection`] wraps a driver connection (see [`driver`]) and is shared between any number of
//! [`Cursor`]s. The cursor created last is the active one. Each cursor prepares one [`Query`] at a
//! time, feeds it parameter sets and fetches its results eagerly into a [`DataFrame`].
//!
//! With the `odbc` feature enabled, [`odbc::OdbcConnection`] connects to any ODBC data source.

mod buffer_size;
mod column_description;
mod connection;
mod cursor;
mod error;
mod field;
mod options;
mod query;

pub mod driver;
pub mod host;
#[cfg(feature = "odbc")]
pub mod odbc;
pub mod result_set;

pub use self::{
    buffer_size::BufferSize,
    column_description::ColumnDescription,
    connection::Connection,
    cursor::Cursor,
    error::Error,
    field::{Field, FieldType, NullableField},
    host::{DataFrame, HostType, HostVector},
    options::Options,
    query::Query,
};
// Reexports
/// Reexports `chrono`, so applications construct date and timestamp fields with the same version
/// as this crate.
pub use chrono;
