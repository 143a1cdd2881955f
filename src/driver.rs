//! Traits a database driver implements in order to be used by [`crate::Connection`] and
//! [`crate::Cursor`].
//!
//! The cursor layer does not talk to the data source itself. It forwards calls to a
//! [`DriverConnection`], which acts as a factory for [`DriverStatement`]s. With the `odbc` feature
//! enabled, [`crate::odbc::OdbcConnection`] implements these traits on top of an ODBC driver
//! manager.

use crate::{ColumnDescription, Error, NullableField};

/// The connection to a data source, as seen by the cursor layer.
///
/// Shared by all cursors created from the same [`crate::Connection`], hence `Send` and `Sync`.
/// Implementations are expected to synchronize access to the underlying handle themselves.
pub trait DriverConnection: Send + Sync {
    /// Allocate a new statement on this connection. Each prepared query and each catalog call
    /// gets its own statement.
    fn make_statement(&self) -> Result<Box<dyn DriverStatement>, Error>;

    /// Commit the current transaction.
    fn commit(&self) -> Result<(), Error>;

    /// Roll back the current transaction.
    fn rollback(&self) -> Result<(), Error>;

    /// Enable or disable commiting after each statement.
    fn set_autocommit(&self, enabled: bool) -> Result<(), Error>;
}

/// A statement allocated on a [`DriverConnection`].
///
/// Statements are either prepared and executed with parameter sets, or used for a single catalog
/// call. Either way, they may afterwards hold a result set, which is described by
/// [`DriverStatement::describe_columns`] and consumed with [`DriverStatement::fetch`].
pub trait DriverStatement: Send {
    /// Prepares an SQL statement. Syntax errors are reported here, or at latest during
    /// execution, depending on the driver.
    ///
    /// # Parameters
    ///
    /// * `sql`: The text representation of the SQL statement. E.g. "SELECT * FROM my_table;". `?`
    ///   may be used as a placeholder in the statement text, to be replaced with parameters during
    ///   execution.
    fn prepare(&mut self, sql: &str) -> Result<(), Error>;

    /// Number of placeholders in the prepared statement.
    fn num_params(&mut self) -> Result<usize, Error>;

    /// Executes the prepared statement once for each parameter set in `batch`. An empty batch
    /// executes the statement once without binding any parameters.
    ///
    /// Only a result set created by the last parameter set is kept.
    fn execute(&mut self, batch: &[Vec<NullableField>]) -> Result<(), Error>;

    /// Number of rows affected by the last execution. For a batch of parameter sets this is the
    /// total over all sets in the batch. `-1` if the driver does not know.
    fn row_count(&mut self) -> Result<i64, Error>;

    /// Columns of the current result set. Empty if the last execution did not create a result
    /// set.
    fn describe_columns(&mut self) -> Result<Vec<ColumnDescription>, Error>;

    /// Fetches the next rows of the current result set. Returns at most `max_rows` rows, each with
    /// one field per column. An empty vector indicates the result set is consumed.
    fn fetch(&mut self, max_rows: usize) -> Result<Vec<Vec<NullableField>>, Error>;

    /// Creates a result set listing the tables matching the filters. Empty filters match
    /// everything.
    fn sql_tables(
        &mut self,
        catalog_name: &str,
        schema_name: &str,
        table_name: &str,
        table_type: &str,
    ) -> Result<(), Error>;

    /// Creates a result set listing the columns matching the filters. Empty filters match
    /// everything.
    fn sql_columns(
        &mut self,
        catalog_name: &str,
        schema_name: &str,
        table_name: &str,
        column_name: &str,
    ) -> Result<(), Error>;
}
