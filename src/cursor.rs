use std::sync::Arc;

use log::debug;

use crate::{
    connection::CursorToken,
    host::{self, DataFrame, HostVector},
    result_set::BoundResultSet,
    BufferSize, Connection, Error, NullableField, Query,
};

/// Executes queries on a shared [`Connection`] and holds the materialized result of the last one.
///
/// ```
/// # use odbc_cursor::{Connection, Error};
/// # use std::sync::Arc;
/// fn list_titles(connection: &Arc<Connection>) -> Result<(), Error> {
///     let mut cursor = connection.make_cursor();
///     cursor.prepare("SELECT title FROM Movies WHERE year > ?")?;
///     cursor.add_parameter_set(&[Some(1990.into())])?;
///     cursor.execute()?;
///     if let Some(frame) = cursor.get_result_set() {
///         println!("{} movies", frame.num_rows());
///     }
///     Ok(())
/// }
/// ```
pub struct Cursor {
    connection: Arc<Connection>,
    buffer_size: BufferSize,
    parameter_sets_to_buffer: usize,
    use_async_io: bool,
    query: Option<Query>,
    results: Option<DataFrame>,
    token: Arc<CursorToken>,
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.connection.release_cursor(&self.token);
    }
}

impl Cursor {
    /// Creates a cursor and registers it as the active cursor of `connection`.
    ///
    /// # Parameters
    ///
    /// * `buffer_size`: Size of the buffers result sets are fetched into.
    /// * `parameter_sets_to_buffer`: Number of parameter sets sent to the data source in one round
    ///   trip.
    /// * `use_async_io`: Fetch the next batch of a result set while the current one is converted.
    pub fn new(
        connection: Arc<Connection>,
        buffer_size: BufferSize,
        parameter_sets_to_buffer: usize,
        use_async_io: bool,
    ) -> Self {
        let token = Arc::new(CursorToken);
        connection.set_active_cursor(&token);
        Self {
            connection,
            buffer_size,
            parameter_sets_to_buffer,
            use_async_io,
            query: None,
            results: None,
            token,
        }
    }

    /// Prepares an SQL statement on a new statement of the connection. Discards the previous query
    /// and its results, even if preparing the new one fails.
    pub fn prepare(&mut self, sql: &str) -> Result<(), Error> {
        self.results = None;
        self.query = None;
        debug!("Prepare statement: {sql}");
        let mut statement = self.connection.get_connection().make_statement()?;
        statement.prepare(sql)?;
        self.query = Some(Query::new(
            statement,
            self.buffer_size,
            self.parameter_sets_to_buffer,
            self.use_async_io,
        )?);
        Ok(())
    }

    /// Executes the prepared query. A result set created by the query is fetched completely and
    /// available afterwards via [`Self::get_result_set`].
    pub fn execute(&mut self) -> Result<(), Error> {
        self.results = None;
        let query = self
            .query
            .as_mut()
            .ok_or(Error::InvalidState("execute requires a prepared statement"))?;
        query.execute()?;
        if let Some(result_set) = query.get_results()? {
            let frame = host::materialize(result_set)?;
            debug!(
                "Materialized result set with {} rows and {} columns.",
                frame.num_rows(),
                frame.num_cols()
            );
            self.results = Some(frame);
        }
        Ok(())
    }

    /// Result of the last execution. `None` if it did not create a result set, e.g. an `INSERT`
    /// statement.
    pub fn get_result_set(&self) -> Option<&DataFrame> {
        self.results.as_ref()
    }

    /// Adds one parameter set to the prepared query. Fields must match the placeholders of the
    /// statement in number and order.
    pub fn add_parameter_set(&mut self, parameter_set: &[NullableField]) -> Result<(), Error> {
        self.query_mut()?.add_parameter_set(parameter_set)
    }

    /// Adds one parameter set for each row of `frame`. The type of each column is inferred once.
    pub fn add_parameter_frame(&mut self, frame: &DataFrame) -> Result<(), Error> {
        let query = self.query_mut()?;
        host::for_each_parameter_set(frame, |parameter_set| {
            query.add_parameter_set(parameter_set)
        })
    }

    /// Adds a single parameter set. Each value must be a host vector of length one, whose type is
    /// inferred individually.
    pub fn add_parameter_row(&mut self, row: &[HostVector]) -> Result<(), Error> {
        let parameter_set = host::parameter_set_from_row(row)?;
        self.add_parameter_set(&parameter_set)
    }

    /// Number of rows affected by the last execution.
    pub fn get_row_count(&self) -> Result<i64, Error> {
        self.query
            .as_ref()
            .map(Query::get_row_count)
            .ok_or(Error::InvalidState("row count requires a prepared statement"))
    }

    /// The connection this cursor has been created by.
    pub fn get_connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// The prepared query, if any.
    pub fn get_query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Lists the tables matching the filters. Uses a statement of its own, so neither the prepared
    /// query nor its results are affected.
    pub fn sql_tables(
        &self,
        catalog_name: &str,
        schema_name: &str,
        table_name: &str,
        table_type: &str,
    ) -> Result<DataFrame, Error> {
        debug!(
            "List tables. Catalog: '{catalog_name}', schema: '{schema_name}', \
            table: '{table_name}', type: '{table_type}'"
        );
        let mut statement = self.connection.get_connection().make_statement()?;
        statement.sql_tables(catalog_name, schema_name, table_name, table_type)?;
        self.fetch_catalog(BoundResultSet::new(statement.as_mut(), self.buffer_size)?)
    }

    /// Lists the columns matching the filters. Uses a statement of its own, so neither the
    /// prepared query nor its results are affected.
    pub fn sql_columns(
        &self,
        catalog_name: &str,
        schema_name: &str,
        table_name: &str,
        column_name: &str,
    ) -> Result<DataFrame, Error> {
        debug!(
            "List columns. Catalog: '{catalog_name}', schema: '{schema_name}', \
            table: '{table_name}', column: '{column_name}'"
        );
        let mut statement = self.connection.get_connection().make_statement()?;
        statement.sql_columns(catalog_name, schema_name, table_name, column_name)?;
        self.fetch_catalog(BoundResultSet::new(statement.as_mut(), self.buffer_size)?)
    }

    /// `true` if this is the active cursor of its connection.
    pub fn is_active(&self) -> bool {
        self.connection.is_active_cursor(&self.token)
    }

    fn fetch_catalog(&self, result_set: Option<BoundResultSet<'_>>) -> Result<DataFrame, Error> {
        match result_set {
            Some(result_set) => host::materialize(result_set),
            None => Ok(DataFrame::empty()),
        }
    }

    fn query_mut(&mut self) -> Result<&mut Query, Error> {
        self.query
            .as_mut()
            .ok_or(Error::InvalidState("parameter sets require a prepared statement"))
    }
}
