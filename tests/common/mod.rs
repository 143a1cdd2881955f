//! Scripted in-memory driver. Answers statements with canned responses and records every call, so
//! tests can observe what the cursor layer forwards to the driver.
#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};

use lazy_static::lazy_static;
use odbc_cursor::{
    driver::{DriverConnection, DriverStatement},
    ColumnDescription, Connection, Error, Field, FieldType, NullableField, Options,
};

lazy_static! {
    /// Columns returned by `SELECT title, year FROM Movies`.
    pub static ref MOVIE_COLUMNS: Vec<ColumnDescription> = vec![
        ColumnDescription::new("title", FieldType::String).with_max_length(255),
        ColumnDescription::new("year", FieldType::Integer),
    ];
}

pub const SELECT_MOVIES: &str = "SELECT title, year FROM Movies";
pub const INSERT_MOVIE: &str = "INSERT INTO Movies (title, year) VALUES (?, ?)";

/// Sets up `env_logger`. Use `RUST_LOG=odbc_cursor=debug cargo test` to see the log output.
pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// How the driver answers a statement.
#[derive(Clone, Debug, Default)]
pub struct Response {
    pub num_params: usize,
    /// Empty if the statement creates no result set.
    pub columns: Vec<ColumnDescription>,
    pub rows: Vec<Vec<NullableField>>,
    pub rows_affected_per_set: i64,
}

impl Response {
    pub fn select(columns: Vec<ColumnDescription>, rows: Vec<Vec<NullableField>>) -> Self {
        Self {
            num_params: 0,
            columns,
            rows,
            rows_affected_per_set: -1,
        }
    }

    pub fn insert(num_params: usize) -> Self {
        Self {
            num_params,
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected_per_set: 1,
        }
    }
}

pub fn movies() -> Response {
    Response::select(
        MOVIE_COLUMNS.clone(),
        vec![
            vec![Some(Field::from("Jurassic Park")), Some(Field::Integer(1993))],
            vec![Some(Field::from("2001: A Space Odyssey")), Some(Field::Integer(1968))],
            vec![Some(Field::from("Interstellar")), None],
        ],
    )
}

/// Everything the driver has been asked to do.
#[derive(Debug, Default)]
pub struct CallLog {
    pub statements_made: usize,
    pub prepared: Vec<String>,
    /// Parameter sets of each executed batch.
    pub batches: Vec<Vec<Vec<NullableField>>>,
    pub catalog_calls: Vec<String>,
    pub commits: usize,
    pub rollbacks: usize,
    pub autocommit: Option<bool>,
}

impl CallLog {
    /// All parameter sets sent to the driver, in order.
    pub fn parameter_sets(&self) -> Vec<Vec<NullableField>> {
        self.batches.iter().flatten().cloned().collect()
    }
}

#[derive(Clone, Default)]
pub struct ScriptedDriver {
    responses: HashMap<String, Response>,
    tables: Response,
    columns: Response,
    log: Arc<Mutex<CallLog>>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `sql` with `response`. Preparing any other text fails.
    pub fn on(mut self, sql: &str, response: Response) -> Self {
        self.responses.insert(sql.to_owned(), response);
        self
    }

    pub fn with_tables(mut self, response: Response) -> Self {
        self.tables = response;
        self
    }

    pub fn with_columns(mut self, response: Response) -> Self {
        self.columns = response;
        self
    }

    /// Handle to the call log, which stays valid after the driver moved into a connection.
    pub fn log(&self) -> Arc<Mutex<CallLog>> {
        self.log.clone()
    }

    pub fn connect(self, options: Options) -> Arc<Connection> {
        Connection::new(self, options).unwrap()
    }
}

fn record(log: &Arc<Mutex<CallLog>>) -> MutexGuard<'_, CallLog> {
    log.lock().unwrap()
}

impl DriverConnection for ScriptedDriver {
    fn make_statement(&self) -> Result<Box<dyn DriverStatement>, Error> {
        record(&self.log).statements_made += 1;
        Ok(Box::new(ScriptedStatement {
            driver: self.clone(),
            prepared: None,
            columns: Vec::new(),
            rows: VecDeque::new(),
            row_count: -1,
        }))
    }

    fn commit(&self) -> Result<(), Error> {
        record(&self.log).commits += 1;
        Ok(())
    }

    fn rollback(&self) -> Result<(), Error> {
        record(&self.log).rollbacks += 1;
        Ok(())
    }

    fn set_autocommit(&self, enabled: bool) -> Result<(), Error> {
        record(&self.log).autocommit = Some(enabled);
        Ok(())
    }
}

struct ScriptedStatement {
    driver: ScriptedDriver,
    prepared: Option<Response>,
    columns: Vec<ColumnDescription>,
    rows: VecDeque<Vec<NullableField>>,
    row_count: i64,
}

impl ScriptedStatement {
    fn serve(&mut self, response: &Response) {
        self.columns = response.columns.clone();
        self.rows = response.rows.iter().cloned().collect();
    }
}

impl DriverStatement for ScriptedStatement {
    fn prepare(&mut self, sql: &str) -> Result<(), Error> {
        record(&self.driver.log).prepared.push(sql.to_owned());
        let response = self
            .driver
            .responses
            .get(sql)
            .cloned()
            .ok_or_else(|| Error::Driver(format!("Syntax error in '{sql}'")))?;
        self.prepared = Some(response);
        Ok(())
    }

    fn num_params(&mut self) -> Result<usize, Error> {
        self.prepared
            .as_ref()
            .map(|response| response.num_params)
            .ok_or(Error::Driver("Function sequence error".to_owned()))
    }

    fn execute(&mut self, batch: &[Vec<NullableField>]) -> Result<(), Error> {
        record(&self.driver.log).batches.push(batch.to_vec());
        let response = self
            .prepared
            .clone()
            .ok_or(Error::Driver("Function sequence error".to_owned()))?;
        if batch.is_empty() && response.num_params != 0 {
            return Err(Error::Driver("COUNT field incorrect".to_owned()));
        }
        self.serve(&response);
        self.row_count = response.rows_affected_per_set * batch.len().max(1) as i64;
        Ok(())
    }

    fn row_count(&mut self) -> Result<i64, Error> {
        Ok(self.row_count)
    }

    fn describe_columns(&mut self) -> Result<Vec<ColumnDescription>, Error> {
        Ok(self.columns.clone())
    }

    fn fetch(&mut self, max_rows: usize) -> Result<Vec<Vec<NullableField>>, Error> {
        let num_rows = max_rows.min(self.rows.len());
        Ok(self.rows.drain(..num_rows).collect())
    }

    fn sql_tables(
        &mut self,
        catalog_name: &str,
        schema_name: &str,
        table_name: &str,
        table_type: &str,
    ) -> Result<(), Error> {
        record(&self.driver.log).catalog_calls.push(format!(
            "tables({catalog_name},{schema_name},{table_name},{table_type})"
        ));
        let response = self.driver.tables.clone();
        self.serve(&response);
        Ok(())
    }

    fn sql_columns(
        &mut self,
        catalog_name: &str,
        schema_name: &str,
        table_name: &str,
        column_name: &str,
    ) -> Result<(), Error> {
        record(&self.driver.log).catalog_calls.push(format!(
            "columns({catalog_name},{schema_name},{table_name},{column_name})"
        ));
        let response = self.driver.columns.clone();
        self.serve(&response);
        Ok(())
    }
}
