//! Driver implementation talking to an ODBC data source via `odbc-api`.
//!
//! ```no_run
//! use odbc_cursor::{odbc::OdbcConnection, Connection, Options};
//!
//! let options = Options::default();
//! let driver = OdbcConnection::connect(
//!     "Driver={ODBC Driver 17 for SQL Server};Server=localhost;UID=SA;PWD=My@Test@Password1;",
//!     &options,
//! )?;
//! let connection = Connection::new(driver, options)?;
//! let mut cursor = connection.make_cursor();
//! cursor.prepare("SELECT title, year FROM Movies")?;
//! cursor.execute()?;
//! # Ok::<(), odbc_cursor::Error>(())
//! ```

use std::{
    borrow::Cow,
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, OnceLock},
};

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use odbc_api::{
    buffers::{AnySliceMut, BufferDesc, Item, TextRowSet},
    parameter::InputParameter,
    sys::NULL_DATA,
    Bit, BlockCursor, Connection as OdbcApiConnection, ConnectionOptions, ConnectionTransitions,
    Cursor, CursorImpl, DataType, Environment, IntoParameter, ResultSetMetadata,
    StatementConnection,
};

use crate::{
    driver::{DriverConnection, DriverStatement},
    BufferSize, ColumnDescription, Error, Field, FieldType, NullableField, Options,
};

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();
static ENVIRONMENT_INIT: Mutex<()> = Mutex::new(());

/// The ODBC environment shared by all connections of this process. Created on first use.
fn environment() -> Result<&'static Environment, Error> {
    // Only one environment may be allocated at a time.
    let _guard = ENVIRONMENT_INIT
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(environment) = ENVIRONMENT.get() {
        return Ok(environment);
    }
    let environment = Environment::new()?;
    Ok(ENVIRONMENT.get_or_init(|| environment))
}

type SharedConnection = Arc<Mutex<OdbcApiConnection<'static>>>;

/// Result set cursor owning its statement, which in turn keeps the connection alive.
type OpenCursor = BlockCursor<CursorImpl<StatementConnection<SharedConnection>>, TextRowSet>;

fn lock(connection: &SharedConnection) -> MutexGuard<'_, OdbcApiConnection<'static>> {
    connection
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A connection to an ODBC data source.
pub struct OdbcConnection {
    connection: SharedConnection,
    buffer_size: BufferSize,
    max_str_len: usize,
}

impl OdbcConnection {
    /// Connects using a connection string, e.g.
    /// `"Driver={SQLite3};Database=sqlite-test.db"`. Result sets are fetched with the read buffer
    /// size of `options`.
    pub fn connect(connection_string: &str, options: &Options) -> Result<Self, Error> {
        let connection = environment()?
            .connect_with_connection_string(connection_string, ConnectionOptions::default())?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            buffer_size: options.read_buffer_size,
            max_str_len: options.varchar_max_character_limit,
        })
    }
}

impl DriverConnection for OdbcConnection {
    fn make_statement(&self) -> Result<Box<dyn DriverStatement>, Error> {
        Ok(Box::new(OdbcStatement::new(
            self.connection.clone(),
            self.buffer_size,
            self.max_str_len,
        )))
    }

    fn commit(&self) -> Result<(), Error> {
        lock(&self.connection).commit()?;
        Ok(())
    }

    fn rollback(&self) -> Result<(), Error> {
        lock(&self.connection).rollback()?;
        Ok(())
    }

    fn set_autocommit(&self, enabled: bool) -> Result<(), Error> {
        lock(&self.connection).set_autocommit(enabled)?;
        Ok(())
    }
}

/// Statement on an [`OdbcConnection`].
///
/// A prepared ODBC statement borrows the connection, so it can not outlive a single call.
/// Statements without a result set are therefore prepared again on each execution, with the whole
/// batch of parameter sets bound as arrays and sent in one round trip. Queries are executed into a
/// cursor holding a handle to the shared connection, so their result sets are fetched batch by
/// batch without keeping the connection locked.
struct OdbcStatement {
    connection: SharedConnection,
    buffer_size: BufferSize,
    max_str_len: usize,
    sql: Option<String>,
    num_params: usize,
    /// `true` if the prepared statement describes result columns.
    is_query: bool,
    columns: Vec<ColumnDescription>,
    cursor: Option<OpenCursor>,
    /// Rows fetched from the driver, but not yet handed out.
    fetched: VecDeque<Vec<NullableField>>,
    row_count: i64,
}

impl OdbcStatement {
    fn new(connection: SharedConnection, buffer_size: BufferSize, max_str_len: usize) -> Self {
        Self {
            connection,
            buffer_size,
            max_str_len,
            sql: None,
            num_params: 0,
            is_query: false,
            columns: Vec::new(),
            cursor: None,
            fetched: VecDeque::new(),
            row_count: -1,
        }
    }

    fn reset_result_set(&mut self) {
        self.columns.clear();
        self.cursor = None;
        self.fetched.clear();
        self.row_count = -1;
    }

    /// Executes the statement once for every parameter set of `batch` in a single round trip, or
    /// once without parameters if `batch` is empty. Returns the number of affected rows, `-1` if
    /// unknown.
    fn execute_batch(&self, sql: &str, batch: &[Vec<NullableField>]) -> Result<i64, Error> {
        let connection = lock(&self.connection);
        let mut prepared = connection.prepare(sql)?;
        if batch.is_empty() {
            prepared.execute(())?;
        } else {
            let kinds = parameter_kinds(batch, self.num_params);
            let descriptions = kinds.iter().map(|kind| kind.buffer_desc());
            let mut inserter = prepared.column_inserter(batch.len(), descriptions)?;
            inserter.set_num_rows(batch.len());
            for (index, kind) in kinds.iter().enumerate() {
                fill_parameter_column(inserter.column_mut(index), *kind, batch, index)?;
            }
            inserter.execute()?;
        }
        let row_count = prepared.row_count()?;
        Ok(row_count.map_or(-1, |rows| rows as i64))
    }

    /// Executes a query with a single parameter set and keeps its result set open for fetching.
    fn open_cursor(&mut self, sql: &str, parameter_set: &[NullableField]) -> Result<(), Error> {
        let parameters = parameter_set.iter().map(to_parameter).collect::<Vec<_>>();
        let cursor = self
            .connection
            .clone()
            .into_cursor(sql, parameters.as_slice(), None)
            .map_err(|failed| failed.error)?;
        let Some(mut cursor) = cursor else {
            return Ok(());
        };
        let columns = describe_columns(&mut cursor, self.max_str_len)?;
        let rows_per_batch = self.buffer_size.rows_to_buffer(&columns);
        debug!("Bind text buffer for {rows_per_batch} rows to result set.");
        let buffer = TextRowSet::for_cursor(rows_per_batch, &mut cursor, Some(self.max_str_len))?;
        self.cursor = Some(cursor.bind_buffer(buffer)?);
        self.columns = columns;
        Ok(())
    }

    /// Reads the whole result set of a catalog function. These cursors borrow the connection, so
    /// they can not be kept open across calls.
    fn read_catalog(&mut self, cursor: impl Cursor) -> Result<(), Error> {
        let (columns, rows) = read_all(cursor, self.buffer_size, self.max_str_len)?;
        self.columns = columns;
        self.fetched = rows;
        Ok(())
    }
}

impl DriverStatement for OdbcStatement {
    fn prepare(&mut self, sql: &str) -> Result<(), Error> {
        self.reset_result_set();
        let connection = lock(&self.connection);
        let mut prepared = connection.prepare(sql)?;
        self.num_params = prepared.num_params()?.into();
        self.is_query = prepared.num_result_cols()? > 0;
        self.sql = Some(sql.to_owned());
        Ok(())
    }

    fn num_params(&mut self) -> Result<usize, Error> {
        Ok(self.num_params)
    }

    fn execute(&mut self, batch: &[Vec<NullableField>]) -> Result<(), Error> {
        self.reset_result_set();
        let sql = self
            .sql
            .clone()
            .ok_or(Error::InvalidState("statement executed before being prepared"))?;
        debug!("Execute ODBC statement with {} parameter sets.", batch.len());

        if !self.is_query {
            self.row_count = self.execute_batch(&sql, batch)?;
            return Ok(());
        }
        // Each parameter set of a query creates a result set of its own. Only the one of the last
        // set is kept.
        match batch.split_last() {
            Some((last, earlier)) => {
                if !earlier.is_empty() {
                    self.execute_batch(&sql, earlier)?;
                }
                self.open_cursor(&sql, last)
            }
            None => self.open_cursor(&sql, &[]),
        }
    }

    fn row_count(&mut self) -> Result<i64, Error> {
        Ok(self.row_count)
    }

    fn describe_columns(&mut self) -> Result<Vec<ColumnDescription>, Error> {
        Ok(self.columns.clone())
    }

    fn fetch(&mut self, max_rows: usize) -> Result<Vec<Vec<NullableField>>, Error> {
        while self.fetched.len() < max_rows {
            let Some(cursor) = self.cursor.as_mut() else {
                break;
            };
            let exhausted = match cursor.fetch()? {
                Some(batch) => {
                    self.fetched.extend(parse_batch(batch, &self.columns)?);
                    false
                }
                None => true,
            };
            if exhausted {
                self.cursor = None;
            }
        }
        let num_rows = max_rows.min(self.fetched.len());
        Ok(self.fetched.drain(..num_rows).collect())
    }

    fn sql_tables(
        &mut self,
        catalog_name: &str,
        schema_name: &str,
        table_name: &str,
        table_type: &str,
    ) -> Result<(), Error> {
        self.reset_result_set();
        let connection = self.connection.clone();
        let connection = lock(&connection);
        let cursor = connection.tables(catalog_name, schema_name, table_name, table_type)?;
        self.read_catalog(cursor)
    }

    fn sql_columns(
        &mut self,
        catalog_name: &str,
        schema_name: &str,
        table_name: &str,
        column_name: &str,
    ) -> Result<(), Error> {
        self.reset_result_set();
        let connection = self.connection.clone();
        let connection = lock(&connection);
        let cursor = connection.columns(catalog_name, schema_name, table_name, column_name)?;
        self.read_catalog(cursor)
    }
}

/// How the values of one parameter are bound, when a batch is sent as parameter arrays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParameterKind {
    Bit,
    I64,
    F64,
    Text { max_str_len: usize },
}

impl ParameterKind {
    fn buffer_desc(self) -> BufferDesc {
        match self {
            ParameterKind::Bit => BufferDesc::Bit { nullable: true },
            ParameterKind::I64 => BufferDesc::I64 { nullable: true },
            ParameterKind::F64 => BufferDesc::F64 { nullable: true },
            ParameterKind::Text { max_str_len } => BufferDesc::Text { max_str_len },
        }
    }
}

/// Chooses a buffer for each parameter, based on the fields in its position. Parameters holding
/// fields of different types, or only `NULL`, are sent as text.
fn parameter_kinds(batch: &[Vec<NullableField>], num_params: usize) -> Vec<ParameterKind> {
    (0..num_params)
        .map(|index| {
            let fields = batch.iter().filter_map(|set| set[index].as_ref());
            let mut kind = None;
            for field in fields.clone() {
                let current = match field {
                    Field::Boolean(_) => ParameterKind::Bit,
                    Field::Integer(_) => ParameterKind::I64,
                    Field::FloatingPoint(_) => ParameterKind::F64,
                    _ => ParameterKind::Text { max_str_len: 0 },
                };
                kind = match kind {
                    None => Some(current),
                    Some(previous) if previous == current => Some(previous),
                    Some(_) => Some(ParameterKind::Text { max_str_len: 0 }),
                };
            }
            match kind {
                Some(ParameterKind::Text { .. }) | None => {
                    let max_str_len = fields.map(|field| as_text(field).len()).max();
                    ParameterKind::Text {
                        max_str_len: max_str_len.unwrap_or(0).max(1),
                    }
                }
                Some(kind) => kind,
            }
        })
        .collect()
}

fn fill_parameter_column(
    column: AnySliceMut<'_>,
    kind: ParameterKind,
    batch: &[Vec<NullableField>],
    index: usize,
) -> Result<(), Error> {
    let fields = batch.iter().map(|set| set[index].as_ref());
    match kind {
        ParameterKind::Bit => write_nullable(
            column,
            fields.map(|field| match field {
                Some(Field::Boolean(value)) => Some(Bit::from_bool(*value)),
                _ => None,
            }),
        ),
        ParameterKind::I64 => write_nullable(
            column,
            fields.map(|field| match field {
                Some(Field::Integer(value)) => Some(*value),
                _ => None,
            }),
        ),
        ParameterKind::F64 => write_nullable(
            column,
            fields.map(|field| match field {
                Some(Field::FloatingPoint(value)) => Some(*value),
                _ => None,
            }),
        ),
        ParameterKind::Text { .. } => {
            let mut writer = column.as_text_view().ok_or(Error::InvalidState(
                "text parameter bound to a buffer of a different type",
            ))?;
            for (row, field) in fields.enumerate() {
                let text = field.map(as_text);
                writer.set_cell(row, text.as_deref().map(str::as_bytes));
            }
            Ok(())
        }
    }
}

fn write_nullable<T: Item>(
    column: AnySliceMut<'_>,
    cells: impl Iterator<Item = Option<T>>,
) -> Result<(), Error> {
    let mut writer = column.as_nullable_slice::<T>().ok_or(Error::InvalidState(
        "parameter bound to a buffer of a different type",
    ))?;
    let (values, indicators) = writer.raw_values();
    for (row, cell) in cells.enumerate() {
        match cell {
            Some(value) => {
                values[row] = value;
                indicators[row] = 0;
            }
            None => indicators[row] = NULL_DATA,
        }
    }
    Ok(())
}

/// Text representation of a field, as understood by the data source.
fn as_text(field: &Field) -> Cow<'_, str> {
    match field {
        Field::Boolean(true) => Cow::Borrowed("1"),
        Field::Boolean(false) => Cow::Borrowed("0"),
        Field::Integer(value) => Cow::Owned(value.to_string()),
        Field::FloatingPoint(value) => Cow::Owned(value.to_string()),
        Field::String(value) => Cow::Borrowed(value),
        // Text is understood by every driver, native date structs are not.
        Field::Date(value) => Cow::Owned(value.format("%Y-%m-%d").to_string()),
        Field::Timestamp(value) => Cow::Owned(value.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
    }
}

fn to_parameter(field: &NullableField) -> Box<dyn InputParameter> {
    match field {
        None => Box::new(Option::<String>::None.into_parameter()),
        Some(Field::Boolean(value)) => Box::new(Bit::from_bool(*value)),
        Some(Field::Integer(value)) => Box::new(*value),
        Some(Field::FloatingPoint(value)) => Box::new(*value),
        Some(field) => Box::new(as_text(field).into_owned().into_parameter()),
    }
}

fn describe_columns(
    cursor: &mut impl ResultSetMetadata,
    max_str_len: usize,
) -> Result<Vec<ColumnDescription>, Error> {
    let num_cols: u16 = cursor.num_result_cols()?.try_into().unwrap_or(0);
    let mut columns = Vec::with_capacity(num_cols.into());
    for column_number in 1..=num_cols {
        let mut description = odbc_api::ColumnDescription::default();
        cursor.describe_col(column_number, &mut description)?;
        let name = description
            .name_to_string()
            .map_err(|error| Error::Driver(error.to_string()))?;
        let data_type = field_type(description.data_type);
        let mut column = ColumnDescription::new(name, data_type)
            .with_nullable(description.could_be_nullable());
        if data_type == FieldType::String {
            let octet_length = cursor.col_octet_length(column_number)?;
            let display_size = cursor.col_display_size(column_number)?;
            if let Some(length) = string_length(octet_length, display_size, max_str_len) {
                column = column.with_max_length(length);
            }
        }
        columns.push(column);
    }
    Ok(columns)
}

/// Maximum length in bytes of a string column. Prefers the octet length over the display size,
/// since the latter counts characters. Drivers report zero or less if they do not know.
fn string_length(octet_length: isize, display_size: isize, max_str_len: usize) -> Option<usize> {
    [octet_length, display_size]
        .into_iter()
        .find_map(|length| usize::try_from(length).ok().filter(|&length| length > 0))
        .map(|length| length.min(max_str_len))
}

/// Reads the column descriptions and all rows of the result set, in batches sized by
/// `buffer_size`.
fn read_all(
    mut cursor: impl Cursor,
    buffer_size: BufferSize,
    max_str_len: usize,
) -> Result<(Vec<ColumnDescription>, VecDeque<Vec<NullableField>>), Error> {
    let columns = describe_columns(&mut cursor, max_str_len)?;
    let mut rows = VecDeque::new();
    if columns.is_empty() {
        return Ok((columns, rows));
    }
    let rows_per_batch = buffer_size.rows_to_buffer(&columns);
    let buffer = TextRowSet::for_cursor(rows_per_batch, &mut cursor, Some(max_str_len))?;
    let mut block_cursor = cursor.bind_buffer(buffer)?;
    while let Some(batch) = block_cursor.fetch()? {
        rows.extend(parse_batch(batch, &columns)?);
    }
    Ok((columns, rows))
}

fn parse_batch(
    batch: &TextRowSet,
    columns: &[ColumnDescription],
) -> Result<Vec<Vec<NullableField>>, Error> {
    (0..batch.num_rows())
        .map(|row_index| {
            columns
                .iter()
                .enumerate()
                .map(|(col_index, column)| {
                    parse_field(batch.at(col_index, row_index), column.data_type)
                })
                .collect()
        })
        .collect()
}

/// Field type used to represent values of a column with the given SQL data type.
fn field_type(data_type: DataType) -> FieldType {
    match data_type {
        DataType::Bit => FieldType::Boolean,
        DataType::TinyInt | DataType::SmallInt | DataType::Integer | DataType::BigInt => {
            FieldType::Integer
        }
        DataType::Numeric { precision, scale } | DataType::Decimal { precision, scale }
            if scale == 0 && precision < 19 =>
        {
            FieldType::Integer
        }
        DataType::Numeric { .. }
        | DataType::Decimal { .. }
        | DataType::Real
        | DataType::Float { .. }
        | DataType::Double => FieldType::FloatingPoint,
        DataType::Date => FieldType::Date,
        DataType::Timestamp { .. } => FieldType::Timestamp,
        _ => FieldType::String,
    }
}

/// Parses the text representation of a value, as fetched from the driver.
fn parse_field(text: Option<&[u8]>, field_type: FieldType) -> Result<NullableField, Error> {
    let Some(bytes) = text else {
        return Ok(None);
    };
    let text: Cow<'_, str> = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    let invalid = |target: &'static str| Error::TypeConversion {
        value: format!("'{trimmed}'"),
        target,
    };
    let field = match field_type {
        FieldType::Boolean => match trimmed {
            "1" => Field::Boolean(true),
            "0" => Field::Boolean(false),
            _ => return Err(invalid("boolean")),
        },
        FieldType::Integer => Field::Integer(trimmed.parse().map_err(|_| invalid("integer"))?),
        FieldType::FloatingPoint => {
            Field::FloatingPoint(trimmed.parse().map_err(|_| invalid("floating point"))?)
        }
        FieldType::String => Field::String(text.into_owned()),
        FieldType::Date => Field::Date(
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| invalid("date"))?,
        ),
        FieldType::Timestamp => Field::Timestamp(
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(|_| invalid("timestamp"))?,
        ),
    };
    Ok(Some(field))
}
