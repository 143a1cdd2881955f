use std::{sync::mpsc::sync_channel, thread};

use log::trace;

use crate::{driver::DriverStatement, BufferSize, ColumnDescription, Error, NullableField};

/// A batch of rows fetched in one round trip, stored column by column.
#[derive(Clone, Debug, PartialEq)]
pub struct RowBatch {
    columns: Vec<Vec<NullableField>>,
    num_rows: usize,
}

impl RowBatch {
    /// Transposes the rows returned by a driver into columns. Each field is checked against the
    /// type of its column.
    pub(crate) fn from_rows(
        descriptions: &[ColumnDescription],
        rows: Vec<Vec<NullableField>>,
    ) -> Result<Self, Error> {
        let num_rows = rows.len();
        let mut columns: Vec<Vec<NullableField>> = descriptions
            .iter()
            .map(|_| Vec::with_capacity(num_rows))
            .collect();
        for row in rows {
            if row.len() != descriptions.len() {
                return Err(Error::Driver(format!(
                    "Fetched row with {} fields from a result set with {} columns.",
                    row.len(),
                    descriptions.len()
                )));
            }
            for (index, field) in row.into_iter().enumerate() {
                if let Some(value) = &field {
                    let expected = descriptions[index].data_type;
                    if value.field_type() != expected {
                        return Err(Error::ColumnTypeMismatch {
                            column: index,
                            expected,
                            actual: value.field_type(),
                        });
                    }
                }
                columns[index].push(field);
            }
        }
        Ok(Self { columns, num_rows })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    /// Fields of a single column. Zero based index.
    pub fn column(&self, index: usize) -> &[NullableField] {
        &self.columns[index]
    }

    /// Transfer ownership of the column values.
    pub fn into_columns(self) -> Vec<Vec<NullableField>> {
        self.columns
    }
}

/// A result set fetched batch by batch from a statement. The number of rows per batch is derived
/// from the [`BufferSize`] and the width of the columns.
pub struct BoundResultSet<'s> {
    statement: &'s mut dyn DriverStatement,
    columns: Vec<ColumnDescription>,
    rows_per_batch: usize,
    double_buffered: bool,
}

impl<'s> BoundResultSet<'s> {
    /// Describes the result set of `statement`. `None` if the statement does not hold a result
    /// set, i.e. it reports no columns.
    pub fn new(
        statement: &'s mut dyn DriverStatement,
        buffer_size: BufferSize,
    ) -> Result<Option<Self>, Error> {
        let columns = statement.describe_columns()?;
        if columns.is_empty() {
            return Ok(None);
        }
        let rows_per_batch = buffer_size.rows_to_buffer(&columns);
        Ok(Some(Self {
            statement,
            columns,
            rows_per_batch,
            double_buffered: false,
        }))
    }

    /// Like [`Self::new`], but [`Self::for_each_batch`] fetches the next batch on a separate thread
    /// while the current one is processed. Since two batches are in flight, each uses half the
    /// buffer size.
    pub fn new_double_buffered(
        statement: &'s mut dyn DriverStatement,
        buffer_size: BufferSize,
    ) -> Result<Option<Self>, Error> {
        let result_set = Self::new(statement, buffer_size)?;
        Ok(result_set.map(|mut result_set| {
            result_set.rows_per_batch = (result_set.rows_per_batch / 2).max(1);
            result_set.double_buffered = true;
            result_set
        }))
    }

    pub fn columns(&self) -> &[ColumnDescription] {
        &self.columns
    }

    pub fn rows_per_batch(&self) -> usize {
        self.rows_per_batch
    }

    /// Fetches the next batch. `None` once the result set is consumed.
    pub fn fetch_next_batch(&mut self) -> Result<Option<RowBatch>, Error> {
        let rows = self.statement.fetch(self.rows_per_batch)?;
        if rows.is_empty() {
            return Ok(None);
        }
        trace!("Fetched batch with {} rows.", rows.len());
        RowBatch::from_rows(&self.columns, rows).map(Some)
    }

    /// Fetches all remaining batches and passes them to `consume` in order. Stops at the first
    /// error, either of the fetch or of `consume`.
    pub fn for_each_batch(
        mut self,
        mut consume: impl FnMut(RowBatch) -> Result<(), Error>,
    ) -> Result<(), Error> {
        if !self.double_buffered {
            while let Some(batch) = self.fetch_next_batch()? {
                consume(batch)?;
            }
            return Ok(());
        }

        // Capacity of one, so the fetch thread fills the second buffer while the first one is
        // consumed, yet never gets further ahead.
        let (send_batch, receive_batch) = sync_channel(1);
        thread::scope(move |scope| {
            scope.spawn(move || loop {
                match self.fetch_next_batch() {
                    Ok(Some(batch)) => {
                        if send_batch.send(Ok(batch)).is_err() {
                            // Consumer stopped receiving, likely due to an error.
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        let _ = send_batch.send(Err(error));
                        break;
                    }
                }
            });
            // Receiving ends once the fetch thread drops its sender. Returning early drops the
            // receiver, which in turn stops the fetch thread.
            for batch in receive_batch {
                consume(batch?)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        driver::DriverStatement, BufferSize, ColumnDescription, Error, Field, FieldType,
        NullableField,
    };

    use super::BoundResultSet;

    /// Serves a fixed number of integer rows and remembers the batch sizes requested.
    struct Counting {
        remaining: i64,
        requested: Vec<usize>,
        /// Zero based index of the fetch call which fails, if any.
        failing_fetch: Option<usize>,
    }

    impl Counting {
        fn new(num_rows: i64) -> Self {
            Self {
                remaining: num_rows,
                requested: Vec::new(),
                failing_fetch: None,
            }
        }

        fn failing_on_fetch(mut self, call: usize) -> Self {
            self.failing_fetch = Some(call);
            self
        }
    }

    impl DriverStatement for Counting {
        fn prepare(&mut self, _sql: &str) -> Result<(), Error> {
            Ok(())
        }

        fn num_params(&mut self) -> Result<usize, Error> {
            Ok(0)
        }

        fn execute(&mut self, _batch: &[Vec<NullableField>]) -> Result<(), Error> {
            Ok(())
        }

        fn row_count(&mut self) -> Result<i64, Error> {
            Ok(-1)
        }

        fn describe_columns(&mut self) -> Result<Vec<ColumnDescription>, Error> {
            Ok(vec![ColumnDescription::new("n", FieldType::Integer)])
        }

        fn fetch(&mut self, max_rows: usize) -> Result<Vec<Vec<NullableField>>, Error> {
            if self.failing_fetch == Some(self.requested.len()) {
                return Err(Error::Driver("Communication link failure".to_owned()));
            }
            self.requested.push(max_rows);
            let num = (max_rows as i64).min(self.remaining);
            let rows = (0..num)
                .map(|n| vec![Some(Field::Integer(self.remaining - n))])
                .collect();
            self.remaining -= num;
            Ok(rows)
        }

        fn sql_tables(&mut self, _: &str, _: &str, _: &str, _: &str) -> Result<(), Error> {
            Ok(())
        }

        fn sql_columns(&mut self, _: &str, _: &str, _: &str, _: &str) -> Result<(), Error> {
            Ok(())
        }
    }

    fn collect_row_counts(result_set: BoundResultSet<'_>) -> Vec<usize> {
        let mut sizes = Vec::new();
        result_set
            .for_each_batch(|batch| {
                sizes.push(batch.num_rows());
                Ok(())
            })
            .unwrap();
        sizes
    }

    #[test]
    fn fetch_in_batches_of_buffer_size() {
        let mut statement = Counting::new(10);
        let result_set = BoundResultSet::new(&mut statement, BufferSize::Rows(4))
            .unwrap()
            .unwrap();

        assert_eq!(vec![4, 4, 2], collect_row_counts(result_set));
        assert_eq!(vec![4, 4, 4, 4], statement.requested);
    }

    #[test]
    fn double_buffering_halves_batch_size() {
        let mut statement = Counting::new(10);
        let result_set = BoundResultSet::new_double_buffered(&mut statement, BufferSize::Rows(8))
            .unwrap()
            .unwrap();

        assert_eq!(4, result_set.rows_per_batch());
        assert_eq!(vec![4, 4, 2], collect_row_counts(result_set));
    }

    #[test]
    fn error_of_consumer_stops_double_buffered_fetch() {
        let mut statement = Counting::new(100);
        let result_set = BoundResultSet::new_double_buffered(&mut statement, BufferSize::Rows(2))
            .unwrap()
            .unwrap();

        let result = result_set.for_each_batch(|_| Err(Error::InvalidState("stop")));

        assert!(matches!(result, Err(Error::InvalidState("stop"))));
        // Fetch thread must not have consumed the entire result set.
        assert!(statement.remaining > 0);
    }

    #[test]
    fn driver_error_during_double_buffered_fetch_is_returned() {
        let mut statement = Counting::new(100).failing_on_fetch(1);
        let result_set = BoundResultSet::new_double_buffered(&mut statement, BufferSize::Rows(4))
            .unwrap()
            .unwrap();

        let mut num_batches = 0;
        let result = result_set.for_each_batch(|_| {
            num_batches += 1;
            Ok(())
        });

        assert!(matches!(result, Err(Error::Driver(_))));
        assert_eq!(1, num_batches);
        assert_eq!(vec![2], statement.requested);
    }

    #[test]
    fn field_of_wrong_type_is_rejected() {
        struct Lying;
        impl DriverStatement for Lying {
            fn prepare(&mut self, _sql: &str) -> Result<(), Error> {
                Ok(())
            }
            fn num_params(&mut self) -> Result<usize, Error> {
                Ok(0)
            }
            fn execute(&mut self, _batch: &[Vec<NullableField>]) -> Result<(), Error> {
                Ok(())
            }
            fn row_count(&mut self) -> Result<i64, Error> {
                Ok(0)
            }
            fn describe_columns(&mut self) -> Result<Vec<ColumnDescription>, Error> {
                Ok(vec![ColumnDescription::new("a", FieldType::Integer)])
            }
            fn fetch(&mut self, _max_rows: usize) -> Result<Vec<Vec<NullableField>>, Error> {
                Ok(vec![vec![Some(Field::String("one".to_owned()))]])
            }
            fn sql_tables(&mut self, _: &str, _: &str, _: &str, _: &str) -> Result<(), Error> {
                Ok(())
            }
            fn sql_columns(&mut self, _: &str, _: &str, _: &str, _: &str) -> Result<(), Error> {
                Ok(())
            }
        }

        let mut statement = Lying;
        let mut result_set = BoundResultSet::new(&mut statement, BufferSize::Rows(1))
            .unwrap()
            .unwrap();

        assert!(matches!(
            result_set.fetch_next_batch(),
            Err(Error::ColumnTypeMismatch {
                column: 0,
                expected: FieldType::Integer,
                actual: FieldType::String
            })
        ));
    }
}
