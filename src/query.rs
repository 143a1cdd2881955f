use log::debug;

use crate::{
    driver::DriverStatement, result_set::BoundResultSet, BufferSize, Error, NullableField,
};

/// A prepared statement together with the parameter sets not yet sent to the data source.
///
/// Parameter sets are collected until `parameter_sets_to_buffer` of them are pending. Then they
/// are sent as one batch. [`Query::execute`] sends whatever remains.
pub struct Query {
    statement: Box<dyn DriverStatement>,
    buffer_size: BufferSize,
    parameter_sets_to_buffer: usize,
    use_async_io: bool,
    num_params: usize,
    pending: Vec<Vec<NullableField>>,
    /// Batches already sent since the last call to execute.
    batches_sent: usize,
    /// Affected rows of the batches sent since the last call to execute.
    row_count: i64,
    /// `true` once execute has been called. The next parameter set starts a new execution.
    executed: bool,
}

impl Query {
    /// Wraps an already prepared statement.
    pub fn new(
        mut statement: Box<dyn DriverStatement>,
        buffer_size: BufferSize,
        parameter_sets_to_buffer: usize,
        use_async_io: bool,
    ) -> Result<Self, Error> {
        let num_params = statement.num_params()?;
        Ok(Self {
            statement,
            buffer_size,
            parameter_sets_to_buffer: parameter_sets_to_buffer.max(1),
            use_async_io,
            num_params,
            pending: Vec::new(),
            batches_sent: 0,
            row_count: 0,
            executed: false,
        })
    }

    /// Number of placeholders in the statement text.
    pub fn num_params(&self) -> usize {
        self.num_params
    }

    /// Number of parameter sets collected, but not yet sent to the data source.
    pub fn num_pending_parameter_sets(&self) -> usize {
        self.pending.len()
    }

    /// Appends a parameter set. Sends all pending sets as one batch, once the buffer is full.
    pub fn add_parameter_set(&mut self, parameter_set: &[NullableField]) -> Result<(), Error> {
        if parameter_set.len() != self.num_params {
            return Err(Error::ParameterCount {
                expected: self.num_params,
                actual: parameter_set.len(),
            });
        }
        if self.executed {
            self.start_new_execution();
        }
        self.pending.push(parameter_set.to_vec());
        if self.pending.len() == self.parameter_sets_to_buffer {
            self.flush()?;
        }
        Ok(())
    }

    /// Sends all pending parameter sets. If no parameter set has been sent since the last
    /// execution, the statement is executed once without parameters.
    pub fn execute(&mut self) -> Result<(), Error> {
        if self.executed {
            self.start_new_execution();
        }
        if !self.pending.is_empty() || self.batches_sent == 0 {
            self.flush()?;
        }
        self.executed = true;
        Ok(())
    }

    /// The result set created by the last execution. `None` if there is none, e.g. for `INSERT`
    /// statements.
    pub fn get_results(&mut self) -> Result<Option<BoundResultSet<'_>>, Error> {
        if self.use_async_io {
            BoundResultSet::new_double_buffered(self.statement.as_mut(), self.buffer_size)
        } else {
            BoundResultSet::new(self.statement.as_mut(), self.buffer_size)
        }
    }

    /// Rows affected by the last execution, summed over all batches of parameter sets.
    pub fn get_row_count(&self) -> i64 {
        self.row_count
    }

    fn start_new_execution(&mut self) {
        self.executed = false;
        self.batches_sent = 0;
        self.row_count = 0;
    }

    fn flush(&mut self) -> Result<(), Error> {
        debug!("Executing statement with {} parameter sets.", self.pending.len());
        let batch = std::mem::take(&mut self.pending);
        self.statement.execute(&batch)?;
        self.batches_sent += 1;
        let affected = self.statement.row_count()?;
        // Drivers report -1 if they do not know the number of affected rows.
        if affected >= 0 {
            self.row_count += affected;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::{
        driver::DriverStatement, BufferSize, ColumnDescription, Error, Field, NullableField,
    };

    use super::Query;

    /// Records the size of every batch executed. Each parameter set affects one row.
    struct Recording {
        num_params: usize,
        batches: Arc<Mutex<Vec<usize>>>,
        last_batch: usize,
    }

    impl DriverStatement for Recording {
        fn prepare(&mut self, _sql: &str) -> Result<(), Error> {
            Ok(())
        }

        fn num_params(&mut self) -> Result<usize, Error> {
            Ok(self.num_params)
        }

        fn execute(&mut self, batch: &[Vec<NullableField>]) -> Result<(), Error> {
            self.batches.lock().unwrap().push(batch.len());
            self.last_batch = batch.len();
            Ok(())
        }

        fn row_count(&mut self) -> Result<i64, Error> {
            Ok(self.last_batch as i64)
        }

        fn describe_columns(&mut self) -> Result<Vec<ColumnDescription>, Error> {
            Ok(Vec::new())
        }

        fn fetch(&mut self, _max_rows: usize) -> Result<Vec<Vec<NullableField>>, Error> {
            Ok(Vec::new())
        }

        fn sql_tables(&mut self, _: &str, _: &str, _: &str, _: &str) -> Result<(), Error> {
            Ok(())
        }

        fn sql_columns(&mut self, _: &str, _: &str, _: &str, _: &str) -> Result<(), Error> {
            Ok(())
        }
    }

    fn query(num_params: usize, parameter_sets_to_buffer: usize) -> (Query, Arc<Mutex<Vec<usize>>>) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let statement = Recording {
            num_params,
            batches: batches.clone(),
            last_batch: 0,
        };
        let query = Query::new(
            Box::new(statement),
            BufferSize::Rows(10),
            parameter_sets_to_buffer,
            false,
        )
        .unwrap();
        (query, batches)
    }

    #[test]
    fn flush_every_time_the_buffer_is_full() {
        let (mut query, batches) = query(1, 3);

        for i in 0..7 {
            query.add_parameter_set(&[Some(Field::Integer(i))]).unwrap();
        }
        assert_eq!(vec![3, 3], *batches.lock().unwrap());
        assert_eq!(1, query.num_pending_parameter_sets());

        query.execute().unwrap();
        assert_eq!(vec![3, 3, 1], *batches.lock().unwrap());
        assert_eq!(7, query.get_row_count());
    }

    #[test]
    fn execute_without_parameters_runs_statement_once() {
        let (mut query, batches) = query(0, 3);

        query.execute().unwrap();

        assert_eq!(vec![0], *batches.lock().unwrap());
    }

    #[test]
    fn no_empty_batch_after_exact_multiple_of_buffer() {
        let (mut query, batches) = query(1, 2);

        query.add_parameter_set(&[None]).unwrap();
        query.add_parameter_set(&[None]).unwrap();
        query.execute().unwrap();

        assert_eq!(vec![2], *batches.lock().unwrap());
        assert_eq!(2, query.get_row_count());
    }

    #[test]
    fn row_count_restarts_with_next_execution() {
        let (mut query, _batches) = query(1, 10);

        query.add_parameter_set(&[None]).unwrap();
        query.add_parameter_set(&[None]).unwrap();
        query.execute().unwrap();
        query.add_parameter_set(&[None]).unwrap();
        query.execute().unwrap();

        assert_eq!(1, query.get_row_count());
    }

    #[test]
    fn reject_parameter_set_of_wrong_size() {
        let (mut query, _batches) = query(2, 10);

        let result = query.add_parameter_set(&[None]);

        assert!(matches!(
            result,
            Err(Error::ParameterCount {
                expected: 2,
                actual: 1
            })
        ));
    }
}
