use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::{
    result_set::{BoundResultSet, RowBatch},
    ColumnDescription, DataFrame, Error, Field, FieldType, NullableField,
};

use super::{parameters::UNIX_EPOCH_DAYS_FROM_CE, HostVector};

/// Accumulates the batches of a result set into host columns.
pub(crate) struct FrameBuilder {
    names: Vec<String>,
    types: Vec<FieldType>,
    columns: Vec<HostVector>,
}

impl FrameBuilder {
    pub fn new(descriptions: &[ColumnDescription]) -> Self {
        Self {
            names: descriptions.iter().map(|desc| desc.name.clone()).collect(),
            types: descriptions.iter().map(|desc| desc.data_type).collect(),
            columns: descriptions
                .iter()
                .map(|desc| HostVector::for_field_type(desc.data_type, 0))
                .collect(),
        }
    }

    /// Appends the rows of `batch` to the host columns.
    pub fn push_batch(&mut self, batch: RowBatch) -> Result<(), Error> {
        for (index, fields) in batch.into_columns().into_iter().enumerate() {
            append(&mut self.columns[index], index, self.types[index], fields)?;
        }
        Ok(())
    }

    pub fn finish(self) -> DataFrame {
        DataFrame::from_parts(self.names, self.columns)
    }
}

/// Fetches the entire result set and converts it into a data frame.
pub fn materialize(result_set: BoundResultSet<'_>) -> Result<DataFrame, Error> {
    let mut builder = FrameBuilder::new(result_set.columns());
    result_set.for_each_batch(|batch| builder.push_batch(batch))?;
    Ok(builder.finish())
}

fn append(
    target: &mut HostVector,
    column: usize,
    expected: FieldType,
    fields: Vec<NullableField>,
) -> Result<(), Error> {
    let mismatch = |field: &Field| Error::ColumnTypeMismatch {
        column,
        expected,
        actual: field.field_type(),
    };
    match target {
        HostVector::Logical(values) => {
            values.reserve(fields.len());
            for field in fields {
                values.push(match field {
                    None => None,
                    Some(Field::Boolean(value)) => Some(value),
                    Some(other) => return Err(mismatch(&other)),
                });
            }
        }
        HostVector::Double(values) => {
            values.reserve(fields.len());
            for field in fields {
                values.push(match field {
                    None => None,
                    Some(Field::Integer(value)) if expected == FieldType::Integer => {
                        Some(value as f64)
                    }
                    Some(Field::FloatingPoint(value)) if expected == FieldType::FloatingPoint => {
                        Some(value)
                    }
                    Some(other) => return Err(mismatch(&other)),
                });
            }
        }
        HostVector::Character(values) => {
            values.reserve(fields.len());
            for field in fields {
                values.push(match field {
                    None => None,
                    Some(Field::String(value)) => Some(value),
                    Some(other) => return Err(mismatch(&other)),
                });
            }
        }
        HostVector::Date(values) => {
            values.reserve(fields.len());
            for field in fields {
                values.push(match field {
                    None => None,
                    Some(Field::Date(value)) => Some(days_since_epoch(value)),
                    Some(other) => return Err(mismatch(&other)),
                });
            }
        }
        HostVector::DateTime(values) => {
            values.reserve(fields.len());
            for field in fields {
                values.push(match field {
                    None => None,
                    Some(Field::Timestamp(value)) => Some(seconds_since_epoch(value)),
                    Some(other) => return Err(mismatch(&other)),
                });
            }
        }
        // Never created from a field type
        HostVector::Integer(_) | HostVector::Complex(_) | HostVector::Raw(_) => {
            unreachable!("Result columns are never materialized as {}", target.type_name())
        }
    }
    Ok(())
}

fn days_since_epoch(date: NaiveDate) -> f64 {
    f64::from(date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
}

fn seconds_since_epoch(timestamp: NaiveDateTime) -> f64 {
    let utc = timestamp.and_utc();
    utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) / 1e9
}
