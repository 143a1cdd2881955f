use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::{DataFrame, Error, Field, NullableField};

use super::{HostType, HostVector};

/// Number of days between 0001-01-01 and 1970-01-01 in the proleptic Gregorian calendar.
pub(crate) const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Infers the host type of a column. Fails for vectors which can not be converted into fields.
pub fn host_type(vector: &HostVector) -> Result<HostType, Error> {
    let host_type = match vector {
        HostVector::Logical(_) => HostType::Logical,
        HostVector::Integer(_) => HostType::Integer,
        HostVector::Double(_) => HostType::Double,
        HostVector::Character(_) => HostType::Character,
        HostVector::Date(_) => HostType::Date,
        HostVector::DateTime(_) => HostType::DateTime,
        HostVector::Complex(_) | HostVector::Raw(_) => {
            return Err(Error::TypeConversion {
                value: format!("a {} vector", vector.type_name()),
                target: "field",
            })
        }
    };
    Ok(host_type)
}

/// Converts the element at `row` into a field, assuming the vector is of `host_type`. Missing
/// values become `NULL`, independent of the type.
pub(crate) fn field_at(
    vector: &HostVector,
    host_type: HostType,
    row: usize,
) -> Result<NullableField, Error> {
    if row >= vector.len() {
        return Err(Error::TypeConversion {
            value: format!(
                "row {row} of a {} vector of length {}",
                vector.type_name(),
                vector.len()
            ),
            target: type_label(host_type),
        });
    }
    let field = match (host_type, vector) {
        (HostType::Logical, HostVector::Logical(values)) => values[row].map(Field::Boolean),
        (HostType::Integer, HostVector::Integer(values)) => {
            values[row].map(|value| Field::Integer(value.into()))
        }
        (HostType::Double, HostVector::Double(values)) => values[row].map(Field::FloatingPoint),
        (HostType::Character, HostVector::Character(values)) => {
            values[row].clone().map(Field::String)
        }
        (HostType::Date, HostVector::Date(values)) => {
            values[row].map(date_from_days).transpose()?.map(Field::Date)
        }
        (HostType::DateTime, HostVector::DateTime(values)) => values[row]
            .map(timestamp_from_seconds)
            .transpose()?
            .map(Field::Timestamp),
        (expected, _) => {
            return Err(Error::TypeConversion {
                value: format!("an element of a {} vector", vector.type_name()),
                target: type_label(expected),
            })
        }
    };
    Ok(field)
}

/// Converts a single host value, i.e. a vector of length one, into a field. Its type is inferred
/// individually.
pub fn field_from_value(value: &HostVector) -> Result<NullableField, Error> {
    if value.len() != 1 {
        return Err(Error::TypeConversion {
            value: format!("a {} vector of length {}", value.type_name(), value.len()),
            target: "single field",
        });
    }
    let host_type = host_type(value)?;
    field_at(value, host_type, 0)
}

/// Converts a row of individual host values into one parameter set. Slower than converting a
/// whole data frame, since the type of each value is inferred separately.
pub fn parameter_set_from_row(row: &[HostVector]) -> Result<Vec<NullableField>, Error> {
    row.iter().map(field_from_value).collect()
}

/// Converts each row of the frame into a parameter set and passes it to `consume`, in row order.
/// The type of each column is inferred once upfront.
pub fn for_each_parameter_set(
    frame: &DataFrame,
    mut consume: impl FnMut(&[NullableField]) -> Result<(), Error>,
) -> Result<(), Error> {
    let types = frame
        .columns()
        .iter()
        .map(host_type)
        .collect::<Result<Vec<_>, _>>()?;

    let mut parameter_set: Vec<NullableField> = vec![None; frame.num_cols()];
    for row in 0..frame.num_rows() {
        for (col, (column, &host_type)) in frame.columns().iter().zip(&types).enumerate() {
            parameter_set[col] = field_at(column, host_type, row)?;
        }
        consume(&parameter_set)?;
    }
    Ok(())
}

fn date_from_days(days: f64) -> Result<NaiveDate, Error> {
    let invalid = || Error::TypeConversion {
        value: format!("{days} days since epoch"),
        target: "date",
    };
    if !days.is_finite() {
        return Err(invalid());
    }
    let days_from_ce = days.floor() as i64 + i64::from(UNIX_EPOCH_DAYS_FROM_CE);
    i32::try_from(days_from_ce)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(invalid)
}

fn timestamp_from_seconds(seconds: f64) -> Result<NaiveDateTime, Error> {
    let invalid = || Error::TypeConversion {
        value: format!("{seconds} seconds since epoch"),
        target: "timestamp",
    };
    if !seconds.is_finite() {
        return Err(invalid());
    }
    let whole = seconds.floor();
    // Rounding must not carry over into the next second.
    let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
        .map(|timestamp| timestamp.naive_utc())
        .ok_or_else(invalid)
}

fn type_label(host_type: HostType) -> &'static str {
    match host_type {
        HostType::Logical => "logical",
        HostType::Integer => "integer",
        HostType::Double => "double",
        HostType::Character => "character",
        HostType::Date => "Date",
        HostType::DateTime => "POSIXct",
    }
}
