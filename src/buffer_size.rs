use crate::ColumnDescription;

const BYTES_PER_MEGABYTE: usize = 1024 * 1024;

/// Controls how many rows are fetched from the data source in one round trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferSize {
    /// Fetch a fixed number of rows per batch.
    Rows(usize),
    /// Fetch as many rows per batch as fit into this many megabytes of buffer memory, given the
    /// width of the columns in the result set.
    Megabytes(usize),
}

impl BufferSize {
    /// Number of rows to fetch per batch for a result set with the described columns. Always at
    /// least one.
    pub fn rows_to_buffer(&self, columns: &[ColumnDescription]) -> usize {
        match *self {
            BufferSize::Rows(rows) => rows.max(1),
            BufferSize::Megabytes(megabytes) => {
                let bytes_per_row: usize = columns
                    .iter()
                    .map(ColumnDescription::element_size)
                    .sum::<usize>()
                    .max(1);
                (megabytes.saturating_mul(BYTES_PER_MEGABYTE) / bytes_per_row).max(1)
            }
        }
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        BufferSize::Megabytes(20)
    }
}

#[cfg(test)]
mod tests {
    use crate::{ColumnDescription, FieldType};

    use super::BufferSize;

    #[test]
    fn rows_are_taken_literally() {
        let columns = [ColumnDescription::new("a", FieldType::Integer)];
        assert_eq!(42, BufferSize::Rows(42).rows_to_buffer(&columns));
    }

    #[test]
    fn zero_rows_still_fetch_one_row() {
        assert_eq!(1, BufferSize::Rows(0).rows_to_buffer(&[]));
        assert_eq!(1, BufferSize::Megabytes(0).rows_to_buffer(&[]));
    }

    #[test]
    fn megabytes_are_divided_by_row_width() {
        // 8 bytes value plus 8 bytes indicator each
        let columns = [
            ColumnDescription::new("a", FieldType::Integer),
            ColumnDescription::new("b", FieldType::FloatingPoint),
        ];
        assert_eq!(32768, BufferSize::Megabytes(1).rows_to_buffer(&columns));
    }

    #[test]
    fn string_width_depends_on_max_length() {
        // 1023 bytes plus terminating zero plus 8 bytes indicator
        let columns = [ColumnDescription::new("s", FieldType::String).with_max_length(1023)];
        assert_eq!(1024 * 1024 / 1032, BufferSize::Megabytes(1).rows_to_buffer(&columns));
    }
}
