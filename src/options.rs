use crate::BufferSize;

/// Options shared by a connection and all the cursors created from it.
///
/// ```
/// use odbc_cursor::{BufferSize, Options};
///
/// let options = Options::new()
///     .with_read_buffer_size(BufferSize::Rows(100))
///     .with_async_io(true);
/// assert_eq!(1000, options.parameter_sets_to_buffer);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Size of the buffers result sets are fetched into.
    pub read_buffer_size: BufferSize,
    /// Number of parameter sets sent to the data source in one round trip.
    pub parameter_sets_to_buffer: usize,
    /// Fetch the next batch of a result set while the current one is converted.
    pub use_async_io: bool,
    /// Commit after each statement. Applied when the connection is established.
    pub autocommit: bool,
    /// Upper bound in bytes for values fetched from string columns which do not report a
    /// maximum length (e.g. `VARCHAR(MAX)`).
    pub varchar_max_character_limit: usize,
}

impl Options {
    pub fn new() -> Self {
        Self {
            read_buffer_size: BufferSize::default(),
            parameter_sets_to_buffer: 1000,
            use_async_io: false,
            autocommit: false,
            varchar_max_character_limit: 65535,
        }
    }

    pub fn with_read_buffer_size(mut self, read_buffer_size: BufferSize) -> Self {
        self.read_buffer_size = read_buffer_size;
        self
    }

    pub fn with_parameter_sets_to_buffer(mut self, parameter_sets_to_buffer: usize) -> Self {
        self.parameter_sets_to_buffer = parameter_sets_to_buffer;
        self
    }

    pub fn with_async_io(mut self, use_async_io: bool) -> Self {
        self.use_async_io = use_async_io;
        self
    }

    pub fn with_autocommit(mut self, autocommit: bool) -> Self {
        self.autocommit = autocommit;
        self
    }

    pub fn with_varchar_max_character_limit(mut self, limit: usize) -> Self {
        self.varchar_max_character_limit = limit;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}
