use std::sync::{Arc, LockResult, Mutex, MutexGuard, Weak};

use log::{debug, warn};

use crate::{driver::DriverConnection, Cursor, Error, Options};

/// Identifies a cursor towards its connection. Each cursor owns exactly one token, the connection
/// only ever holds a weak reference to it.
#[derive(Debug)]
pub(crate) struct CursorToken;

/// A connection to a data source, shared between the cursors created from it.
///
/// Of all these cursors, at most one is active at any time: the one created last.
pub struct Connection {
    driver: Box<dyn DriverConnection>,
    options: Options,
    autocommit: Mutex<bool>,
    active_cursor: Mutex<Option<Weak<CursorToken>>>,
}

impl Connection {
    /// Wraps a driver connection. Applies the autocommit setting of `options`.
    pub fn new(
        driver: impl DriverConnection + 'static,
        options: Options,
    ) -> Result<Arc<Self>, Error> {
        driver.set_autocommit(options.autocommit)?;
        Ok(Arc::new(Self {
            driver: Box::new(driver),
            autocommit: Mutex::new(options.autocommit),
            options,
            active_cursor: Mutex::new(None),
        }))
    }

    /// Creates a cursor configured with the options of this connection. The new cursor becomes the
    /// active one.
    pub fn make_cursor(self: &Arc<Self>) -> Cursor {
        Cursor::new(
            self.clone(),
            self.options.read_buffer_size,
            self.options.parameter_sets_to_buffer,
            self.options.use_async_io,
        )
    }

    /// The driver connection, which creates the statements for queries and catalog calls.
    pub fn get_connection(&self) -> &dyn DriverConnection {
        self.driver.as_ref()
    }

    /// Options every cursor of this connection is created with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Commits the current transaction. Has no effect in autocommit mode.
    pub fn commit(&self) -> Result<(), Error> {
        debug!("Commit transaction.");
        self.driver.commit()
    }

    /// Discards all changes of the current transaction. Has no effect in autocommit mode.
    pub fn rollback(&self) -> Result<(), Error> {
        debug!("Roll back transaction.");
        self.driver.rollback()
    }

    /// Enable or disable autocommit mode.
    pub fn set_autocommit(&self, enabled: bool) -> Result<(), Error> {
        let mut autocommit = recover(self.autocommit.lock());
        self.driver.set_autocommit(enabled)?;
        *autocommit = enabled;
        Ok(())
    }

    pub fn autocommit(&self) -> bool {
        *recover(self.autocommit.lock())
    }

    /// Marks the cursor identified by `token` as the active one, replacing any previous one.
    pub(crate) fn set_active_cursor(&self, token: &Arc<CursorToken>) {
        *recover(self.active_cursor.lock()) = Some(Arc::downgrade(token));
    }

    pub(crate) fn is_active_cursor(&self, token: &Arc<CursorToken>) -> bool {
        refers_to(recover(self.active_cursor.lock()).as_ref(), token)
    }

    /// Forgets the active cursor, yet only if it is the one identified by `token`.
    pub(crate) fn release_cursor(&self, token: &Arc<CursorToken>) {
        let mut active = recover(self.active_cursor.lock());
        if refers_to(active.as_ref(), token) {
            *active = None;
        }
    }
}

fn refers_to(active: Option<&Weak<CursorToken>>, token: &Arc<CursorToken>) -> bool {
    active.map_or(false, |weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(token)))
}

/// No invariant of the guarded state can be broken by a panic, so we carry on with it.
fn recover<'a, T>(lock: LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    lock.unwrap_or_else(|poisoned| {
        warn!("Recovering from poisoned connection lock.");
        poisoned.into_inner()
    })
}
