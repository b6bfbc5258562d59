use std::ops::{Deref, DerefMut};

use crate::driver::{ConnectionState, DbConnection};
use crate::error::SprocDbError;

/// Borrow of a connection for one execution that closes it when the scope ends.
///
/// [`finish`](Self::finish) closes and reports the close error; any other exit (early
/// `?`, panic unwinding, a dropped future) closes in `Drop` and only logs a failure, so
/// the error that ended the call is the one the caller sees.
pub(crate) struct ConnectionScope<'c, C: DbConnection + ?Sized> {
    conn: &'c mut C,
    close_on_exit: bool,
}

impl<'c, C: DbConnection + ?Sized> ConnectionScope<'c, C> {
    pub(crate) fn new(conn: &'c mut C, close_on_exit: bool) -> Self {
        Self {
            conn,
            close_on_exit,
        }
    }

    pub(crate) fn finish(mut self) -> Result<(), SprocDbError> {
        let close = std::mem::replace(&mut self.close_on_exit, false);
        if close && self.conn.state() != ConnectionState::Closed {
            self.conn.close()?;
        }
        Ok(())
    }
}

impl<C: DbConnection + ?Sized> Deref for ConnectionScope<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn
    }
}

impl<C: DbConnection + ?Sized> DerefMut for ConnectionScope<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn
    }
}

impl<C: DbConnection + ?Sized> Drop for ConnectionScope<'_, C> {
    fn drop(&mut self) {
        if self.close_on_exit && self.conn.state() != ConnectionState::Closed {
            if let Err(e) = self.conn.close() {
                tracing::warn!(error = %e, "failed to close connection during cleanup");
            }
        }
    }
}
