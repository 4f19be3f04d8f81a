use super::Error;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Handle is a live connection to one named database. It's shared with any
/// in-flight batch that's still executing against it.
#[derive(Clone)]
pub struct Handle(Arc<Mutex<Connection>>);

impl Handle {
    fn new(conn: Connection) -> Self {
        Self(Arc::new(Mutex::new(conn)))
    }

    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.0.lock().expect("connection lock is poisoned")
    }
}

#[derive(Default)]
struct State {
    open: HashMap<String, Handle>,
    closed: HashMap<String, Handle>,
}

/// Registry partitions all known databases by lifecycle state.
/// A name appears in at most one of the open or closed maps at any time.
#[derive(Default)]
pub struct Registry {
    state: Mutex<State>,
}

/// Lifecycle state of a named database within the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Open,
    Closed,
    Unknown,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the database `name`, connecting at `path` if it was never opened
    /// before. Re-opening a closed handle rolls back any transaction left
    /// pending by its last session. Opening an already-open database is a
    /// logged no-op.
    pub fn open(&self, name: &str, path: &std::path::Path) -> Result<(), Error> {
        let mut state = self.lock();

        if state.open.contains_key(name) {
            tracing::warn!(%name, "database is already open");
            return Ok(());
        }

        if let Some(handle) = state.closed.remove(name) {
            if let Err(err) = rollback_pending(&handle) {
                // Un-promote: the handle stays closed rather than remaining
                // registered in an unknown transactional state.
                state.closed.insert(name.to_string(), handle);
                return Err(Error::Rollback {
                    name: name.to_string(),
                    err,
                });
            }
            tracing::debug!(%name, "promoted closed database handle");
            state.open.insert(name.to_string(), handle);
            return Ok(());
        }

        let conn = Connection::open(path).map_err(|err| Error::Open {
            name: name.to_string(),
            err,
        })?;
        tracing::debug!(%name, path = %path.display(), "opened database");
        state.open.insert(name.to_string(), Handle::new(conn));

        Ok(())
    }

    /// Move the open handle of `name` into the closed registry. No flush or
    /// disconnect is issued: the handle remains live for later re-opening.
    pub fn close(&self, name: &str) -> Result<(), Error> {
        let mut state = self.lock();

        match state.open.remove(name) {
            Some(handle) => {
                tracing::debug!(%name, "closed database handle");
                state.closed.insert(name.to_string(), handle);
                Ok(())
            }
            None => Err(Error::NotOpen {
                name: name.to_string(),
            }),
        }
    }

    /// Remove `name` from whichever registry holds it — routing an open
    /// handle through the close transition first — and disconnect it.
    pub fn delete(&self, name: &str) -> Result<(), Error> {
        let handle = {
            let mut state = self.lock();

            match state.closed.remove(name) {
                Some(handle) => handle,
                None => match state.open.remove(name) {
                    Some(handle) => handle,
                    None => {
                        return Err(Error::NotOpen {
                            name: name.to_string(),
                        })
                    }
                },
            }
        };

        // Disconnect outside of the registry lock. A failure to cleanly
        // disconnect is logged; the handle is deregistered regardless.
        match Arc::try_unwrap(handle.0) {
            Ok(mutex) => {
                let conn = mutex.into_inner().expect("connection lock is poisoned");
                if let Err((_conn, err)) = conn.close() {
                    tracing::warn!(%name, error = %err, "failed to cleanly disconnect database");
                }
            }
            // An in-flight batch still shares the connection; it disconnects
            // when the last clone drops.
            Err(_shared) => {}
        }
        tracing::debug!(%name, "deleted database handle");

        Ok(())
    }

    /// Look up the open handle of `name`, for statement execution.
    pub fn handle(&self, name: &str) -> Option<Handle> {
        self.lock().open.get(name).cloned()
    }

    /// Report whether `name` is currently open, closed, or unknown.
    pub fn status(&self, name: &str) -> Status {
        let state = self.lock();

        if state.open.contains_key(name) {
            Status::Open
        } else if state.closed.contains_key(name) {
            Status::Closed
        } else {
            Status::Unknown
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("registry lock is poisoned")
    }
}

// Roll back a transaction left pending on a re-opened handle. A handle in
// autocommit has nothing to roll back, and a bare ROLLBACK would itself error.
fn rollback_pending(handle: &Handle) -> Result<(), rusqlite::Error> {
    let conn = handle.lock();

    if !conn.is_autocommit() {
        tracing::debug!("rolling back pending transaction of re-opened database");
        conn.execute_batch("ROLLBACK")?;
    }
    Ok(())
}
