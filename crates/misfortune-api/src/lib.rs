//! Table host for the Misfortune pool: SQLite-backed world settings, an HTTP
//! API for the table's clients, and a WebSocket relay for replication, chat
//! cards and notices.

mod persistence;
mod server;

use std::path::Path;

use misfortune_core::{MisfortuneModule, Outbox, Seat, StoreError};
use thiserror::Error;

pub use persistence::{PersistenceError, SqliteSettings};
pub use server::{default_sqlite_path, serve, ServerError};

#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Load the module hosted at the table, backed by the SQLite file at `path`.
pub fn open_table(path: impl AsRef<Path>) -> Result<MisfortuneModule<Outbox>, TableError> {
    let settings = SqliteSettings::open(path)?;
    let module = MisfortuneModule::load(Box::new(settings), Seat::Host, Outbox::new())?;
    Ok(module)
}

/// Same as [`open_table`] but against a throwaway in-memory database.
pub fn open_table_in_memory() -> Result<MisfortuneModule<Outbox>, TableError> {
    let settings = SqliteSettings::open_in_memory()?;
    let module = MisfortuneModule::load(Box::new(settings), Seat::Host, Outbox::new())?;
    Ok(module)
}
