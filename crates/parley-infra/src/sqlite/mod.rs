//! SQLite-backed persistence.

pub mod pool;
pub mod session;

pub use pool::DatabasePool;
pub use session::SqliteSessionStore;
