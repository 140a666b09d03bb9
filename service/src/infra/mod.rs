//! Infrastructure layer.

pub mod database;

pub use self::database::{Database, Inmem};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
