// Database module
// SQLite holds the recipe metadata, LanceDB holds one vector table per embedded field

pub mod lancedb;
pub mod sqlite;

pub use self::lancedb::IndexStore;
pub use sqlite::*;
