pub mod sqlite;

pub use sqlite::{init, init_schema, open};
