pub mod connection;
pub mod dead_letters;
pub mod models;
pub mod service;

pub use connection::{get_connection, DbPool};
pub use dead_letters::{replay_dead_letters, DbDeadLetterSink, ReplaySummary};
pub use models::*;
