pub mod brackets;
pub mod connection;
pub mod matches;
pub mod models;
pub mod players;
pub mod rating_history;
pub mod registrations;
pub mod rounds;
pub mod seasons;
pub mod setup;

pub use connection::{create_memory_pool, create_pool, get_connection, DbConn, DbPool};
pub use models::*;
pub use setup::initialize_database;
