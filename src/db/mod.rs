//! Agent registry stored in the shared MySQL database

pub mod connection;
pub mod directory;
pub mod models;
pub mod queries;

pub use connection::create_pool;
pub use directory::{AgentDirectory, MySqlDirectory, StaticDirectory};
pub use models::{AgentNames, AgentRecord, AgentUrl};
