// HTTP module: server and probe client.

pub mod client;
pub mod server;

// Re-export server types
pub use server::HttpServer;

// Common controller interface
pub use crate::controller::controller::Controller;
