pub mod api;
pub mod server;

// Re-export for convenience
pub use api::SharedSession;
pub use server::{routes, start_api_server};
