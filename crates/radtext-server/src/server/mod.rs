pub mod http_server;
pub mod utils;

pub use http_server::{routes, start_api_server};
