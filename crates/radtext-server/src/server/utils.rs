//! Utilities for managing the API server.

use radtext_core::config::{ensure_config_dir, get_api_port_file_path};
use radtext_core::Result;
use std::fs;
use std::path::Path;

/// Check if a port is available by trying to bind to it
pub fn port_is_available(port: u16) -> bool {
    use std::net::TcpListener;
    TcpListener::bind(format!("127.0.0.1:{}", port)).is_ok()
}

/// Save the API port to the configuration directory so other tools can find the server
pub fn save_api_port(port: u16) -> Result<()> {
    ensure_config_dir()?;
    write_port_file(&get_api_port_file_path(), port)
}

/// Remove the saved port once the server stops
pub fn remove_api_port() -> Result<()> {
    let path = get_api_port_file_path();
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

pub(crate) fn write_port_file(path: &Path, port: u16) -> Result<()> {
    fs::write(path, port.to_string())?;
    Ok(())
}
