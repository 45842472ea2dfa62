use crate::error::Result;
use crate::matcher::SeparatorPolicy;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Leading character of every AutoTexto trigger token.
pub const TRIGGER_SENTINEL: char = '/';
/// Text inserted by the Tab key.
pub const TAB_INDENT: &str = "  ";
pub const DB_FILENAME: &str = "radtext.json";
pub const API_PORT_FILENAME: &str = "api_port.txt";
pub const LOGS_DIRNAME: &str = "logs";
pub const LOG_FILENAME: &str = "radtext.log";

// Shell command used as the text generation backend
pub const GENERATOR_ENV_VAR: &str = "RADTEXT_GENERATOR";
pub const GENERATOR_ACTION_ENV_VAR: &str = "RADTEXT_ACTION";

// Keys used in the key-value store
pub const USER_TEMPLATES_KEY: &str = "userTemplates";
pub const USER_TRIGGERS_KEY: &str = "autoTextoTriggers";
pub const FIELD_VALUES_KEY_PREFIX: &str = "templateDynamicValues";
pub const MEASUREMENTS_KEY: &str = "measurements";
pub const FAVORITE_TEMPLATES_KEY: &str = "favoriteTemplates";
pub const RECENT_TEMPLATES_KEY: &str = "recentTemplates";

/// Key under which the field values of one template are stored
pub fn field_values_key(template_id: &str) -> String {
    format!("{}-{}", FIELD_VALUES_KEY_PREFIX, template_id)
}

/// Runtime options of an editor session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditorConfig {
    pub separator_policy: SeparatorPolicy,
}

impl EditorConfig {
    pub fn with_separator_policy(separator_policy: SeparatorPolicy) -> Self {
        Self { separator_policy }
    }
}

/// Get the radtext configuration directory
pub fn get_config_dir() -> PathBuf {
    env::var("HOME")
        .map(|home| PathBuf::from(home).join(".radtext"))
        .unwrap_or_else(|_| PathBuf::from(".radtext"))
}

/// Ensure the configuration directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let config_dir = get_config_dir();
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    let db_path = get_db_file_path();
    if !db_path.exists() {
        create_empty_file(&db_path, "database file")?;
    }

    Ok(config_dir)
}

/// Ensure the log directory exists and return it
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs_dir = get_config_dir().join(LOGS_DIRNAME);
    if !logs_dir.exists() {
        fs::create_dir_all(&logs_dir)?;
    }
    Ok(logs_dir)
}

/// Create an empty file at the specified path
pub fn create_empty_file(path: &Path, description: &str) -> Result<()> {
    tracing::info!("Creating {} at: {}", description, path.display());
    fs::write(path, "")?;
    Ok(())
}

/// Get the path to the database file
pub fn get_db_file_path() -> PathBuf {
    get_config_dir().join(DB_FILENAME)
}

/// Get the path to the file holding the API server port
pub fn get_api_port_file_path() -> PathBuf {
    get_config_dir().join(API_PORT_FILENAME)
}
