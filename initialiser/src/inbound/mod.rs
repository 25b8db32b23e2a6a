//! Inbound adapters: runtime settings and the desired-state document.

mod config_file;
mod settings;

pub use self::config_file::{ConfigFileError, load_config, parse_config};
pub use self::settings::{InitialiserSettings, RunSettings, SettingsError};
