//! Process bootstrap shared by the server binaries: typed settings loaded from
//! the environment and the tracing subscriber setup.

pub mod config;
pub mod logging;

pub use config::{Settings, SettingsError};
pub use logging::{init_logging, LoggingConfig};
