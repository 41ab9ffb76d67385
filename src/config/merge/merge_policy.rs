//! Built-in defaults seeded into every builder.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder pre-loaded with the lowest-precedence defaults
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("remote.base_prefix", "/home/user")?
        .set_default("remote.shell", "/bin/bash")?
        .set_default("sync.coalesce_window_ms", 50)?
        .set_default("watch.poll_interval_ms", 2000)?
        .set_default("sessions.debounce_ms", 1500)?
        .set_default("sessions.auto_sync", true)?
        .set_default("sessions.default_cols", 80)?
        .set_default("sessions.default_rows", 24)
}
