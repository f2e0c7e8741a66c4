pub mod logging;
pub mod time;
pub mod toml_config;
