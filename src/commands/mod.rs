pub mod fetch_config;
pub mod files;
