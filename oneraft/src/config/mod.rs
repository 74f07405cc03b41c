#[allow(clippy::module_inception)]
mod config;
mod errors;


pub use config::Config;
pub(crate) use config::RuntimeConfig;
pub use errors::ConfigError;
