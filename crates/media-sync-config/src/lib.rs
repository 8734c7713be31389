pub mod config;
pub mod paths;

pub use config::{Config, LoggingConfig, RetryConfig, ServiceConfig, ServicesConfig, default_retry_config};
pub use paths::{PathManager, container_base_path};
