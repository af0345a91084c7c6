pub mod config;
pub mod logging;
pub mod rules;

pub use config::CascadeConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use rules::load_rules_dir;
