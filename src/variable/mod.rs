pub mod config;
pub mod extract;
pub mod resolver;
pub mod types;

pub use config::ConfigLoader;
pub use extract::{ExtractionError, extract, extract_from_str};
pub use resolver::VariableResolver;
pub use types::{AppConfig, Environment, Settings, UndefinedVariablePolicy, VariableContext};
