pub mod assertion;
pub mod chain;
pub mod definition;
pub mod error;
pub mod http;
pub mod logger;
pub mod metrics;
pub mod store;
pub mod utils;
pub mod variable;

// Re-export commonly used types
pub use error::{ApiChainError, ChainError, Result};
