pub mod engine;
pub mod reporter;
pub mod types;

pub use engine::{ChainEngine, EngineOptions, RequestRun};
pub use reporter::ChainReporter;
pub use types::{
    ChainExecution, ChainStatus, ExtractRule, MAX_CHAIN_STEPS, RequestChain, StepResult,
    StepWarning,
};
