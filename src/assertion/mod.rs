pub mod evaluator;
pub mod types;

pub use evaluator::{evaluate_all, evaluate_assertion};
pub use types::{AssertOperator, AssertTarget, Assertion, AssertionResult};
