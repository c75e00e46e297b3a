//! Azure DevOps backend: `az` CLI invocation and JSON parsing.

pub mod executor;
pub mod parser;

pub use executor::AzExecutor;
