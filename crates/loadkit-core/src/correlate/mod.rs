//! Correlation of captured responses into iteration variables

mod engine;
pub mod path;

pub use engine::{CorrelationEngine, CorrelationOutcome, CorrelationRule, SelectMode};
pub use path::resolve;
