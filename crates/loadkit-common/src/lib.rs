//! Loadkit Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error taxonomy, logging setup and the iteration variable store used
//! by every loadkit crate.
//!
//! # Example
//!
//! ```
//! use loadkit_common::{Value, VariableStore};
//!
//! let mut vars = VariableStore::new();
//! vars.set("username", "alice");
//! assert_eq!(vars.get("username"), &Value::String("alice".to_string()));
//! assert!(vars.get("password").is_absent());
//! ```

pub mod error;
pub mod logging;
pub mod vars;

// Re-export commonly used types
pub use error::{CorrelationWarning, LoadkitError, Result};
pub use vars::{Value, VariableStore};
