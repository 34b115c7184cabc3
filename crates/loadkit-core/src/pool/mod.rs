//! Data pool distribution
//!
//! A source data file is loaded once per worker; a pointer file shared by all
//! workers of a run records the next unclaimed row. Each claim reads the
//! pointer, hands out that row and writes the pointer back advanced.

pub mod distributor;
pub mod pointer;
pub mod source;

pub use distributor::{BatchClaim, Claim, ColumnMapping, DataPoolDistributor};
pub use pointer::{PointerFile, PointerStore, ResetOutcome};
pub use source::DataPool;
