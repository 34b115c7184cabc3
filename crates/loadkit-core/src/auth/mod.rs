//! Credential cache
//!
//! Bearer tokens are expensive to mint and the system under test usually
//! accepts one token for several minutes, so each worker keeps one token per
//! client identity and only goes back to the token endpoint when it is about
//! to expire.

pub mod cache;
pub mod client;

pub use cache::{CachedToken, CredentialCache, TokenPolicy};
pub use client::TokenClient;
