//! Shared types for rebootd.

pub mod errors;

pub use errors::{RebootError, RebootResult};
