//! Runtime construction, configuration and on-disk layout.

pub mod core;
pub mod layout;
pub mod options;
mod rt_impl;

pub use self::core::RebootRuntime;
