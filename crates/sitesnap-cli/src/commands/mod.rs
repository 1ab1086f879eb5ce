//! Command implementations.

pub mod completion;
pub mod export;
