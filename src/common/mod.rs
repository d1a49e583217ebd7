//! Shared types and provider interfaces

pub mod traits;
pub mod types;
