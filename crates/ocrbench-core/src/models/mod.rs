//! Configuration and benchmark record models.

pub mod config;
pub mod record;
