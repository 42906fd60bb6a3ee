//! Data models

pub mod payload;
pub mod record;
pub mod snapshot;
