//! Local HTTP API consumed by the board UI

pub mod error;
pub mod handlers;
pub mod serve;
pub mod state;
