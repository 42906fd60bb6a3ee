//! deployboard library
//!
//! Core modules for the deployment status board.

pub mod aggregator;
pub mod app;
pub mod config;
pub mod deploy;
pub mod engine;
pub mod errors;
pub mod logs;
pub mod models;
pub mod proxy;
pub mod server;
pub mod sources;
pub mod utils;
pub mod workers;
