//! Deployment lifecycle

pub mod fsm;
pub mod signals;
pub mod simulator;
