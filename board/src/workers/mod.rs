//! Background workers

pub mod refresher;
pub mod ticker;
