//! Types shared between the ADC proxy and the simulated instrument.
//!
//! This crate provides:
//! - The gateway wire protocol (readings, quality flags, property and info maps)
//! - The gateway route layout used by both the client and the simulator

mod protocol;
pub mod routes;

pub use protocol::*;
