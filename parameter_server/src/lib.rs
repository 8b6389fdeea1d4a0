//! Simulated distributed training with error compensated, quantized gradients.
//!
//! Workers and the central server live in the same process and run one after the other, every
//! message between them going through a `b`-bit stochastic quantizer with error feedback.

mod config;
mod error;
mod server;
mod session;
mod worker;

pub use config::QuantizedSgdConfig;
pub use error::{Result, ServerErr};
pub use server::CentralServer;
pub use session::QuantizedSgd;
pub use worker::Worker;
