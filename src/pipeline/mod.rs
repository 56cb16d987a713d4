pub mod monitor;
pub mod streamer;

pub use monitor::RateMonitor;
pub use streamer::{Cycle, Streamer};
