//! GasMon - gas sensor monitoring pipeline
//!
//! Consumes sensor notifications from a queue, keeps readings from trusted
//! locations only, drops redeliveries, and reports per-minute averages per
//! location as CSV.

pub mod aggregator_core;
pub mod config;
pub mod pipeline;
pub mod streamer_core;
