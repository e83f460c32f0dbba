//! HTTP Routes

pub mod ack;
pub mod health;
pub mod metrics;
