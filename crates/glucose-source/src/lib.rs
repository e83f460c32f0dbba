//! Glucose Reading Source
//!
//! Fetches the most recent sensor glucose value from a Nightscout instance
//! and converts it into a [`Reading`] in mmol/L.

mod client;
mod error;
mod reading;

pub use client::{NightscoutClient, ReadingSource, DEFAULT_FETCH_TIMEOUT};
pub use error::SourceError;
pub use reading::{Reading, MGDL_PER_MMOL};
