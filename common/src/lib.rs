//! RateQuorum Common Types
//!
//! This crate contains shared types used across the RateQuorum engine,
//! including currencies and pairs, persisted rate snapshots, the error
//! taxonomy, and time helpers.

pub mod currency;
pub mod snapshot;
pub mod error;
pub mod time;

pub use currency::*;
pub use snapshot::*;
pub use error::*;
pub use time::*;
