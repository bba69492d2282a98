//! Shared types for the hatline GPIO hat library.
//!
//! This crate holds the pieces every other hatline crate agrees on: digital
//! levels and pin ids, the detection [`PinSample`], hat variants and their
//! signatures, the error taxonomy returned across the public API, and the
//! TOML configuration model.

pub mod config;
pub mod constants;
pub mod error;
pub mod signature;
pub mod types;

pub use config::HatConfig;
pub use error::{Error, Result};
pub use signature::SignatureTable;
pub use types::*;
