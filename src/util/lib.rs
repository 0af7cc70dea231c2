//! Utility crate for LAIK: error types, environment configuration and
//! logging setup shared by every other LAIK crate.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
