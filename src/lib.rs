//! Market history vs. macroeconomic indicators: loading, annual alignment
//! and statistical testing.

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod session;

pub use error::{AnalysisError, Result};
