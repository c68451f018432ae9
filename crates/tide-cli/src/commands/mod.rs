//! CLI command implementations.
//!
//! - [`simulate`] - Fleet simulation against the engine
//! - [`analyze`] - Load pattern classification of a series

pub mod analyze;
pub mod simulate;

pub use analyze::AnalyzeCommand;
pub use simulate::SimulateCommand;
