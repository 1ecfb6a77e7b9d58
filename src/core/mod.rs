//! Core business logic abstractions

pub mod config;
pub mod error;
pub mod filter;
pub mod log;
pub mod price;

// Re-export main types for cleaner imports
pub use error::PriceError;
pub use filter::Filter;
pub use price::{DateRange, PriceRecord, PriceSource};
