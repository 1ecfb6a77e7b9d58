//! Command implementations for the binary.

pub mod format;
pub mod prices;
pub mod setup;
pub mod ui;
