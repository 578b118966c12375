//! Shared terminal UI pieces.

pub mod error;

pub use error::show_blocking_error;
