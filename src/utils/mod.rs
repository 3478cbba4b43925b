//!
//! Utility module for the lightwallet coordination layer.
//!
//! Re-exports formatting helpers used throughout the codebase.

/// Utility functions for formatting and display
pub mod index;

pub use index::{format_duration, format_token_amount};
