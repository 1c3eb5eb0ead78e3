//! Utility functions for display formatting and input parsing.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{format_date, format_time, parse_date, parse_time, truncate_string};
