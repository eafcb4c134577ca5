//! Issue detection over collected log records.
//!
//! This module provides:
//! - At-most-once tracking of analyzed record identities
//! - A language-model analyzer with tolerant response parsing
//! - Rule-based fallback detection for when the model is unreachable

mod analyzed;
mod analyzer;
mod detector;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use analyzed::*;
pub use analyzer::*;
pub use detector::*;
