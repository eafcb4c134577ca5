//! The collection loops and their retry policy.

mod backoff;
mod supervisor;
mod worker;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use backoff::*;
pub use supervisor::*;
pub use worker::*;
