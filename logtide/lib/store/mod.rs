//! Durable cursor state.

mod cursor;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use cursor::*;
