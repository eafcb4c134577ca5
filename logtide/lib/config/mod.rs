//! Configuration types and helpers.

mod defaults;
mod logtide;
mod validate;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use defaults::*;
pub use logtide::*;
