//! SSA construction middle-end: dominance analysis over a function's
//! control-flow graph, and renaming of variables into SSA versions
//! along the dominator tree.

pub mod cfg;
pub mod entity;
mod errors;
pub mod frontend;
mod ir;
pub mod passes;

pub use errors::*;
pub use ir::*;

#[cfg(feature = "fuzzing")]
pub mod fuzzing;
