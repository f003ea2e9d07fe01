//! Intermediate representation: functions as CFGs of basic blocks
//! holding statements over named (and, after renaming, versioned)
//! variables.

use crate::declare_entity;

declare_entity!(Func, "func");
declare_entity!(Block, "block");
declare_entity!(Var, "var");
declare_entity!(Version, "v");

mod display;
mod func;
mod module;

pub use display::*;
pub use func::*;
pub use module::*;
