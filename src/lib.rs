//! The execution core of a WAM-based logic-programming runtime: tagged
//! machine words, structural unification, trail-based backtracking with
//! choice points and cut, and first-argument indexing.
//!
//! The crate is the innermost layer of such a runtime. Compilation, code
//! and symbol management, arithmetic, constraint solving and garbage
//! collection are external collaborators reached through opaque handles
//! ([`types::Atom`], [`types::CodePtr`]) and traits ([`machine::FdSolver`],
//! [`machine::gc::CollectorHooks`]).

#[macro_use]
extern crate static_assertions;

pub mod indexing;
pub mod machine;
pub mod types;

pub use crate::indexing::SwitchTable;
pub use crate::machine::config::MachineConfig;
pub use crate::machine::gc::CollectorHooks;
pub use crate::machine::machine_errors::{MachineResult, ResourceError};
pub use crate::machine::{FdSolver, MachineMode, MachineState};
pub use crate::types::{Addr, Atom, CodePtr, FunctorArity, Tag, Word};
