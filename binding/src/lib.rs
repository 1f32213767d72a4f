//! Name analysis over the abstract syntax tree.
//!
//! Three passes run in order, each a full traversal:
//!
//! 1. [`binder::bind`] resolves every name use to its declaration and
//!    fills the back-reference slots the parser left empty. Scoping
//!    errors (undeclared names, redefinitions, stray `break`) are
//!    reported here and nowhere else.
//! 2. [`escapes::compute`] flags variables that are used from a deeper
//!    nesting level than the one they were declared at, so later stages
//!    know which variables must not live in registers.
//! 3. [`renamer::rename`] gives every declaration a globally unique name
//!    so downstream passes can ignore scoping entirely.
//!
//! The binder reports through [`diagnostics::Diagnostics`]; the escape
//! analyzer and the renamer cannot fail and must only run on a tree the
//! binder accepted.

pub mod binder;
pub mod escapes;
pub mod renamer;

pub use crate::binder::{bind, BindError, NamespaceKind};
pub use crate::renamer::rename;

/// The name of the program entry point. It is bound like any other
/// top-level function but may only be declared once, and the renamer
/// leaves it alone.
pub const ENTRY_POINT: &str = "_main";
