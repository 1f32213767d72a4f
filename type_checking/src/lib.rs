//! Type checking over a bound abstract syntax tree.
//!
//! [`type_system`] owns the types themselves: an arena of type values
//! addressed by copyable [`type_system::TypeId`] handles, with the
//! compatibility and class-hierarchy queries defined on it.
//! [`checker`] walks the tree, computes a type for every node into a
//! [`checker::TypeAnalysis`] side table and reports violations through
//! [`diagnostics::Diagnostics`].
//!
//! The checker expects the binder to have run first; unresolved names
//! type as [`type_system::TypeSystem::UNKNOWN`], which is compatible
//! with everything so one binding error does not cascade.

pub mod checker;
pub mod type_system;

pub use crate::checker::{check, TypeAnalysis, TypeError};
pub use crate::type_system::{FieldDef, TypeId, TypeSystem, TypeValue};
