//! Query execution module
//!
//! This module contains the condition matcher and the join engine.

pub mod condition;
pub mod join;

pub use condition::{Condition, Operator, Predicate};
pub use join::{join, JoinMode};
