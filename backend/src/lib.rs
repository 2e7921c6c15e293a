//! Access-control and lifecycle engine for a team feedback platform.
//!
//! The [`domain`] module holds the rules: who may do what, how feedback moves
//! through its lifecycle, who sees which records, and the structural
//! guarantees (a last administrator, one manager per team) that must survive
//! concurrent edits. [`outbound`] provides the stores the domain runs on.

pub mod config;
pub mod domain;
pub mod outbound;
