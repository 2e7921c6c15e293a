//! Outbound adapters implementing domain ports.
//!
//! - **memory**: transactional in-process store for tests and embedding
//! - **persistence**: PostgreSQL-backed store using Diesel ORM
//!
//! Adapters translate between domain types and storage representations.
//! They contain no business logic.

pub mod memory;
pub mod persistence;

pub use memory::InMemoryStore;
