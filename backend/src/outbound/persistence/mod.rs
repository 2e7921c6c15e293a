//! PostgreSQL persistence adapter using Diesel ORM.
//!
//! [`DieselStore`] implements the domain [`Store`](crate::domain::ports::Store)
//! port over a `bb8` pool of `diesel-async` connections.
//!
//! - **Thin adapter**: the store only translates between Diesel rows and
//!   domain records. Rules live in the domain.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Strongly typed errors**: database failures are mapped to
//!   [`StoreError`](crate::domain::ports::StoreError) before the domain sees
//!   them.
//!
//! # Example
//!
//! ```ignore
//! use feedback_engine::outbound::persistence::{DbPool, DieselStore, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/feedback")).await?;
//! let store = DieselStore::new(pool);
//! ```

mod diesel_store;
mod error_mapping;
mod models;
mod pool;
mod schema;

pub use diesel_store::DieselStore;
pub use pool::{DbPool, PoolConfig, PoolError};
