//! Driven ports for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod store;

#[cfg(test)]
pub use store::MockStoreTx;
pub use store::{
    FeedbackQuery, FeedbackSelection, FeedbackTally, PAGE_SIZE_DEFAULT, PAGE_SIZE_MAX, Page,
    ReportScope, Store, StoreError, StoreTx, TxFuture,
};
