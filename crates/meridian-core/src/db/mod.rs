//! Embedded versioned store: current and history tables for the three
//! element kinds, the changeset table, id sequences, and the snapshot
//! transaction that gives every upload all-or-nothing semantics.

mod lock;
mod row;
mod store;
mod transaction;

pub use lock::*;
pub use row::*;
pub use store::*;
pub use transaction::*;
