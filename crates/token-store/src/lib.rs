//! Persistent token storage
//!
//! One JSON snapshot maps `"tenant:kind"` keys to token records. The file is
//! the durable copy of the broker's credential state: the pool reads and
//! writes through an in-memory map, and every mutation is persisted with an
//! atomic temp-file + rename so a crash mid-write can never corrupt it.
//!
//! The store does not serialize refreshes — that is the refresh lock's job
//! in the pool crate. It only guarantees that individual row writes are
//! atomic and that concurrent mutations never corrupt the snapshot.

mod error;
mod record;
mod store;

pub use error::{Error, Result};
pub use record::TokenRecord;
pub use store::TokenStore;
