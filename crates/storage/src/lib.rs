//! Storage backends for the coaching pipeline.
//!
//! The [`Storage`] trait is the pipeline's whole view of the host
//! platform's database: attempt queries, persisted dimension rows, the org
//! directory, and the audit log sink. Backends plug in underneath it.

mod mem;
mod trait_;

#[cfg(feature = "postgres")]
mod postgres;

pub use mem::MemStorage;
pub use trait_::{
    AttemptStamp, LastAttempt, Member, NotificationPrefs, Result, Role, Storage, StorageError,
};

#[cfg(feature = "postgres")]
pub use postgres::PgStorage;
