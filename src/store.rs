//! Storage contracts and built-in store implementations for issuance and quota records.
//!
//! Both contracts expose only per-key atomic operations (insert-if-absent, consume-with-floor,
//! expiry purges) and never a raw `set`, so the linearizability the ledger and quota enforcer
//! rely on holds for any backend that implements them faithfully. A shared key-value store with
//! compare-and-set and decrement-with-floor primitives can replace the in-process maps without
//! changing callers.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::{MemoryIssuanceStore, MemoryQuotaStore};

// self
use crate::{
	_prelude::*,
	auth::{IssuanceRecord, SubjectId},
	quota::QuotaDecision,
};

/// Boxed future returned by every store operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Mint-once storage for issuance records keyed by subject.
pub trait IssuanceStore
where
	Self: Send + Sync,
{
	/// Inserts the record unless one already exists for its subject, atomically.
	///
	/// When a record exists it is returned untouched and `record` is discarded.
	fn insert_if_absent(&self, record: IssuanceRecord) -> StoreFuture<'_, InsertOutcome>;

	/// Fetches the record issued for the subject, if present.
	fn fetch<'a>(&'a self, subject: &'a SubjectId) -> StoreFuture<'a, Option<IssuanceRecord>>;

	/// Removes every record whose token expired at or before `now`, returning the count.
	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize>;
}

/// Consumption counters keyed by subject.
pub trait QuotaStore
where
	Self: Send + Sync,
{
	/// Atomically initializes the counter to `cap` on first use and decrements it with a floor
	/// of zero.
	fn try_consume<'a>(
		&'a self,
		subject: &'a SubjectId,
		cap: u32,
		now: OffsetDateTime,
	) -> StoreFuture<'a, QuotaDecision>;

	/// Reports remaining uses without consuming; `None` when the subject was never seen.
	fn remaining<'a>(&'a self, subject: &'a SubjectId) -> StoreFuture<'a, Option<u32>>;
}

/// Result of an [`IssuanceStore::insert_if_absent`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
	/// The caller's record was stored.
	Inserted(IssuanceRecord),
	/// Another record already owned the subject; it is returned unchanged.
	Existing(IssuanceRecord),
}
impl InsertOutcome {
	/// Returns `true` when the caller's record won.
	pub fn was_inserted(&self) -> bool {
		matches!(self, Self::Inserted(_))
	}

	/// Returns the authoritative record for the subject.
	pub fn into_record(self) -> IssuanceRecord {
		match self {
			Self::Inserted(record) | Self::Existing(record) => record,
		}
	}
}

/// Error type produced by store implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
