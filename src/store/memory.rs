//! Sharded in-memory stores for local development, tests, and single-instance deployments.
//!
//! Each map is split into independently locked shards chosen by subject hash, so operations on
//! different subjects only contend when they land in the same shard, and never across the
//! issuance and quota maps.

// self
use crate::{
	_prelude::*,
	auth::{IssuanceRecord, SubjectId},
	quota::{QuotaDecision, QuotaRecord},
	store::{InsertOutcome, IssuanceStore, QuotaStore, StoreFuture},
};

/// Shard count used by the `Default` implementations.
pub const DEFAULT_SHARD_COUNT: usize = 16;

type Shard<V> = RwLock<HashMap<SubjectId, V>>;

#[derive(Debug)]
struct Shards<V>(Box<[Shard<V>]>);
impl<V> Shards<V> {
	fn new(count: usize) -> Self {
		Self((0..count.max(1)).map(|_| RwLock::new(HashMap::new())).collect())
	}

	fn shard(&self, subject: &SubjectId) -> &Shard<V> {
		let mut hasher = DefaultHasher::new();

		subject.hash(&mut hasher);

		let idx = (hasher.finish() % self.0.len() as u64) as usize;

		&self.0[idx]
	}

	fn retain(&self, mut keep: impl FnMut(&V) -> bool) -> usize {
		self.0
			.iter()
			.map(|shard| {
				let mut guard = shard.write();
				let before = guard.len();

				guard.retain(|_, value| keep(value));

				before - guard.len()
			})
			.sum()
	}

	fn len(&self) -> usize {
		self.0.iter().map(|shard| shard.read().len()).sum()
	}
}

/// Thread-safe issuance store that keeps records in-process.
#[derive(Clone, Debug)]
pub struct MemoryIssuanceStore(Arc<Shards<IssuanceRecord>>);
impl MemoryIssuanceStore {
	/// Creates a store with the provided shard count (minimum one).
	pub fn with_shards(count: usize) -> Self {
		Self(Arc::new(Shards::new(count)))
	}

	/// Number of records currently held.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no records are held.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn insert_now(shards: &Shards<IssuanceRecord>, record: IssuanceRecord) -> InsertOutcome {
		let mut guard = shards.shard(&record.subject).write();

		match guard.get(&record.subject) {
			Some(existing) => InsertOutcome::Existing(existing.clone()),
			None => {
				guard.insert(record.subject.clone(), record.clone());

				InsertOutcome::Inserted(record)
			},
		}
	}
}
impl Default for MemoryIssuanceStore {
	fn default() -> Self {
		Self::with_shards(DEFAULT_SHARD_COUNT)
	}
}
impl IssuanceStore for MemoryIssuanceStore {
	fn insert_if_absent(&self, record: IssuanceRecord) -> StoreFuture<'_, InsertOutcome> {
		let shards = self.0.clone();

		Box::pin(async move { Ok(Self::insert_now(&shards, record)) })
	}

	fn fetch<'a>(&'a self, subject: &'a SubjectId) -> StoreFuture<'a, Option<IssuanceRecord>> {
		let shards = self.0.clone();
		let subject = subject.to_owned();

		Box::pin(async move { Ok(shards.shard(&subject).read().get(&subject).cloned()) })
	}

	fn purge_expired(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		let shards = self.0.clone();

		Box::pin(async move { Ok(shards.retain(|record| !record.is_expired_at(now))) })
	}
}

/// Thread-safe quota store that keeps counters in-process.
#[derive(Clone, Debug)]
pub struct MemoryQuotaStore(Arc<Shards<QuotaRecord>>);
impl MemoryQuotaStore {
	/// Creates a store with the provided shard count (minimum one).
	pub fn with_shards(count: usize) -> Self {
		Self(Arc::new(Shards::new(count)))
	}

	/// Number of counters currently held.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no counters are held.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn consume_now(
		shards: &Shards<QuotaRecord>,
		subject: SubjectId,
		cap: u32,
		now: OffsetDateTime,
	) -> QuotaDecision {
		let mut guard = shards.shard(&subject).write();

		guard.entry(subject).or_insert_with(|| QuotaRecord::new(cap, now)).consume()
	}
}
impl Default for MemoryQuotaStore {
	fn default() -> Self {
		Self::with_shards(DEFAULT_SHARD_COUNT)
	}
}
impl QuotaStore for MemoryQuotaStore {
	fn try_consume<'a>(
		&'a self,
		subject: &'a SubjectId,
		cap: u32,
		now: OffsetDateTime,
	) -> StoreFuture<'a, QuotaDecision> {
		let shards = self.0.clone();
		let subject = subject.to_owned();

		Box::pin(async move { Ok(Self::consume_now(&shards, subject, cap, now)) })
	}

	fn remaining<'a>(&'a self, subject: &'a SubjectId) -> StoreFuture<'a, Option<u32>> {
		let shards = self.0.clone();
		let subject = subject.to_owned();

		Box::pin(async move {
			Ok(shards.shard(&subject).read().get(&subject).map(|record| record.remaining))
		})
	}
}
