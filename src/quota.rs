//! Per-subject download quotas.
//!
//! The enforcer is a thin policy layer over a [`QuotaStore`]: it fixes the cap and turns an
//! exhausted counter into [`Error::QuotaExhausted`]. Counters are keyed by subject rather than by
//! token string, so any token ever minted for a subject draws from the same budget. Counters are
//! never evicted: an exhausted subject stays exhausted even after its issuance record is purged
//! and a fresh token is minted for it.

// self
use crate::{_prelude::*, auth::SubjectId, store::QuotaStore};

/// Reference number of downloads granted per purchase.
pub const DEFAULT_QUOTA_CAP: u32 = 3;

/// Outcome of a single consumption attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
	/// Whether a use was granted.
	pub allowed: bool,
	/// Uses left after this attempt.
	pub remaining: u32,
}

/// Stored counter for one subject.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
	/// Uses left.
	pub remaining: u32,
	/// Instant of the first consumption attempt.
	pub first_used_at: OffsetDateTime,
}
impl QuotaRecord {
	/// Creates a counter holding `cap` uses.
	pub fn new(cap: u32, now: OffsetDateTime) -> Self {
		Self { remaining: cap, first_used_at: now }
	}

	/// Decrements with a floor of zero. Callers must hold the per-key lock.
	pub fn consume(&mut self) -> QuotaDecision {
		if self.remaining == 0 {
			return QuotaDecision { allowed: false, remaining: 0 };
		}

		self.remaining -= 1;

		QuotaDecision { allowed: true, remaining: self.remaining }
	}
}

/// Applies a fixed cap to a [`QuotaStore`].
#[derive(Clone)]
pub struct QuotaEnforcer {
	store: Arc<dyn QuotaStore>,
	cap: u32,
}
impl QuotaEnforcer {
	/// Creates an enforcer granting `cap` uses per subject.
	pub fn new(store: Arc<dyn QuotaStore>, cap: u32) -> Self {
		Self { store, cap }
	}

	/// Configured per-subject cap.
	pub fn cap(&self) -> u32 {
		self.cap
	}

	/// Consumes one use, reporting the decision without treating exhaustion as an error.
	pub async fn try_consume_at(
		&self,
		subject: &SubjectId,
		now: OffsetDateTime,
	) -> Result<QuotaDecision> {
		Ok(self.store.try_consume(subject, self.cap, now).await?)
	}

	/// Consumes one use against the current clock.
	pub async fn try_consume(&self, subject: &SubjectId) -> Result<QuotaDecision> {
		self.try_consume_at(subject, OffsetDateTime::now_utc()).await
	}

	/// Consumes one use, failing with [`Error::QuotaExhausted`] when none remain.
	pub async fn consume_at(&self, subject: &SubjectId, now: OffsetDateTime) -> Result<u32> {
		let decision = self.try_consume_at(subject, now).await?;

		if decision.allowed {
			Ok(decision.remaining)
		} else {
			Err(Error::QuotaExhausted { subject: subject.clone() })
		}
	}

	/// Uses left for the subject; a subject never seen reports the full cap.
	pub async fn remaining(&self, subject: &SubjectId) -> Result<u32> {
		Ok(self.store.remaining(subject).await?.unwrap_or(self.cap))
	}
}
impl Debug for QuotaEnforcer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("QuotaEnforcer").field("cap", &self.cap).finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::store::MemoryQuotaStore;

	fn subject(value: &str) -> SubjectId {
		SubjectId::new(value).expect("Subject fixture should be valid.")
	}

	#[test]
	fn record_floors_at_zero() {
		let mut record = QuotaRecord::new(1, macros::datetime!(2025-01-01 00:00 UTC));

		assert_eq!(record.consume(), QuotaDecision { allowed: true, remaining: 0 });
		assert_eq!(record.consume(), QuotaDecision { allowed: false, remaining: 0 });
		assert_eq!(record.remaining, 0);
	}

	#[tokio::test]
	async fn four_calls_against_cap_three() {
		let enforcer = QuotaEnforcer::new(Arc::new(MemoryQuotaStore::default()), 3);
		let subject = subject("sess_1");
		let mut allowed = Vec::new();
		let mut remaining = Vec::new();

		for _ in 0..4 {
			let decision =
				enforcer.try_consume(&subject).await.expect("Memory store should not fail.");

			allowed.push(decision.allowed);
			remaining.push(decision.remaining);
		}

		assert_eq!(allowed, [true, true, true, false]);
		assert_eq!(remaining, [2, 1, 0, 0]);
	}

	#[tokio::test]
	async fn exhaustion_is_reported_as_error() {
		let enforcer = QuotaEnforcer::new(Arc::new(MemoryQuotaStore::default()), 1);
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let subject = subject("sess_1");

		assert_eq!(enforcer.consume_at(&subject, now).await.expect("First use is allowed."), 0);
		assert!(matches!(
			enforcer.consume_at(&subject, now).await,
			Err(Error::QuotaExhausted { subject: s }) if s.as_ref() == "sess_1"
		));
	}

	#[tokio::test]
	async fn zero_cap_refuses_immediately() {
		let enforcer = QuotaEnforcer::new(Arc::new(MemoryQuotaStore::default()), 0);
		let decision =
			enforcer.try_consume(&subject("sess_1")).await.expect("Memory store should not fail.");

		assert_eq!(decision, QuotaDecision { allowed: false, remaining: 0 });
	}

	#[tokio::test]
	async fn remaining_defaults_to_cap_and_isolates_subjects() {
		let enforcer = QuotaEnforcer::new(Arc::new(MemoryQuotaStore::default()), 2);
		let a = subject("sess_a");
		let b = subject("sess_b");

		enforcer.try_consume(&a).await.expect("Memory store should not fail.");
		enforcer.try_consume(&a).await.expect("Memory store should not fail.");

		assert_eq!(enforcer.remaining(&a).await.expect("Memory store should not fail."), 0);
		assert_eq!(enforcer.remaining(&b).await.expect("Memory store should not fail."), 2);
		assert!(enforcer.try_consume(&b).await.expect("Memory store should not fail.").allowed);
	}
}
