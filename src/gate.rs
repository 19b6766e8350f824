//! Gate facade composing the token codec, issuance ledger, and quota enforcer.
//!
//! [`Gate::issue`] turns a trusted "payment confirmed" event into the subject's single token.
//! [`Gate::authorize`] runs the access decision for a presented token: codec verification first,
//! quota consumption second. A token that fails verification never touches the quota.

pub mod decision;

pub use decision::*;

// self
use crate::{
	_prelude::*,
	auth::SubjectId,
	codec::TokenCodec,
	config::GateConfig,
	error::RejectionKind,
	ledger::{IssuanceLedger, IssuedToken},
	obs::{self, GateMetrics, GateOp},
	quota::QuotaEnforcer,
	store::{IssuanceStore, MemoryIssuanceStore, MemoryQuotaStore, QuotaStore},
	upstream::{PaymentConfirmation, PaymentVerifier},
};

/// Download-authorization facade shared by request handlers.
///
/// The gate owns the codec and both ledgers so handlers only deal with tokens, confirmations,
/// and decisions. It is cheap to share behind an [`Arc`]; every method takes `&self`.
#[derive(Clone)]
pub struct Gate {
	config: GateConfig,
	codec: Arc<TokenCodec>,
	ledger: IssuanceLedger,
	quota: QuotaEnforcer,
	/// In-process counters for issuance and access outcomes.
	pub metrics: Arc<GateMetrics>,
}
impl Gate {
	/// Creates a gate over caller-provided stores.
	pub fn new(
		config: GateConfig,
		issuance: Arc<dyn IssuanceStore>,
		quota: Arc<dyn QuotaStore>,
	) -> Result<Self> {
		let codec = Arc::new(
			TokenCodec::new(&config.signing_key).map_err(crate::error::ConfigError::from)?,
		);
		let ledger = IssuanceLedger::new(issuance, codec.clone());
		let quota = QuotaEnforcer::new(quota, config.quota_cap);

		Ok(Self { config, codec, ledger, quota, metrics: Default::default() })
	}

	/// Creates a gate backed by sharded in-memory stores.
	pub fn in_memory(config: GateConfig) -> Result<Self> {
		let issuance = Arc::new(MemoryIssuanceStore::with_shards(config.shard_count));
		let quota = Arc::new(MemoryQuotaStore::with_shards(config.shard_count));

		Self::new(config, issuance, quota)
	}

	/// Active configuration.
	pub fn config(&self) -> &GateConfig {
		&self.config
	}

	/// Codec used for minting and verification.
	pub fn codec(&self) -> &TokenCodec {
		&self.codec
	}

	/// Issuance ledger backing [`Gate::issue`].
	pub fn ledger(&self) -> &IssuanceLedger {
		&self.ledger
	}

	/// Issues (or replays) the token for a confirmation the caller already trusts.
	pub async fn issue(&self, confirmation: &PaymentConfirmation) -> Result<IssuedToken> {
		self.issue_at(confirmation, OffsetDateTime::now_utc()).await
	}

	/// Same as [`Gate::issue`] with `now` as the issuing instant.
	pub async fn issue_at(
		&self,
		confirmation: &PaymentConfirmation,
		now: OffsetDateTime,
	) -> Result<IssuedToken> {
		obs::observe(&self.metrics, GateOp::Issue, "issue", self.issue_confirmed(confirmation, now))
			.await
	}

	/// Issues a token after re-checking the subject with the payment source.
	///
	/// A subject that already holds a token is answered from the ledger without contacting
	/// upstream, so repeated confirmations of one purchase cost a single lookup.
	pub async fn issue_verified(
		&self,
		verifier: &dyn PaymentVerifier,
		subject: &SubjectId,
	) -> Result<IssuedToken> {
		obs::observe(&self.metrics, GateOp::Issue, "issue_verified", async move {
			if let Some(record) = self.ledger.lookup(subject).await? {
				self.metrics.record_issue(true);

				return Ok(IssuedToken { record, replayed: true });
			}

			let confirmation = verifier.confirm(subject).await.map_err(|e| {
				obs::record_rejection(RejectionKind::UpstreamUnavailable);
				obs::trace_rejection(RejectionKind::UpstreamUnavailable, Some(subject));

				Error::from(e)
			})?;
			let confirmation = PaymentConfirmation { subject: subject.clone(), ..confirmation };

			self.issue_confirmed(&confirmation, OffsetDateTime::now_utc()).await
		})
		.await
	}

	/// Runs the access decision against the current clock.
	pub async fn authorize(&self, token: &str) -> Result<AccessGrant> {
		self.authorize_at(token, OffsetDateTime::now_utc()).await
	}

	/// Verifies `token` at `now`, then consumes one use of its subject's quota.
	pub async fn authorize_at(&self, token: &str, now: OffsetDateTime) -> Result<AccessGrant> {
		let result = obs::observe(&self.metrics, GateOp::Authorize, "authorize", async move {
			let claims = self.codec.verify_at(token, now).map_err(Error::from)?;
			let decision = self.quota.try_consume_at(&claims.subject, now).await?;

			if !decision.allowed {
				return Err(Error::QuotaExhausted { subject: claims.subject });
			}

			Ok(AccessGrant {
				subject: claims.subject,
				product: claims.product,
				remaining: decision.remaining,
				expires_at: claims.expires_at,
			})
		})
		.await;

		match &result {
			Ok(_) => self.metrics.record_granted(),
			Err(e) =>
				if let Some(kind) = e.rejection_kind() {
					let subject = match e {
						Error::QuotaExhausted { subject } => Some(subject),
						_ => None,
					};

					self.metrics.record_rejected();
					obs::record_rejection(kind);
					obs::trace_rejection(kind, subject);
				},
		}

		result
	}

	/// Runs the access decision and folds rejections into an [`AccessDecision`].
	///
	/// Only internal failures (storage) surface as `Err`.
	pub async fn decide(&self, token: &str) -> Result<AccessDecision> {
		self.decide_at(token, OffsetDateTime::now_utc()).await
	}

	/// Same as [`Gate::decide`] evaluated at `now`.
	pub async fn decide_at(&self, token: &str, now: OffsetDateTime) -> Result<AccessDecision> {
		AccessDecision::from_result(self.authorize_at(token, now).await)
	}

	/// Downloads left for the subject without consuming one.
	pub async fn remaining(&self, subject: &SubjectId) -> Result<u32> {
		self.quota.remaining(subject).await
	}

	async fn issue_confirmed(
		&self,
		confirmation: &PaymentConfirmation,
		now: OffsetDateTime,
	) -> Result<IssuedToken> {
		if !confirmation.is_paid() {
			return Err(Error::PaymentIncomplete {
				subject: confirmation.subject.clone(),
				status: confirmation.status,
			});
		}

		let PaymentConfirmation { subject, product, .. } = confirmation;
		let ttl = self.config.token_ttl;
		let issued = self.ledger.issue_or_get_at(subject, product, ttl, now).await?;

		self.metrics.record_issue(issued.replayed);

		Ok(issued)
	}
}
impl Debug for Gate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Gate")
			.field("token_ttl", &self.config.token_ttl)
			.field("quota", &self.quota)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::{
		auth::{ProductClass, SigningKey},
		codec::VerifyError,
		upstream::{PaymentFuture, PaymentStatus, UpstreamError},
	};

	fn gate(cap: u32) -> Gate {
		let key = SigningKey::new(b"0123456789abcdef0123456789abcdef".to_vec())
			.expect("Signing key fixture should be valid.");
		let config = GateConfig::builder(key)
			.token_ttl(Duration::hours(1))
			.quota_cap(cap)
			.build()
			.expect("Config fixture should validate.");

		Gate::in_memory(config).expect("Gate should build from the config fixture.")
	}

	fn confirmation(subject: &str) -> PaymentConfirmation {
		PaymentConfirmation::paid(
			SubjectId::new(subject).expect("Subject fixture should be valid."),
			ProductClass::new("lifetime").expect("Product fixture should be valid."),
		)
	}

	struct StaticVerifier(std::result::Result<PaymentStatus, UpstreamError>);
	impl PaymentVerifier for StaticVerifier {
		fn confirm<'a>(&'a self, subject: &'a SubjectId) -> PaymentFuture<'a> {
			let outcome = self.0.clone().map(|status| PaymentConfirmation {
				subject: subject.clone(),
				product: ProductClass::new("monthly").expect("Product fixture should be valid."),
				status,
			});

			Box::pin(async move { outcome })
		}
	}

	#[tokio::test]
	async fn unpaid_confirmation_is_refused() {
		let gate = gate(3);
		let mut event = confirmation("sess_1");

		event.status = PaymentStatus::Unpaid;

		assert!(matches!(
			gate.issue(&event).await,
			Err(Error::PaymentIncomplete { status: PaymentStatus::Unpaid, .. })
		));
		assert_eq!(gate.metrics.issued(), 0);
	}

	#[tokio::test]
	async fn forged_token_never_consumes_quota() {
		let gate = gate(1);
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let issued =
			gate.issue_at(&confirmation("sess_1"), now).await.expect("Issuance should succeed.");
		let mut forged = issued.token().expose().to_owned();
		let last = forged.pop().expect("Token should not be empty.");

		forged.push(if last == 'A' { 'B' } else { 'A' });

		assert!(gate.authorize_at(&forged, now).await.is_err());
		assert_eq!(
			gate.remaining(&issued.record.subject).await.expect("Lookup should succeed."),
			1
		);
		assert_eq!(gate.metrics.rejected(), 1);
	}

	#[tokio::test]
	async fn decide_folds_rejections() {
		let gate = gate(1);
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let issued =
			gate.issue_at(&confirmation("sess_1"), now).await.expect("Issuance should succeed.");
		let token = issued.token().expose();
		let granted = gate.decide_at(token, now).await.expect("Decision should be produced.");
		let exhausted = gate.decide_at(token, now).await.expect("Decision should be produced.");
		let malformed = gate.decide_at("", now).await.expect("Decision should be produced.");

		assert!(granted.allowed);
		assert_eq!(granted.remaining, 0);
		assert_eq!(granted.product.as_deref(), Some("lifetime"));
		assert_eq!(exhausted.rejection, Some(RejectionKind::QuotaExhausted));
		assert_eq!(exhausted.status_code(), 429);
		assert_eq!(malformed.rejection, Some(RejectionKind::MalformedToken));
		assert_eq!(malformed.subject, None);
	}

	#[tokio::test]
	async fn expired_token_reports_expiry_before_quota() {
		let gate = gate(3);
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let issued =
			gate.issue_at(&confirmation("sess_1"), now).await.expect("Issuance should succeed.");

		assert!(matches!(
			gate.authorize_at(issued.token().expose(), now + Duration::hours(2)).await,
			Err(Error::Verify(VerifyError::Expired { .. }))
		));
		assert_eq!(
			gate.remaining(&issued.record.subject).await.expect("Lookup should succeed."),
			3
		);
	}

	#[tokio::test]
	async fn verified_issuance_uses_upstream_product_once() {
		let gate = gate(3);
		let subject = SubjectId::new("sess_v").expect("Subject fixture should be valid.");
		let verifier = StaticVerifier(Ok(PaymentStatus::Paid));
		let first =
			gate.issue_verified(&verifier, &subject).await.expect("Verified issuance should pass.");
		let failing = StaticVerifier(Err(UpstreamError::unavailable("down")));
		let second = gate
			.issue_verified(&failing, &subject)
			.await
			.expect("Existing subjects should not need upstream.");

		assert_eq!(&*first.record.product, "monthly");
		assert!(second.replayed);
		assert_eq!(first.token(), second.token());
	}

	#[tokio::test]
	async fn every_issue_path_is_observed() {
		let gate = gate(3);
		let subject = SubjectId::new("sess_obs").expect("Subject fixture should be valid.");
		let failing = StaticVerifier(Err(UpstreamError::unavailable("down")));

		gate.issue_verified(&failing, &subject).await.expect_err("Outage should fail issuance.");
		gate.issue(&confirmation("sess_obs")).await.expect("Direct issuance should succeed.");
		gate
			.issue_verified(&failing, &subject)
			.await
			.expect("Known subjects should be answered from the ledger.");

		assert_eq!(gate.metrics.attempts(GateOp::Issue), 3);
		assert_eq!(gate.metrics.failures(GateOp::Issue), 1);
		assert_eq!(gate.metrics.issued(), 1);
		assert_eq!(gate.metrics.replayed(), 1);
	}

	#[tokio::test]
	async fn upstream_outage_is_retryable() {
		let gate = gate(3);
		let subject = SubjectId::new("sess_down").expect("Subject fixture should be valid.");
		let verifier = StaticVerifier(Err(
			UpstreamError::unavailable("processor timed out").with_retry_after(Duration::seconds(5))
		));
		let error = gate
			.issue_verified(&verifier, &subject)
			.await
			.expect_err("Upstream outage should fail issuance.");

		assert!(error.is_retryable());
		assert_eq!(error.rejection_kind(), Some(RejectionKind::UpstreamUnavailable));
		assert_eq!(gate.ledger().lookup(&subject).await.expect("Lookup should succeed."), None);
	}
}
