//! Mint-once issuance keyed by payment event.
//!
//! [`IssuanceLedger::issue_or_get`] returns the stored token when the subject was already
//! issued one, even if a later call asks for a different lifetime or product: the first mint is
//! authoritative. For an unseen subject it mints a candidate and hands it to
//! [`IssuanceStore::insert_if_absent`]; when two callers race, the store keeps exactly one
//! candidate and both callers return that record. A losing candidate is dropped without ever
//! leaving this module.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, IssuanceRecord, ProductClass, SubjectId},
	codec::TokenCodec,
	store::IssuanceStore,
};

/// Query parameter used when embedding a token in a download link.
pub const TOKEN_QUERY_PARAM: &str = "token";

/// The authoritative token for a subject, plus whether this call minted it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
	/// Stored issuance record.
	pub record: IssuanceRecord,
	/// `true` when the record already existed (idempotent replay).
	pub replayed: bool,
}
impl IssuedToken {
	/// Encoded token to hand to the purchaser.
	pub fn token(&self) -> &AccessToken {
		&self.record.token
	}

	/// Appends the token to `base` as the `token` query parameter.
	///
	/// Tokens use the URL-safe alphabet without padding, so the query value needs no escaping.
	pub fn download_url(&self, base: &Url) -> Url {
		let mut url = base.clone();

		url.query_pairs_mut().append_pair(TOKEN_QUERY_PARAM, self.record.token.expose());

		url
	}
}

/// Maps payment events to the single token issued for each.
#[derive(Clone)]
pub struct IssuanceLedger {
	store: Arc<dyn IssuanceStore>,
	codec: Arc<TokenCodec>,
}
impl IssuanceLedger {
	/// Creates a ledger that mints with `codec` and records into `store`.
	pub fn new(store: Arc<dyn IssuanceStore>, codec: Arc<TokenCodec>) -> Self {
		Self { store, codec }
	}

	/// Returns the subject's token, minting one that lives for `ttl` if none exists.
	pub async fn issue_or_get(
		&self,
		subject: &SubjectId,
		product: &ProductClass,
		ttl: Duration,
	) -> Result<IssuedToken> {
		self.issue_or_get_at(subject, product, ttl, OffsetDateTime::now_utc()).await
	}

	/// Same as [`IssuanceLedger::issue_or_get`] with `now` as the issuing instant.
	pub async fn issue_or_get_at(
		&self,
		subject: &SubjectId,
		product: &ProductClass,
		ttl: Duration,
		now: OffsetDateTime,
	) -> Result<IssuedToken> {
		if let Some(record) = self.store.fetch(subject).await? {
			return Ok(IssuedToken { record, replayed: true });
		}

		let minted = self.codec.mint_at(subject, product, ttl, now);
		let candidate = IssuanceRecord {
			subject: subject.clone(),
			product: product.clone(),
			token: minted.token,
			issued_at: now,
			expires_at: minted.claims.expires_at,
		};
		let outcome = self.store.insert_if_absent(candidate).await?;
		let replayed = !outcome.was_inserted();

		Ok(IssuedToken { record: outcome.into_record(), replayed })
	}

	/// Fetches the record issued for the subject without minting.
	pub async fn lookup(&self, subject: &SubjectId) -> Result<Option<IssuanceRecord>> {
		Ok(self.store.fetch(subject).await?)
	}

	/// Drops records whose tokens expired at or before `now`.
	pub async fn purge_expired(&self, now: OffsetDateTime) -> Result<usize> {
		Ok(self.store.purge_expired(now).await?)
	}
}
impl Debug for IssuanceLedger {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuanceLedger").field("codec", &self.codec).finish()
	}
}
