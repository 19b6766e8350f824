//! Immutable issuance records written once per payment event.

// self
use crate::{
	_prelude::*,
	auth::{ProductClass, SubjectId, token::secret::AccessToken},
};

/// Lifecycle status of an issued token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantStatus {
	/// Token is currently valid.
	Active,
	/// Token reached its expiry instant.
	Expired,
}

/// The single token minted for a subject, plus the instants that bound it.
///
/// Records are never updated after insertion; a store replaces them only by purging.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceRecord {
	/// Payment event the token was minted for.
	pub subject: SubjectId,
	/// Artifact class the token unlocks.
	pub product: ProductClass,
	/// Encoded token; callers must avoid logging it.
	pub token: AccessToken,
	/// Instant the token was minted.
	pub issued_at: OffsetDateTime,
	/// Instant the token stops verifying.
	pub expires_at: OffsetDateTime,
}
impl IssuanceRecord {
	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> GrantStatus {
		if instant >= self.expires_at { GrantStatus::Expired } else { GrantStatus::Active }
	}

	/// Returns `true` if the record has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), GrantStatus::Expired)
	}

	/// Returns `true` if the record is expired relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}
}
impl Debug for IssuanceRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IssuanceRecord")
			.field("subject", &self.subject)
			.field("product", &self.product)
			.field("token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
