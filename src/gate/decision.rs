//! Access decision payloads returned to the transport layer.

// self
use crate::{
	_prelude::*,
	auth::{ProductClass, SubjectId},
	error::RejectionKind,
};

/// A granted download: one use was consumed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccessGrant {
	/// Subject the token belongs to.
	pub subject: SubjectId,
	/// Artifact class to deliver.
	pub product: ProductClass,
	/// Uses left after this download.
	pub remaining: u32,
	/// Token expiry, carried for caching hints.
	#[serde(with = "time::serde::rfc3339")]
	pub expires_at: OffsetDateTime,
}

/// Serializable allow/deny outcome for a presented token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
	/// Whether the artifact may be delivered.
	pub allowed: bool,
	/// Uses left for the subject; zero on rejection.
	pub remaining: u32,
	/// Subject, present once the signature has verified.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub subject: Option<SubjectId>,
	/// Artifact class, present on grants.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub product: Option<ProductClass>,
	/// Rejection classification, present on denials.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rejection: Option<RejectionKind>,
}
impl AccessDecision {
	/// Builds an allow decision from a grant.
	pub fn granted(grant: AccessGrant) -> Self {
		Self {
			allowed: true,
			remaining: grant.remaining,
			subject: Some(grant.subject),
			product: Some(grant.product),
			rejection: None,
		}
	}

	/// Builds a deny decision.
	pub fn rejected(kind: RejectionKind, subject: Option<SubjectId>) -> Self {
		Self { allowed: false, remaining: 0, subject, product: None, rejection: Some(kind) }
	}

	/// Folds an authorization result, passing through errors that are not rejections.
	pub fn from_result(result: Result<AccessGrant>) -> Result<Self> {
		match result {
			Ok(grant) => Ok(Self::granted(grant)),
			Err(e) => match e.rejection_kind() {
				Some(kind) => {
					let subject = match e {
						Error::QuotaExhausted { subject } => Some(subject),
						_ => None,
					};

					Ok(Self::rejected(kind, subject))
				},
				None => Err(e),
			},
		}
	}

	/// Suggested HTTP status: 200 on grants, the rejection's class otherwise.
	pub fn status_code(&self) -> u16 {
		self.rejection.map_or(200, RejectionKind::status_code)
	}
}
