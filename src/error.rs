//! Gate-level error types shared across the codec, ledger, quota, and stores.

// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, SigningKeyError, SubjectId},
	codec::VerifyError,
	upstream::{PaymentStatus, UpstreamError},
};

/// Gate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical gate error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token failed structural, cryptographic, or expiry validation.
	#[error(transparent)]
	Verify(#[from] VerifyError),
	/// Payment-confirmation dependency failed; retry with backoff.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),

	/// Subject has used every download its purchase allows.
	#[error("Download quota exhausted for subject {subject}.")]
	QuotaExhausted {
		/// Subject whose quota reached zero.
		subject: SubjectId,
	},
	/// Upstream reports the payment as not completed.
	#[error("Payment for subject {subject} is not completed ({status}).")]
	PaymentIncomplete {
		/// Subject whose payment is incomplete.
		subject: SubjectId,
		/// Status reported by the payment source.
		status: PaymentStatus,
	},
}
impl Error {
	/// Classifies the error for transport mapping, when it is an access rejection.
	pub fn rejection_kind(&self) -> Option<RejectionKind> {
		match self {
			Self::Verify(VerifyError::Malformed { .. }) => Some(RejectionKind::MalformedToken),
			Self::Verify(VerifyError::BadSignature) => Some(RejectionKind::BadSignature),
			Self::Verify(VerifyError::Expired { .. }) => Some(RejectionKind::Expired),
			Self::QuotaExhausted { .. } => Some(RejectionKind::QuotaExhausted),
			Self::Upstream(_) => Some(RejectionKind::UpstreamUnavailable),
			Self::Storage(_) | Self::Config(_) | Self::PaymentIncomplete { .. } => None,
		}
	}

	/// Returns `true` when the caller may retry with backoff.
	pub fn is_retryable(&self) -> bool {
		self.rejection_kind().is_some_and(RejectionKind::is_retryable)
	}
}

/// Transport-independent rejection taxonomy reported to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
	/// Token could not be decoded or has the wrong shape.
	MalformedToken,
	/// Token signature does not match its fields (tampering or key mismatch).
	BadSignature,
	/// Token is past its validity window.
	Expired,
	/// Subject has no downloads left.
	QuotaExhausted,
	/// Payment confirmation could not be completed.
	UpstreamUnavailable,
}
impl RejectionKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::MalformedToken => "malformed_token",
			Self::BadSignature => "bad_signature",
			Self::Expired => "expired",
			Self::QuotaExhausted => "quota_exhausted",
			Self::UpstreamUnavailable => "upstream_unavailable",
		}
	}

	/// Suggested HTTP status for the rejection.
	pub const fn status_code(self) -> u16 {
		match self {
			Self::MalformedToken => 400,
			Self::BadSignature | Self::Expired => 403,
			Self::QuotaExhausted => 429,
			Self::UpstreamUnavailable => 503,
		}
	}

	/// Only transient upstream failures are eligible for retries.
	pub const fn is_retryable(self) -> bool {
		matches!(self, Self::UpstreamUnavailable)
	}
}
impl Display for RejectionKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised by the gate.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Signing key material is unusable.
	#[error(transparent)]
	SigningKey(#[from] SigningKeyError),
	/// A required setting was not supplied.
	#[error("Missing required setting `{name}`.")]
	Missing {
		/// Setting name (environment variable or field).
		name: &'static str,
	},
	/// A setting could not be parsed.
	#[error("Setting `{name}` is invalid: {reason}.")]
	Invalid {
		/// Setting name (environment variable or field).
		name: &'static str,
		/// Human-readable parse failure.
		reason: String,
	},
	/// A duration setting must be strictly positive.
	#[error("Setting `{name}` must be positive.")]
	NonPositive {
		/// Setting name (environment variable or field).
		name: &'static str,
	},
	/// A duration setting exceeds its upper bound.
	#[error("Setting `{name}` must not exceed {max}.")]
	TooLarge {
		/// Setting name (environment variable or field).
		name: &'static str,
		/// Largest accepted value.
		max: Duration,
	},
	/// Caller-supplied identifier failed validation.
	#[error(transparent)]
	Identifier(#[from] IdentifierError),
}
