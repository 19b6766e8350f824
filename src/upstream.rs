//! Payment-confirmation contracts for the collaborator that talks to the payment processor.
//!
//! The gate never speaks a processor protocol itself. Callers either hand it a
//! [`PaymentConfirmation`] they already trust, or plug in a [`PaymentVerifier`] that re-checks the
//! subject against the processor's source of truth before a token is minted.

// self
use crate::{
	_prelude::*,
	auth::{ProductClass, SubjectId},
};

/// Boxed future returned by [`PaymentVerifier::confirm`].
pub type PaymentFuture<'a> =
	Pin<Box<dyn Future<Output = Result<PaymentConfirmation, UpstreamError>> + 'a + Send>>;

/// Re-verifies a payment event against the processor.
///
/// Implementations own their timeouts and cancellation; the gate awaits the future once and maps
/// any failure to [`crate::error::RejectionKind::UpstreamUnavailable`].
pub trait PaymentVerifier
where
	Self: Send + Sync,
{
	/// Looks up the payment behind `subject`.
	fn confirm<'a>(&'a self, subject: &'a SubjectId) -> PaymentFuture<'a>;
}

/// Settlement state reported by the processor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
	/// Funds were captured.
	Paid,
	/// Checkout finished without payment yet.
	Unpaid,
	/// Checkout required no payment (e.g. a full discount).
	NoPaymentRequired,
}
impl PaymentStatus {
	/// Returns a stable label suitable for logs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Paid => "paid",
			Self::Unpaid => "unpaid",
			Self::NoPaymentRequired => "no_payment_required",
		}
	}
}
impl Display for PaymentStatus {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// "Payment confirmed" event that authorizes issuance for a subject.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
	/// Processor-assigned payment event identifier.
	pub subject: SubjectId,
	/// Artifact class purchased.
	pub product: ProductClass,
	/// Settlement state.
	pub status: PaymentStatus,
}
impl PaymentConfirmation {
	/// Builds a confirmation for a settled payment.
	pub fn paid(subject: SubjectId, product: ProductClass) -> Self {
		Self { subject, product, status: PaymentStatus::Paid }
	}

	/// Returns `true` when the payment is settled.
	pub fn is_paid(&self) -> bool {
		matches!(self.status, PaymentStatus::Paid)
	}
}

/// Transient failure reaching the payment source; safe to retry with backoff.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum UpstreamError {
	/// The processor could not be reached or answered unexpectedly.
	#[error("Payment confirmation is unavailable: {message}.")]
	Unavailable {
		/// Collaborator-supplied description.
		message: String,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
}
impl UpstreamError {
	/// Builds an [`UpstreamError::Unavailable`] without a retry hint.
	pub fn unavailable(message: impl Into<String>) -> Self {
		Self::Unavailable { message: message.into(), retry_after: None }
	}

	/// Attaches a retry hint.
	pub fn with_retry_after(self, hint: Duration) -> Self {
		match self {
			Self::Unavailable { message, .. } =>
				Self::Unavailable { message, retry_after: Some(hint) },
		}
	}

	/// Retry hint supplied by the collaborator.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::Unavailable { retry_after, .. } => *retry_after,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retry_hint_round_trips() {
		let error = UpstreamError::unavailable("processor timed out")
			.with_retry_after(Duration::seconds(30));

		assert_eq!(error.retry_after(), Some(Duration::seconds(30)));
		assert_eq!(error.to_string(), "Payment confirmation is unavailable: processor timed out.");
	}

	#[test]
	fn confirmation_reports_settlement() {
		let subject = SubjectId::new("sess_1").expect("Subject fixture should be valid.");
		let product = ProductClass::new("lifetime").expect("Product fixture should be valid.");
		let mut confirmation = PaymentConfirmation::paid(subject, product);

		assert!(confirmation.is_paid());

		confirmation.status = PaymentStatus::Unpaid;

		assert!(!confirmation.is_paid());
		assert_eq!(confirmation.status.to_string(), "unpaid");
	}
}
