// self
use crate::{_prelude::*, auth::SubjectId, error::RejectionKind, obs::GateOp};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used by gate operations.
#[derive(Clone, Debug)]
pub struct GateSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl GateSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(op: GateOp, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("download_gate.op", op = op.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (op, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs an access rejection; signature failures are raised as a potential abuse signal.
///
/// `subject` must only be supplied once the token's signature has verified.
pub fn trace_rejection(kind: RejectionKind, subject: Option<&SubjectId>) {
	#[cfg(feature = "tracing")]
	{
		let subject = subject.map(|s| s.as_ref()).unwrap_or("-");

		match kind {
			RejectionKind::BadSignature => tracing::warn!(
				kind = kind.as_str(),
				"Rejected download token with a forged signature."
			),
			_ => tracing::info!(kind = kind.as_str(), subject, "Rejected download request."),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, subject);
	}
}
