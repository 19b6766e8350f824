// self
use crate::{
	error::RejectionKind,
	obs::{GateOp, OpOutcome},
};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_op_outcome(op: GateOp, outcome: OpOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"download_gate_op_total",
			"op" => op.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (op, outcome);
	}
}

/// Records an access rejection via the global metrics recorder (when enabled).
pub fn record_rejection(kind: RejectionKind) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("download_gate_rejection_total", "kind" => kind.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = kind;
	}
}
