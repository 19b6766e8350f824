//! Optional observability helpers for gate operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `download_gate.op` with the `op` and `stage`
//!   (call site) fields, plus a `warn!` abuse signal whenever a token fails signature checks.
//! - Enable `metrics` to increment `download_gate_op_total` (labeled by `op` + `outcome`) and
//!   `download_gate_rejection_total` (labeled by `kind`).
//!
//! Neither helper ever receives token text or key material.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Gate operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GateOp {
	/// Token issuance (mint or replay).
	Issue,
	/// Access decision for a presented token.
	Authorize,
	/// Expiry-based eviction pass.
	Sweep,
}
impl GateOp {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GateOp::Issue => "issue",
			GateOp::Authorize => "authorize",
			GateOp::Sweep => "sweep",
		}
	}

	const fn index(self) -> usize {
		match self {
			GateOp::Issue => 0,
			GateOp::Authorize => 1,
			GateOp::Sweep => 2,
		}
	}
}
impl Display for GateOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a gate operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a [`GateSpan`], recording the attempt and its outcome for `op`.
pub(crate) async fn observe<T, Fut>(
	metrics: &GateMetrics,
	op: GateOp,
	stage: &'static str,
	fut: Fut,
) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = GateSpan::new(op, stage);

	metrics.attempts[op.index()].fetch_add(1, Ordering::Relaxed);
	record_op_outcome(op, OpOutcome::Attempt);

	let result = span.instrument(fut).await;

	match &result {
		Ok(_) => record_op_outcome(op, OpOutcome::Success),
		Err(_) => {
			metrics.failures[op.index()].fetch_add(1, Ordering::Relaxed);
			record_op_outcome(op, OpOutcome::Failure);
		},
	}

	result
}

/// Thread-safe in-process counters, available regardless of cargo features.
#[derive(Debug, Default)]
pub struct GateMetrics {
	issued: AtomicU64,
	replayed: AtomicU64,
	granted: AtomicU64,
	rejected: AtomicU64,
	attempts: [AtomicU64; 3],
	failures: [AtomicU64; 3],
}
impl GateMetrics {
	/// Calls made to `op`.
	pub fn attempts(&self, op: GateOp) -> u64 {
		self.attempts[op.index()].load(Ordering::Relaxed)
	}

	/// Calls to `op` that returned an error.
	pub fn failures(&self, op: GateOp) -> u64 {
		self.failures[op.index()].load(Ordering::Relaxed)
	}

	/// Tokens minted by this process.
	pub fn issued(&self) -> u64 {
		self.issued.load(Ordering::Relaxed)
	}

	/// Issuance calls answered with an existing token.
	pub fn replayed(&self) -> u64 {
		self.replayed.load(Ordering::Relaxed)
	}

	/// Access attempts that consumed a use.
	pub fn granted(&self) -> u64 {
		self.granted.load(Ordering::Relaxed)
	}

	/// Access attempts that were refused.
	pub fn rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	pub(crate) fn record_issue(&self, replayed: bool) {
		if replayed {
			self.replayed.fetch_add(1, Ordering::Relaxed);
		} else {
			self.issued.fetch_add(1, Ordering::Relaxed);
		}
	}

	pub(crate) fn record_granted(&self) {
		self.granted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rejected(&self) {
		self.rejected.fetch_add(1, Ordering::Relaxed);
	}
}
