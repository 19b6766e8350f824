//! Expiry-based eviction for issuance records.
//!
//! A record leaves once its token has expired. Quota counters are never swept: an exhausted
//! subject must stay exhausted, and a payment confirmation replayed after the purge mints a new
//! token that still draws on the old counter. Purging is idempotent, so overlapping passes are
//! harmless.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::{task::JoinHandle, time::MissedTickBehavior};
// self
use crate::{
	_prelude::*,
	gate::Gate,
	obs::{self, GateOp},
};

/// Counts removed by one sweep pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
	/// Issuance records whose tokens had expired.
	pub issuance_purged: usize,
}

impl Gate {
	/// Runs one eviction pass against the current clock.
	pub async fn sweep(&self) -> Result<SweepReport> {
		self.sweep_at(OffsetDateTime::now_utc()).await
	}

	/// Runs one eviction pass treating `now` as the current instant.
	pub async fn sweep_at(&self, now: OffsetDateTime) -> Result<SweepReport> {
		obs::observe(&self.metrics, GateOp::Sweep, "sweep", async move {
			let issuance_purged = self.ledger().purge_expired(now).await?;

			#[cfg(feature = "tracing")]
			tracing::debug!(issuance_purged, "Sweep pass completed.");

			Ok(SweepReport { issuance_purged })
		})
		.await
	}
}

/// Spawns periodic sweeps for a shared [`Gate`].
#[derive(Debug)]
pub struct Sweeper;
impl Sweeper {
	/// Starts a background task sweeping every `interval`.
	///
	/// The first pass runs one full interval after spawning. Must be called within a Tokio
	/// runtime. Failed passes are logged and retried on the next tick.
	pub fn spawn(gate: Arc<Gate>, interval: Duration) -> SweeperHandle {
		let period = interval.unsigned_abs().max(StdDuration::from_millis(1));
		let task = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(period);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			// The first tick completes immediately.
			ticker.tick().await;

			loop {
				ticker.tick().await;

				if let Err(_e) = gate.sweep().await {
					#[cfg(feature = "tracing")]
					tracing::warn!(error = %_e, "Sweep pass failed.");
				}
			}
		});

		SweeperHandle { task: Some(task) }
	}

	/// Starts a background task using the gate's configured interval.
	pub fn spawn_configured(gate: Arc<Gate>) -> SweeperHandle {
		let interval = gate.config().sweep_interval;

		Self::spawn(gate, interval)
	}
}

/// Owner of a running sweep task; dropping it stops the task.
#[derive(Debug)]
pub struct SweeperHandle {
	task: Option<JoinHandle<()>>,
}
impl SweeperHandle {
	/// Returns `true` while the task is still scheduled.
	pub fn is_running(&self) -> bool {
		self.task.as_ref().is_some_and(|task| !task.is_finished())
	}

	/// Stops the task and waits for it to unwind.
	pub async fn shutdown(mut self) {
		if let Some(task) = self.task.take() {
			task.abort();

			let _ = task.await;
		}
	}
}
impl Drop for SweeperHandle {
	fn drop(&mut self) {
		if let Some(task) = self.task.take() {
			task.abort();
		}
	}
}
