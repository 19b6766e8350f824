//! Demonstrates the pay-once flow end to end with in-memory stores.
//!
//! 1. Implement [`PaymentVerifier`] for the processor client (faked here).
//! 2. Build a [`Gate`] from a [`GateConfig`] and start a [`Sweeper`] for eviction.
//! 3. Issue a download link for a paid checkout, then replay the confirmation.
//! 4. Spend the quota and print each [`AccessDecision`] as JSON.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use time::Duration;
use url::Url;
// self
use download_gate::{
	auth::{ProductClass, SigningKey, SubjectId},
	config::GateConfig,
	gate::{AccessDecision, Gate},
	sweeper::Sweeper,
	upstream::{
		PaymentConfirmation, PaymentFuture, PaymentStatus, PaymentVerifier, UpstreamError,
	},
};

/// Pretends every checkout session was paid for the `lifetime` product.
struct AlwaysPaid;
impl PaymentVerifier for AlwaysPaid {
	fn confirm<'a>(&'a self, subject: &'a SubjectId) -> PaymentFuture<'a> {
		Box::pin(async move {
			let product = ProductClass::new("lifetime")
				.map_err(|e| UpstreamError::unavailable(e.to_string()))?;

			Ok(PaymentConfirmation {
				subject: subject.clone(),
				product,
				status: PaymentStatus::Paid,
			})
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let key = SigningKey::new(b"demo-signing-key-change-me-0123456789abcdef".to_vec())?;
	let config = GateConfig::builder(key).token_ttl(Duration::hours(48)).quota_cap(3).build()?;
	let gate = Arc::new(Gate::in_memory(config)?);
	let sweeper = Sweeper::spawn_configured(gate.clone());
	let base = Url::parse("https://shop.example/api/download")?;
	let subject = SubjectId::new("cs_test_demo_1")?;
	let issued = gate.issue_verified(&AlwaysPaid, &subject).await?;

	println!("Download link: {}", issued.download_url(&base));

	let replayed = gate.issue_verified(&AlwaysPaid, &subject).await?;

	println!("Replayed confirmation returns the same link: {}", replayed.token() == issued.token());

	for attempt in 1..=4 {
		let decision: AccessDecision = gate.decide(issued.token().expose()).await?;

		println!(
			"Attempt {attempt}: HTTP {} {}",
			decision.status_code(),
			serde_json::to_string(&decision)?
		);
	}

	println!("Forged token: {}", serde_json::to_string(&gate.decide("forged").await?)?);

	sweeper.shutdown().await;

	Ok(())
}
