//! Gate configuration: signing key, token lifetime, quota cap, and sweep cadence.
//!
//! Durations are bounded on both sides at build time so that no later clock arithmetic can leave
//! the representable range.
//!
//! The signing key must come from a protected source. [`GateConfig::from_env`] reads it from
//! `DOWNLOAD_GATE_SIGNING_KEY`; nothing in this crate embeds or serializes key material.

// self
use crate::{
	_prelude::*,
	auth::SigningKey,
	codec::MAX_TOKEN_TTL,
	error::ConfigError,
	quota::DEFAULT_QUOTA_CAP,
	store::memory::DEFAULT_SHARD_COUNT,
};

/// Reference token lifetime.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::hours(48);
/// Reference interval between background sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::minutes(10);
/// Longest accepted interval between background sweeps.
pub const MAX_SWEEP_INTERVAL: Duration = Duration::days(7);

/// Environment variable holding the raw signing key.
pub const ENV_SIGNING_KEY: &str = "DOWNLOAD_GATE_SIGNING_KEY";
/// Environment variable overriding the token lifetime, in seconds.
pub const ENV_TOKEN_TTL_SECS: &str = "DOWNLOAD_GATE_TOKEN_TTL_SECS";
/// Environment variable overriding the per-subject quota.
pub const ENV_QUOTA_CAP: &str = "DOWNLOAD_GATE_QUOTA_CAP";
/// Environment variable overriding the sweep interval, in seconds.
pub const ENV_SWEEP_INTERVAL_SECS: &str = "DOWNLOAD_GATE_SWEEP_INTERVAL_SECS";
/// Environment variable overriding the in-memory shard count.
pub const ENV_SHARD_COUNT: &str = "DOWNLOAD_GATE_SHARD_COUNT";

/// Validated settings consumed by [`crate::gate::Gate`].
#[derive(Clone, Debug)]
pub struct GateConfig {
	/// HMAC key used to sign tokens.
	pub signing_key: SigningKey,
	/// Lifetime of newly minted tokens.
	pub token_ttl: Duration,
	/// Downloads allowed per subject.
	pub quota_cap: u32,
	/// Interval between background sweeps.
	pub sweep_interval: Duration,
	/// Shards per in-memory map.
	pub shard_count: usize,
}
impl GateConfig {
	/// Returns a builder seeded with reference defaults.
	pub fn builder(signing_key: SigningKey) -> GateConfigBuilder {
		GateConfigBuilder::new(signing_key)
	}

	/// Reads settings from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads settings through `lookup`, which maps a variable name to its value.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let key = lookup(ENV_SIGNING_KEY)
			.filter(|value| !value.is_empty())
			.ok_or(ConfigError::Missing { name: ENV_SIGNING_KEY })?;
		let mut builder = Self::builder(SigningKey::new(key.into_bytes())?);

		if let Some(secs) = parse_var::<i64>(&lookup, ENV_TOKEN_TTL_SECS)? {
			builder = builder.token_ttl(Duration::seconds(secs));
		}
		if let Some(cap) = parse_var::<u32>(&lookup, ENV_QUOTA_CAP)? {
			builder = builder.quota_cap(cap);
		}
		if let Some(secs) = parse_var::<i64>(&lookup, ENV_SWEEP_INTERVAL_SECS)? {
			builder = builder.sweep_interval(Duration::seconds(secs));
		}
		if let Some(count) = parse_var::<usize>(&lookup, ENV_SHARD_COUNT)? {
			builder = builder.shard_count(count);
		}

		builder.build()
	}
}

/// Builder for [`GateConfig`] values.
#[derive(Debug)]
pub struct GateConfigBuilder {
	signing_key: SigningKey,
	token_ttl: Duration,
	quota_cap: u32,
	sweep_interval: Duration,
	shard_count: usize,
}
impl GateConfigBuilder {
	fn new(signing_key: SigningKey) -> Self {
		Self {
			signing_key,
			token_ttl: DEFAULT_TOKEN_TTL,
			quota_cap: DEFAULT_QUOTA_CAP,
			sweep_interval: DEFAULT_SWEEP_INTERVAL,
			shard_count: DEFAULT_SHARD_COUNT,
		}
	}

	/// Sets the lifetime of newly minted tokens.
	pub fn token_ttl(mut self, ttl: Duration) -> Self {
		self.token_ttl = ttl;

		self
	}

	/// Sets the downloads allowed per subject.
	pub fn quota_cap(mut self, cap: u32) -> Self {
		self.quota_cap = cap;

		self
	}

	/// Sets the interval between background sweeps.
	pub fn sweep_interval(mut self, interval: Duration) -> Self {
		self.sweep_interval = interval;

		self
	}

	/// Sets the shard count used by in-memory stores.
	pub fn shard_count(mut self, count: usize) -> Self {
		self.shard_count = count;

		self
	}

	/// Validates and produces a [`GateConfig`].
	pub fn build(self) -> Result<GateConfig, ConfigError> {
		ensure_within("token_ttl", self.token_ttl, MAX_TOKEN_TTL)?;
		ensure_within("sweep_interval", self.sweep_interval, MAX_SWEEP_INTERVAL)?;

		if self.shard_count == 0 {
			return Err(ConfigError::Invalid {
				name: "shard_count",
				reason: "at least one shard is required".into(),
			});
		}

		Ok(GateConfig {
			signing_key: self.signing_key,
			token_ttl: self.token_ttl,
			quota_cap: self.quota_cap,
			sweep_interval: self.sweep_interval,
			shard_count: self.shard_count,
		})
	}
}

fn ensure_within(name: &'static str, value: Duration, max: Duration) -> Result<(), ConfigError> {
	if !value.is_positive() {
		return Err(ConfigError::NonPositive { name });
	}
	if value > max {
		return Err(ConfigError::TooLarge { name, max });
	}

	Ok(())
}

fn parse_var<T>(
	lookup: &impl Fn(&str) -> Option<String>,
	name: &'static str,
) -> Result<Option<T>, ConfigError>
where
	T: FromStr,
	T::Err: Display,
{
	lookup(name)
		.map(|raw| {
			raw.trim()
				.parse::<T>()
				.map_err(|e| ConfigError::Invalid { name, reason: e.to_string() })
		})
		.transpose()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const KEY: &str = "0123456789abcdef0123456789abcdef";

	fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map = pairs
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect::<HashMap<_, _>>();

		move |name| map.get(name).cloned()
	}

	#[test]
	fn builder_applies_reference_defaults() {
		let key = SigningKey::new(KEY.as_bytes().to_vec()).expect("Key fixture should be valid.");
		let config = GateConfig::builder(key).build().expect("Defaults should validate.");

		assert_eq!(config.token_ttl, Duration::hours(48));
		assert_eq!(config.quota_cap, 3);
		assert_eq!(config.shard_count, 16);
	}

	#[test]
	fn builder_rejects_non_positive_durations() {
		let key = SigningKey::new(KEY.as_bytes().to_vec()).expect("Key fixture should be valid.");

		assert!(matches!(
			GateConfig::builder(key.clone()).token_ttl(Duration::ZERO).build(),
			Err(ConfigError::NonPositive { name: "token_ttl" })
		));
		assert!(matches!(
			GateConfig::builder(key).shard_count(0).build(),
			Err(ConfigError::Invalid { name: "shard_count", .. })
		));
	}

	#[test]
	fn builder_rejects_durations_beyond_clock_range() {
		let key = SigningKey::new(KEY.as_bytes().to_vec()).expect("Key fixture should be valid.");

		assert!(
			GateConfig::builder(key.clone()).token_ttl(MAX_TOKEN_TTL).build().is_ok(),
			"The longest mintable lifetime should be accepted."
		);
		assert!(matches!(
			GateConfig::builder(key.clone()).token_ttl(MAX_TOKEN_TTL + Duration::SECOND).build(),
			Err(ConfigError::TooLarge { name: "token_ttl", .. })
		));
		assert!(matches!(
			GateConfig::builder(key).sweep_interval(Duration::days(30)).build(),
			Err(ConfigError::TooLarge { name: "sweep_interval", .. })
		));
		assert!(matches!(
			GateConfig::from_lookup(lookup_from(&[
				(ENV_SIGNING_KEY, KEY),
				(ENV_TOKEN_TTL_SECS, "9000000000000")
			])),
			Err(ConfigError::TooLarge { name: "token_ttl", .. })
		));
	}

	#[test]
	fn env_lookup_reads_overrides() {
		let config = GateConfig::from_lookup(lookup_from(&[
			(ENV_SIGNING_KEY, KEY),
			(ENV_TOKEN_TTL_SECS, "3600"),
			(ENV_QUOTA_CAP, " 5 "),
		]))
		.expect("Environment fixture should validate.");

		assert_eq!(config.token_ttl, Duration::hours(1));
		assert_eq!(config.quota_cap, 5);
		assert_eq!(config.sweep_interval, DEFAULT_SWEEP_INTERVAL);
	}

	#[test]
	fn env_lookup_requires_a_strong_key() {
		assert!(matches!(
			GateConfig::from_lookup(lookup_from(&[])),
			Err(ConfigError::Missing { name: ENV_SIGNING_KEY })
		));
		assert!(matches!(
			GateConfig::from_lookup(lookup_from(&[(ENV_SIGNING_KEY, "short")])),
			Err(ConfigError::SigningKey(_))
		));
		assert!(matches!(
			GateConfig::from_lookup(lookup_from(&[
				(ENV_SIGNING_KEY, KEY),
				(ENV_QUOTA_CAP, "many")
			])),
			Err(ConfigError::Invalid { name: ENV_QUOTA_CAP, .. })
		));
	}

	#[test]
	fn debug_output_redacts_key() {
		let key = SigningKey::new(KEY.as_bytes().to_vec()).expect("Key fixture should be valid.");
		let config = GateConfig::builder(key).build().expect("Defaults should validate.");

		assert!(!format!("{config:?}").contains(KEY));
	}
}
