#![allow(dead_code)]

// crates.io
use time::{Duration, OffsetDateTime, macros};
// self
use download_gate::{
	auth::{ProductClass, SigningKey, SubjectId},
	config::GateConfig,
	gate::Gate,
	upstream::PaymentConfirmation,
};

pub const KEY: &[u8] = b"integration-signing-key-0123456789abcdef";
pub const OTHER_KEY: &[u8] = b"a-different-signing-key-0123456789abcdef";

pub fn epoch() -> OffsetDateTime {
	macros::datetime!(2025-06-01 12:00 UTC)
}

pub fn signing_key(raw: &[u8]) -> SigningKey {
	SigningKey::new(raw.to_vec()).expect("Signing key fixture should satisfy the length floor.")
}

pub fn subject(value: &str) -> SubjectId {
	SubjectId::new(value).expect("Subject fixture should be a valid identifier.")
}

pub fn product(value: &str) -> ProductClass {
	ProductClass::new(value).expect("Product fixture should be a valid identifier.")
}

pub fn paid(subject_id: &str, product_class: &str) -> PaymentConfirmation {
	PaymentConfirmation::paid(subject(subject_id), product(product_class))
}

pub fn gate(ttl: Duration, cap: u32) -> Gate {
	let config = GateConfig::builder(signing_key(KEY))
		.token_ttl(ttl)
		.quota_cap(cap)
		.build()
		.expect("Gate config fixture should validate.");

	Gate::in_memory(config).expect("In-memory gate should build from the config fixture.")
}
