//! Stateless mint/verify codec for signed, expiring download tokens.
//!
//! A token is the unpadded base64url encoding of
//! `subject:product:expires_at_ms:nonce:signature`, where `nonce` is 16 random bytes and
//! `signature` is HMAC-SHA256 over everything before the final delimiter, both as lowercase hex.
//! Verification needs only the signing key and a clock: no lookup, no network, no shared state.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, FIELD_DELIMITER, ProductClass, SigningKey, SigningKeyError, SubjectId},
};

type HmacSha256 = Hmac<Sha256>;

/// Random bytes mixed into every token.
pub const NONCE_LEN: usize = 16;
/// Upper bound applied to requested token lifetimes.
pub const MAX_TOKEN_TTL: Duration = Duration::days(3650);

const NONCE_HEX_LEN: usize = NONCE_LEN * 2;
const SIGNATURE_HEX_LEN: usize = 64;

/// Failures raised while verifying a presented token.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum VerifyError {
	/// Token could not be decoded into the expected fields.
	#[error("Download token is malformed: {reason}.")]
	Malformed {
		/// Which structural check failed; never includes token text.
		reason: &'static str,
	},
	/// Signature does not match the carried fields.
	#[error("Download token signature is invalid.")]
	BadSignature,
	/// Token is structurally sound and authentic but past its expiry.
	#[error("Download token expired at {expired_at}.")]
	Expired {
		/// Expiry instant carried by the token.
		expired_at: OffsetDateTime,
	},
}
impl VerifyError {
	/// Builds a [`VerifyError::Malformed`] with the provided reason.
	pub fn malformed(reason: &'static str) -> Self {
		Self::Malformed { reason }
	}
}

/// Fields recovered from a token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
	/// Payment event that granted access.
	pub subject: SubjectId,
	/// Artifact class the token unlocks.
	pub product: ProductClass,
	/// Instant after which the token no longer verifies.
	pub expires_at: OffsetDateTime,
}

/// Freshly minted token together with the claims it encodes.
#[derive(Clone, Debug)]
pub struct MintedToken {
	/// Encoded token string.
	pub token: AccessToken,
	/// Claims carried by the token.
	pub claims: TokenClaims,
}

/// Signs and verifies download tokens with a single HMAC key.
#[derive(Clone)]
pub struct TokenCodec {
	mac: HmacSha256,
}
impl TokenCodec {
	/// Prepares a codec for the provided signing key.
	pub fn new(key: &SigningKey) -> Result<Self, SigningKeyError> {
		let mac = <HmacSha256 as Mac>::new_from_slice(key.expose())
			.map_err(|_| SigningKeyError::Unusable)?;

		Ok(Self { mac })
	}

	/// Mints a token that expires `ttl` from now.
	pub fn mint(&self, subject: &SubjectId, product: &ProductClass, ttl: Duration) -> MintedToken {
		self.mint_at(subject, product, ttl, OffsetDateTime::now_utc())
	}

	/// Mints a token using `now` as the issuing instant.
	///
	/// Negative lifetimes are treated as zero and lifetimes above [`MAX_TOKEN_TTL`] are capped.
	pub fn mint_at(
		&self,
		subject: &SubjectId,
		product: &ProductClass,
		ttl: Duration,
		now: OffsetDateTime,
	) -> MintedToken {
		let ttl = ttl.clamp(Duration::ZERO, MAX_TOKEN_TTL);
		let ttl_ms = i64::try_from(ttl.whole_milliseconds()).unwrap_or(i64::MAX);
		let expires_ms = unix_millis(now).saturating_add(ttl_ms);
		let expires_at = from_unix_millis(expires_ms).unwrap_or(now + ttl);
		let nonce = {
			let mut bytes = [0_u8; NONCE_LEN];

			rand::rng().fill(&mut bytes);

			hex::encode(bytes)
		};
		let payload = signing_payload(subject, product, expires_ms, &nonce);
		let signature = hex::encode(self.sign(&payload));
		let token = URL_SAFE_NO_PAD.encode(format!("{payload}{FIELD_DELIMITER}{signature}"));

		MintedToken {
			token: AccessToken::new(token),
			claims: TokenClaims { subject: subject.clone(), product: product.clone(), expires_at },
		}
	}

	/// Verifies structure, signature, and expiry against the current clock.
	pub fn verify(&self, token: &str) -> Result<TokenClaims, VerifyError> {
		self.verify_at(token, OffsetDateTime::now_utc())
	}

	/// Verifies structure, signature, and expiry against `now`.
	///
	/// Checks run in that order, so a forged token reports [`VerifyError::BadSignature`] even
	/// when its claimed expiry is in the past.
	pub fn verify_at(&self, token: &str, now: OffsetDateTime) -> Result<TokenClaims, VerifyError> {
		let parsed = ParsedToken::decode(token)?;
		let expected = self.sign(&parsed.payload);

		if !bool::from(expected.as_slice().ct_eq(parsed.signature.as_slice())) {
			return Err(VerifyError::BadSignature);
		}
		if unix_millis(now) >= parsed.expires_ms {
			return Err(VerifyError::Expired { expired_at: parsed.claims.expires_at });
		}

		Ok(parsed.claims)
	}

	/// Decodes the claims without checking signature or expiry.
	///
	/// Display-only: the result proves nothing about who minted the token.
	pub fn inspect(&self, token: &str) -> Result<TokenClaims, VerifyError> {
		ParsedToken::decode(token).map(|parsed| parsed.claims)
	}

	fn sign(&self, payload: &str) -> Vec<u8> {
		let mut mac = self.mac.clone();

		mac.update(payload.as_bytes());

		mac.finalize().into_bytes().to_vec()
	}
}
impl Debug for TokenCodec {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenCodec(<redacted>)")
	}
}

struct ParsedToken {
	payload: String,
	signature: Vec<u8>,
	expires_ms: i64,
	claims: TokenClaims,
}
impl ParsedToken {
	fn decode(token: &str) -> Result<Self, VerifyError> {
		if token.is_empty() {
			return Err(VerifyError::malformed("token is empty"));
		}

		let bytes = URL_SAFE_NO_PAD
			.decode(token)
			.map_err(|_| VerifyError::malformed("token is not unpadded base64url"))?;
		let text =
			String::from_utf8(bytes).map_err(|_| VerifyError::malformed("token is not UTF-8"))?;
		let fields = text.split(FIELD_DELIMITER).collect::<Vec<_>>();
		let &[subject, product, expires, nonce, signature] = fields.as_slice() else {
			return Err(VerifyError::malformed("token has the wrong field count"));
		};
		let subject =
			SubjectId::new(subject).map_err(|_| VerifyError::malformed("subject is invalid"))?;
		let product =
			ProductClass::new(product).map_err(|_| VerifyError::malformed("product is invalid"))?;

		if expires.is_empty() || !expires.bytes().all(|b| b.is_ascii_digit()) {
			return Err(VerifyError::malformed("expiry is not a decimal timestamp"));
		}

		let expires_ms = expires
			.parse::<i64>()
			.map_err(|_| VerifyError::malformed("expiry is out of range"))?;
		let expires_at = from_unix_millis(expires_ms)
			.ok_or_else(|| VerifyError::malformed("expiry is out of range"))?;

		if !is_lower_hex(nonce, NONCE_HEX_LEN) {
			return Err(VerifyError::malformed("nonce is not lowercase hex"));
		}
		if !is_lower_hex(signature, SIGNATURE_HEX_LEN) {
			return Err(VerifyError::malformed("signature is not lowercase hex"));
		}

		let signature =
			hex::decode(signature).map_err(|_| VerifyError::malformed("signature is not hex"))?;
		let payload_len = text.len() - SIGNATURE_HEX_LEN - FIELD_DELIMITER.len_utf8();
		let payload = text[..payload_len].to_owned();

		let claims = TokenClaims { subject, product, expires_at };

		Ok(Self { payload, signature, expires_ms, claims })
	}
}

fn signing_payload(
	subject: &SubjectId,
	product: &ProductClass,
	expires_ms: i64,
	nonce: &str,
) -> String {
	const D: char = FIELD_DELIMITER;

	format!("{subject}{D}{product}{D}{expires_ms}{D}{nonce}")
}

fn is_lower_hex(value: &str, len: usize) -> bool {
	value.len() == len && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn unix_millis(instant: OffsetDateTime) -> i64 {
	i64::try_from(instant.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

fn from_unix_millis(ms: i64) -> Option<OffsetDateTime> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn codec_with(key: &[u8]) -> TokenCodec {
		let key = SigningKey::new(key.to_vec()).expect("Signing key fixture should be valid.");

		TokenCodec::new(&key).expect("Codec should accept the signing key fixture.")
	}

	fn codec() -> TokenCodec {
		codec_with(b"0123456789abcdef0123456789abcdef")
	}

	fn ids() -> (SubjectId, ProductClass) {
		(
			SubjectId::new("sess_1").expect("Subject fixture should be valid."),
			ProductClass::new("lifetime").expect("Product fixture should be valid."),
		)
	}

	fn forge(text: &str) -> String {
		URL_SAFE_NO_PAD.encode(text)
	}

	#[test]
	fn mint_then_verify_returns_claims() {
		let codec = codec();
		let (subject, product) = ids();
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let minted = codec.mint_at(&subject, &product, Duration::hours(48), now);
		let claims = codec
			.verify_at(minted.token.expose(), now + Duration::hours(1))
			.expect("Freshly minted token should verify.");

		assert_eq!(claims.subject, subject);
		assert_eq!(claims.product, product);
		assert_eq!(claims.expires_at, macros::datetime!(2025-06-03 12:00 UTC));
		assert_eq!(claims, minted.claims);
	}

	#[test]
	fn token_alphabet_is_url_safe() {
		let (subject, product) = ids();
		let minted = codec().mint(&subject, &product, Duration::hours(1));

		assert!(
			minted
				.token
				.expose()
				.bytes()
				.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
		);
	}

	#[test]
	fn nonce_makes_every_mint_unique() {
		let codec = codec();
		let (subject, product) = ids();
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let first = codec.mint_at(&subject, &product, Duration::hours(1), now);
		let second = codec.mint_at(&subject, &product, Duration::hours(1), now);

		assert_ne!(first.token, second.token);
		assert_eq!(first.claims, second.claims);
	}

	#[test]
	fn empty_and_garbage_tokens_are_malformed() {
		let codec = codec();

		assert_eq!(codec.verify(""), Err(VerifyError::malformed("token is empty")));
		assert!(matches!(codec.verify("***"), Err(VerifyError::Malformed { .. })));
		assert!(matches!(
			codec.verify(&forge("sess_1:lifetime:1")),
			Err(VerifyError::Malformed { reason: "token has the wrong field count" })
		));
		assert!(matches!(
			codec.verify(&forge("a:b:c:d:e:f")),
			Err(VerifyError::Malformed { reason: "token has the wrong field count" })
		));
	}

	#[test]
	fn foreign_key_yields_bad_signature() {
		let (subject, product) = ids();
		let minted = codec().mint(&subject, &product, Duration::hours(1));
		let rotated = codec_with(b"fedcba9876543210fedcba9876543210");

		assert_eq!(rotated.verify(minted.token.expose()), Err(VerifyError::BadSignature));
	}

	#[test]
	fn uppercase_signature_is_not_accepted() {
		let codec = codec();
		let (subject, product) = ids();
		let minted = codec.mint(&subject, &product, Duration::hours(1));
		let decoded = String::from_utf8(
			URL_SAFE_NO_PAD.decode(minted.token.expose()).expect("Minted token should decode."),
		)
		.expect("Minted token should be UTF-8.");
		let (payload, signature) =
			decoded.rsplit_once(FIELD_DELIMITER).expect("Minted token should carry a signature.");
		let shouted = forge(&format!("{payload}:{}", signature.to_ascii_uppercase()));

		if signature.bytes().any(|b| b.is_ascii_alphabetic()) {
			assert!(matches!(codec.verify(&shouted), Err(VerifyError::Malformed { .. })));
		}
	}

	#[test]
	fn zero_ttl_is_expired_at_mint_instant() {
		let codec = codec();
		let (subject, product) = ids();
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let minted = codec.mint_at(&subject, &product, Duration::ZERO, now);

		assert_eq!(
			codec.verify_at(minted.token.expose(), now),
			Err(VerifyError::Expired { expired_at: now })
		);
	}

	#[test]
	fn expiry_boundary_is_exclusive() {
		let codec = codec();
		let (subject, product) = ids();
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let minted = codec.mint_at(&subject, &product, Duration::hours(1), now);
		let token = minted.token.expose();

		assert!(codec.verify_at(token, now + Duration::minutes(59)).is_ok());
		assert!(matches!(
			codec.verify_at(token, now + Duration::hours(1)),
			Err(VerifyError::Expired { .. })
		));
	}

	#[test]
	fn negative_and_huge_ttls_are_clamped() {
		let codec = codec();
		let (subject, product) = ids();
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let negative = codec.mint_at(&subject, &product, -Duration::hours(1), now);
		let huge = codec.mint_at(&subject, &product, Duration::days(100_000), now);

		assert_eq!(negative.claims.expires_at, now);
		assert_eq!(huge.claims.expires_at, now + MAX_TOKEN_TTL);
	}

	#[test]
	fn inspect_skips_signature_and_expiry() {
		let (subject, product) = ids();
		let now = macros::datetime!(2025-06-01 12:00 UTC);
		let minted = codec().mint_at(&subject, &product, Duration::ZERO, now);
		let stranger = codec_with(b"fedcba9876543210fedcba9876543210");
		let claims =
			stranger.inspect(minted.token.expose()).expect("Inspect should only decode structure.");

		assert_eq!(claims.product, product);
		assert!(stranger.verify(minted.token.expose()).is_err());
	}

	#[test]
	fn debug_does_not_leak_key() {
		assert_eq!(format!("{:?}", codec()), "TokenCodec(<redacted>)");
	}
}
