//! Secure wrappers that keep signing keys and token strings out of logs.

// self
use crate::_prelude::*;

/// Opaque, URL-safe download token; formatting never reveals its contents.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);
impl AccessToken {
	/// Wraps an encoded token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the encoded token. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl AsRef<str> for AccessToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// HMAC signing key; never serialized and redacted from every formatter.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKey(Vec<u8>);
impl SigningKey {
	/// Minimum accepted key length in bytes.
	pub const MIN_LEN: usize = 32;

	/// Wraps raw key material, rejecting keys shorter than [`SigningKey::MIN_LEN`].
	pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, SigningKeyError> {
		let bytes = bytes.into();

		if bytes.len() < Self::MIN_LEN {
			return Err(SigningKeyError::TooShort { len: bytes.len(), min: Self::MIN_LEN });
		}

		Ok(Self(bytes))
	}

	/// Returns the raw key bytes. Only the token codec should call this.
	pub fn expose(&self) -> &[u8] {
		&self.0
	}
}
impl Debug for SigningKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SigningKey").field(&"<redacted>").finish()
	}
}

/// Error returned when signing key material is rejected.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SigningKeyError {
	/// Key material is shorter than the accepted minimum.
	#[error("Signing key must be at least {min} bytes, got {len}.")]
	TooShort {
		/// Supplied key length.
		len: usize,
		/// Required minimum length.
		min: usize,
	},
	/// The MAC primitive refused the key material.
	#[error("Signing key was rejected by the MAC primitive.")]
	Unusable,
}
