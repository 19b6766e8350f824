//! Token-side models: redacted secrets and the immutable issuance record.

pub mod record;
pub mod secret;
