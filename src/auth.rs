//! Auth-domain identifiers, secrets, and issuance records.

pub mod id;
pub mod token;

pub use id::*;
pub use token::{record::*, secret::*};
