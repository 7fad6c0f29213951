//! Credential Resolver (C3): tag-mediated credential matching with
//! priority/tiebreak ordering, plus at-rest encryption for stored
//! passwords.

pub mod crypto;
pub mod resolver;

pub use crypto::{CredentialCipher, CryptoError};
pub use resolver::{resolve, CredentialRepository, ResolverError};
