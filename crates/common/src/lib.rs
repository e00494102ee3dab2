//! Shared error plumbing and the secret redactor used by every skiff crate.

pub mod error;
pub mod redact;

pub use {
    error::FromMessage,
    redact::{RedactingMakeWriter, RedactingWriter, Redactor, SecretKind},
};
