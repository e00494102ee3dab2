//! Content encryption for files at rest on the remote drive.
//!
//! A random content key is wrapped with AES-256-CFB under a KEK derived from
//! the user's passphrase via PBKDF2-HMAC-SHA256. File payloads are encrypted
//! with the same cipher under the content key and a fresh per-file IV. The
//! [`KeyRing`] unwraps the content key at most once per process.

pub mod cfb;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod keyring;
pub mod passphrase;
pub mod stream;

pub use {
    cfb::{IV_LEN, KEY_LEN, Keystream, decrypt_bytes, encrypt_bytes, generate_iv},
    envelope::{ContentKey, KeySetup},
    error::VaultError,
    keyring::{KeyRing, KeyRingStatus},
    passphrase::{EnvPassphrase, PASSPHRASE_ENV, PassphraseSource, StaticPassphrase},
    stream::{CipherReader, decrypt_reader, encrypt_reader},
};
