//! Envelope encryption of the content key.
//!
//! A random 32-byte content key is encrypted with AES-256-CFB under a KEK
//! derived from the user's passphrase. The config stores the salt, the
//! passphrase verifier, the wrapped key and its IV; the passphrase and the
//! KEK are never written anywhere.

use {
    rand::RngCore,
    skiff_config::{EncryptionConfig, EncryptionField},
    subtle::ConstantTimeEq,
    zeroize::Zeroizing,
};

use crate::{
    cfb::{self, IV_LEN, KEY_LEN},
    error::{Result, VaultError},
    kdf::{self, ITERATIONS, SALT_LEN, VERIFIER_LEN},
};

/// The unwrapped content-encryption key.
#[derive(Clone, PartialEq, Eq)]
pub struct ContentKey(Zeroizing<[u8; KEY_LEN]>);

impl ContentKey {
    fn random() -> Self {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        rand::rng().fill_bytes(key.as_mut());
        Self(key)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentKey(..)")
    }
}

/// Stored key-setup material, decoded and length checked.
#[derive(Clone)]
pub struct KeySetup {
    salt: [u8; SALT_LEN],
    passphrase_hash: [u8; VERIFIER_LEN],
    encrypted_key: [u8; KEY_LEN],
    encrypted_key_iv: [u8; IV_LEN],
    rounds: u32,
}

impl std::fmt::Debug for KeySetup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetup")
            .field("salt", &hex::encode(self.salt))
            .finish_non_exhaustive()
    }
}

impl KeySetup {
    /// Generate a fresh salt, content key and IV and wrap the key under
    /// `passphrase`. Each call yields an unrelated key.
    pub fn setup(passphrase: &str) -> Result<Self> {
        Self::generate(passphrase).map(|(setup, _)| setup)
    }

    /// Like [`KeySetup::setup`], also returning the generated content key.
    pub fn generate(passphrase: &str) -> Result<(Self, ContentKey)> {
        Self::generate_with_rounds(passphrase, ITERATIONS)
    }

    pub(crate) fn generate_with_rounds(
        passphrase: &str,
        rounds: u32,
    ) -> Result<(Self, ContentKey)> {
        if passphrase.is_empty() {
            return Err(VaultError::MissingPassphrase {
                source_name: "a non-empty passphrase".into(),
            });
        }
        let salt = kdf::generate_salt();
        let key = ContentKey::random();
        let encrypted_key_iv = cfb::generate_iv();

        let derived = kdf::derive_keys_with_rounds(passphrase.as_bytes(), &salt, rounds);
        let wrapped = cfb::encrypt_bytes(&derived.kek[..], &encrypted_key_iv, key.as_bytes())?;

        let setup = Self {
            salt,
            passphrase_hash: *derived.verifier,
            encrypted_key: to_array(&wrapped, "wrapped key")?,
            encrypted_key_iv,
            rounds,
        };
        Ok((setup, key))
    }

    /// Parse the `[encryption]` section.
    pub fn from_config(config: &EncryptionConfig) -> Result<Self> {
        Ok(Self {
            salt: decode_field(config, EncryptionField::Salt)?,
            passphrase_hash: decode_field(config, EncryptionField::PassphraseHash)?,
            encrypted_key: decode_field(config, EncryptionField::EncryptedKey)?,
            encrypted_key_iv: decode_field(config, EncryptionField::EncryptedKeyIv)?,
            rounds: ITERATIONS,
        })
    }

    /// The four `key = "hex"` lines for the `[encryption]` section.
    #[must_use]
    pub fn to_config_lines(&self) -> String {
        format!(
            "salt = \"{}\"\npassphrase_hash = \"{}\"\nencrypted_key = \"{}\"\nencrypted_key_iv = \"{}\"\n",
            hex::encode(self.salt),
            hex::encode(self.passphrase_hash),
            hex::encode(self.encrypted_key),
            hex::encode(self.encrypted_key_iv),
        )
    }

    /// Re-derive the KEK from `passphrase` and unwrap the content key.
    ///
    /// The verifier comparison is constant time. A mismatch is final; the
    /// caller should not retry with the same passphrase.
    pub fn unwrap_key(&self, passphrase: &str) -> Result<ContentKey> {
        let derived = kdf::derive_keys_with_rounds(passphrase.as_bytes(), &self.salt, self.rounds);
        if !bool::from(derived.verifier[..].ct_eq(&self.passphrase_hash[..])) {
            return Err(VaultError::InvalidPassphrase);
        }

        let plain = Zeroizing::new(cfb::decrypt_bytes(
            &derived.kek[..],
            &self.encrypted_key_iv,
            &self.encrypted_key,
        )?);
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&plain);
        Ok(ContentKey(key))
    }
}

fn decode_field<const N: usize>(
    config: &EncryptionConfig,
    field: EncryptionField,
) -> Result<[u8; N]> {
    let malformed = || VaultError::MalformedConfig {
        field: field.name(),
        expected_hex: 2 * N,
    };
    let value = config.get(field).ok_or_else(malformed)?;
    let bytes = hex::decode(value.trim()).map_err(|_| malformed())?;
    bytes.as_slice().try_into().map_err(|_| malformed())
}

fn to_array<const N: usize>(bytes: &[u8], what: &'static str) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| VaultError::InvalidKeyMaterial {
            what,
            expected: N,
            actual: bytes.len(),
        })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    /// Low round count so unit tests stay fast.
    const TEST_ROUNDS: u32 = 16;

    fn config_from_lines(lines: &str) -> EncryptionConfig {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            encryption: EncryptionConfig,
        }
        let wrapper: Wrapper = toml::from_str(&format!("[encryption]\n{lines}")).unwrap();
        wrapper.encryption
    }

    #[test]
    fn setup_then_unwrap_returns_key() {
        let (setup, key) = KeySetup::generate("correct horse battery staple").unwrap();
        let unwrapped = setup.unwrap_key("correct horse battery staple").unwrap();
        assert_eq!(unwrapped, key);
    }

    #[test]
    fn wrong_passphrase_always_fails() {
        let (setup, _) = KeySetup::generate_with_rounds("right", TEST_ROUNDS).unwrap();
        for attempt in ["wrong", "Right", "right ", ""] {
            assert!(matches!(
                setup.unwrap_key(attempt),
                Err(VaultError::InvalidPassphrase)
            ));
        }
    }

    #[test]
    fn setups_are_unrelated() {
        let (a, key_a) = KeySetup::generate_with_rounds("same", TEST_ROUNDS).unwrap();
        let (b, key_b) = KeySetup::generate_with_rounds("same", TEST_ROUNDS).unwrap();
        assert_ne!(key_a, key_b);
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.encrypted_key_iv, b.encrypted_key_iv);
    }

    #[test]
    fn empty_passphrase_refused() {
        assert!(matches!(
            KeySetup::setup(""),
            Err(VaultError::MissingPassphrase { .. })
        ));
    }

    #[test]
    fn config_lines_parse_back() {
        let (setup, key) = KeySetup::generate_with_rounds("pw", TEST_ROUNDS).unwrap();
        let config = config_from_lines(&setup.to_config_lines());

        let mut parsed = KeySetup::from_config(&config).unwrap();
        assert_eq!(parsed.salt, setup.salt);
        assert_eq!(parsed.encrypted_key, setup.encrypted_key);
        parsed.rounds = TEST_ROUNDS;
        assert_eq!(parsed.unwrap_key("pw").unwrap(), key);
    }

    #[test]
    fn malformed_field_names_field_and_length() {
        let (setup, _) = KeySetup::generate_with_rounds("pw", TEST_ROUNDS).unwrap();
        let lines = setup
            .to_config_lines()
            .lines()
            .map(|l| {
                if l.starts_with("encrypted_key_iv") {
                    "encrypted_key_iv = \"abcd\"".to_string()
                } else {
                    l.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let err = KeySetup::from_config(&config_from_lines(&lines)).unwrap_err();
        assert!(matches!(err, VaultError::MalformedConfig {
            field: "encrypted_key_iv",
            expected_hex: 32
        }));
        assert!(err.to_string().contains("expecting 32 hex characters"));
    }

    #[test]
    fn missing_field_is_malformed() {
        let err = KeySetup::from_config(&EncryptionConfig::default()).unwrap_err();
        assert!(matches!(err, VaultError::MalformedConfig { field: "salt", .. }));
    }

    #[test]
    fn debug_hides_key() {
        let (setup, key) = KeySetup::generate_with_rounds("pw", TEST_ROUNDS).unwrap();
        assert_eq!(format!("{key:?}"), "ContentKey(..)");
        assert!(!format!("{setup:?}").contains(&hex::encode(setup.encrypted_key)));
    }

    #[test]
    fn config_lines_hold_only_wrapped_material() {
        let (setup, key) = KeySetup::generate_with_rounds("pw", TEST_ROUNDS).unwrap();
        let kek = kdf::derive_keys_with_rounds(b"pw", &setup.salt, TEST_ROUNDS).kek;
        let lines = setup.to_config_lines();

        assert!(!lines.contains(&hex::encode(key.as_bytes())));
        assert!(!lines.contains(&hex::encode(*kek)));
        assert!(!lines.contains("pw\""));
        assert!(lines.contains(&hex::encode(setup.encrypted_key)));
    }
}
