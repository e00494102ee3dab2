//! AES-256 in full-block CFB mode.
//!
//! CFB turns AES into a stream cipher: output length equals input length and
//! data can be processed in chunks of any size. There is no authentication
//! tag, so tampering is not detected here.

use {
    aes::Aes256,
    cfb_mode::{
        BufDecryptor, BufEncryptor,
        cipher::KeyIvInit,
    },
    rand::RngCore,
};

use crate::error::{Result, VaultError};

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;

/// A keystream transform applied in place, chunk by chunk.
pub trait Keystream: Send {
    fn apply(&mut self, data: &mut [u8]);
}

fn check_material(key: &[u8], iv: &[u8]) -> Result<()> {
    if key.len() != KEY_LEN {
        return Err(VaultError::InvalidKeyMaterial {
            what: "key",
            expected: KEY_LEN,
            actual: key.len(),
        });
    }
    if iv.len() != IV_LEN {
        return Err(VaultError::InvalidKeyMaterial {
            what: "IV",
            expected: IV_LEN,
            actual: iv.len(),
        });
    }
    Ok(())
}

/// Encrypting keystream state.
pub struct Encryptor(BufEncryptor<Aes256>);

impl Encryptor {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        check_material(key, iv)?;
        BufEncryptor::<Aes256>::new_from_slices(key, iv)
            .map(Self)
            .map_err(|e| VaultError::message(format!("cipher init: {e}")))
    }
}

impl Keystream for Encryptor {
    fn apply(&mut self, data: &mut [u8]) {
        self.0.encrypt(data);
    }
}

/// Decrypting keystream state.
pub struct Decryptor(BufDecryptor<Aes256>);

impl Decryptor {
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        check_material(key, iv)?;
        BufDecryptor::<Aes256>::new_from_slices(key, iv)
            .map(Self)
            .map_err(|e| VaultError::message(format!("cipher init: {e}")))
    }
}

impl Keystream for Decryptor {
    fn apply(&mut self, data: &mut [u8]) {
        self.0.decrypt(data);
    }
}

/// Encrypt a whole buffer.
pub fn encrypt_bytes(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut out = plaintext.to_vec();
    Encryptor::new(key, iv)?.apply(&mut out);
    Ok(out)
}

/// Decrypt a whole buffer.
pub fn decrypt_bytes(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let mut out = ciphertext.to_vec();
    Decryptor::new(key, iv)?.apply(&mut out);
    Ok(out)
}

/// Fresh random IV from the OS-seeded thread RNG.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);
    iv
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, std::collections::HashSet};

    const KEY: [u8; KEY_LEN] = [0x42; KEY_LEN];
    const IV: [u8; IV_LEN] = [0x07; IV_LEN];

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(15)]
    #[case(16)]
    #[case(17)]
    #[case(1 << 20)]
    fn round_trip(#[case] len: usize) {
        let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let ciphertext = encrypt_bytes(&KEY, &IV, &plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len());
        if len >= 16 {
            assert_ne!(ciphertext, plaintext);
        }
        assert_eq!(decrypt_bytes(&KEY, &IV, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn nist_sp800_38a_cfb128_aes256() {
        // F.3.17 CFB128-AES256.Encrypt, first block.
        let key =
            hex::decode("603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4").unwrap();
        let iv = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let plaintext = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
        let ciphertext = encrypt_bytes(&key, &iv, &plaintext).unwrap();
        assert_eq!(hex::encode(ciphertext), "dc7e84bfda79164b7ecd8486985d3860");
    }

    #[test]
    fn chunked_matches_whole() {
        let plaintext = vec![0xABu8; 1000];
        let whole = encrypt_bytes(&KEY, &IV, &plaintext).unwrap();

        let mut chunked = plaintext.clone();
        let mut enc = Encryptor::new(&KEY, &IV).unwrap();
        for chunk in chunked.chunks_mut(7) {
            enc.apply(chunk);
        }
        assert_eq!(chunked, whole);
    }

    #[test]
    fn deterministic_for_same_key_and_iv() {
        let a = encrypt_bytes(&KEY, &IV, b"same input").unwrap();
        let b = encrypt_bytes(&KEY, &IV, b"same input").unwrap();
        assert_eq!(a, b);
    }

    #[rstest]
    #[case(&[0u8; 16], &[0u8; 16], "key")]
    #[case(&[0u8; 32], &[0u8; 8], "IV")]
    fn wrong_lengths_rejected(#[case] key: &[u8], #[case] iv: &[u8], #[case] what: &str) {
        let err = encrypt_bytes(key, iv, b"x").unwrap_err();
        match err {
            VaultError::InvalidKeyMaterial { what: w, .. } => assert_eq!(w, what),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn ten_thousand_ivs_are_unique() {
        let ivs: HashSet<[u8; IV_LEN]> = (0..10_000).map(|_| generate_iv()).collect();
        assert_eq!(ivs.len(), 10_000);
    }
}
