//! PBKDF2-HMAC-SHA256 derivation of the passphrase verifier and the KEK.
//!
//! One 64-byte derivation feeds both values: the first half is stored as the
//! verifier, the second half wraps the content key and is never stored.

use {rand::RngCore, sha2::Sha256, zeroize::Zeroizing};

/// PBKDF2 iteration count for every stored key setup.
pub const ITERATIONS: u32 = 65_536;
pub const SALT_LEN: usize = 32;
pub const VERIFIER_LEN: usize = 32;
pub const KEK_LEN: usize = 32;

const OUTPUT_LEN: usize = VERIFIER_LEN + KEK_LEN;

/// Both halves of one derivation.
pub struct DerivedKeys {
    pub verifier: Zeroizing<[u8; VERIFIER_LEN]>,
    pub kek: Zeroizing<[u8; KEK_LEN]>,
}

impl std::fmt::Debug for DerivedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKeys").finish_non_exhaustive()
    }
}

/// Derive the verifier and KEK from a passphrase and salt.
pub fn derive_keys(passphrase: &[u8], salt: &[u8]) -> DerivedKeys {
    derive_keys_with_rounds(passphrase, salt, ITERATIONS)
}

pub(crate) fn derive_keys_with_rounds(passphrase: &[u8], salt: &[u8], rounds: u32) -> DerivedKeys {
    let mut output = Zeroizing::new([0u8; OUTPUT_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase, salt, rounds, output.as_mut());

    let mut verifier = Zeroizing::new([0u8; VERIFIER_LEN]);
    let mut kek = Zeroizing::new([0u8; KEK_LEN]);
    verifier.copy_from_slice(&output[..VERIFIER_LEN]);
    kek.copy_from_slice(&output[VERIFIER_LEN..]);
    DerivedKeys { verifier, kek }
}

/// Generate a random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}
