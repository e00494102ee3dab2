//! Framing for encrypted transfers.
//!
//! An encrypted remote file is the per-file IV followed by the AES-256-CFB
//! ciphertext of the local file. The same IV is recorded in the `IV` remote
//! property; on download the property wins and the leading block must agree
//! with it.

use std::{io::Cursor, sync::Arc};

use {
    skiff_vault::{
        CipherReader, ContentKey, IV_LEN, KeyRing,
        cfb::{Decryptor, Encryptor},
        decrypt_reader, encrypt_reader, generate_iv,
    },
    tokio::io::{AsyncRead, AsyncReadExt, Chain},
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    properties::RemoteProperties,
};

/// Name suffix of encrypted files on the remote side.
pub const ENCRYPTED_SUFFIX: &str = ".aes256";

#[must_use]
pub fn encrypted_name(name: &str) -> String {
    format!("{name}{ENCRYPTED_SUFFIX}")
}

/// The local name of an encrypted remote file, or `None` if it is not one.
#[must_use]
pub fn decrypted_name(name: &str) -> Option<&str> {
    name.strip_suffix(ENCRYPTED_SUFFIX)
        .filter(|stem| !stem.is_empty())
}

/// Remote size of an encrypted file with `plaintext_len` bytes of content.
#[must_use]
pub fn encrypted_len(plaintext_len: u64) -> u64 {
    plaintext_len + IV_LEN as u64
}

/// Reader producing `IV || ciphertext`.
pub type UploadReader<R> = Chain<Cursor<[u8; IV_LEN]>, CipherReader<R, Encryptor>>;

/// Everything an upload of one encrypted file needs.
pub struct EncryptedUpload<R> {
    pub reader: UploadReader<R>,
    pub properties: RemoteProperties,
}

/// Encrypt `plaintext` under `key` with a fresh IV.
pub fn prepare_upload<R: AsyncRead + Unpin>(
    key: &ContentKey,
    plaintext: R,
    permissions: Option<u32>,
) -> Result<EncryptedUpload<R>> {
    let iv = generate_iv();
    let body = encrypt_reader(key.as_bytes(), &iv, plaintext)?;
    Ok(EncryptedUpload {
        reader: Cursor::new(iv).chain(body),
        properties: RemoteProperties {
            iv: Some(iv),
            permissions,
        },
    })
}

/// Check the leading IV block against the `IV` property and return a reader
/// over the plaintext.
pub async fn open_download<R: AsyncRead + Unpin>(
    key: &ContentKey,
    properties: &RemoteProperties,
    mut ciphertext: R,
) -> Result<CipherReader<R, Decryptor>> {
    let expected = properties
        .iv
        .ok_or_else(|| Error::corrupted("encrypted file has no IV property"))?;

    let mut embedded = [0u8; IV_LEN];
    if let Err(e) = ciphertext.read_exact(&mut embedded).await {
        return Err(match e.kind() {
            std::io::ErrorKind::UnexpectedEof => {
                Error::corrupted(format!("shorter than the {IV_LEN}-byte IV block"))
            },
            _ => Error::external("read IV block", e),
        });
    }
    if embedded != expected {
        warn!(
            property = %hex::encode(expected),
            embedded = %hex::encode(embedded),
            "IV property does not match leading block"
        );
        return Err(Error::corrupted("IV property does not match the leading block"));
    }

    debug!("IV verified");
    Ok(decrypt_reader(key.as_bytes(), &expected, ciphertext)?)
}

/// Encrypted transfers backed by the process key ring. The content key is
/// unwrapped on the first transfer that needs it.
#[derive(Clone)]
pub struct EncryptedTransfers {
    keyring: Arc<KeyRing>,
}

impl EncryptedTransfers {
    pub fn new(keyring: Arc<KeyRing>) -> Self {
        Self { keyring }
    }

    pub async fn upload<R: AsyncRead + Unpin>(
        &self,
        plaintext: R,
        permissions: Option<u32>,
    ) -> Result<EncryptedUpload<R>> {
        let key = self.keyring.content_key().await?;
        prepare_upload(key, plaintext, permissions)
    }

    pub async fn download<R: AsyncRead + Unpin>(
        &self,
        properties: &RemoteProperties,
        ciphertext: R,
    ) -> Result<CipherReader<R, Decryptor>> {
        let key = self.keyring.content_key().await?;
        open_download(key, properties, ciphertext).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("archive.tar.aes256", Some("archive.tar"))]
    #[case("notes.txt", None)]
    #[case(".aes256", None)]
    fn decrypted_names(#[case] remote: &str, #[case] local: Option<&str>) {
        assert_eq!(decrypted_name(remote), local);
    }

    #[test]
    fn encrypted_name_appends_suffix() {
        assert_eq!(encrypted_name("report.pdf"), "report.pdf.aes256");
    }

    #[test]
    fn encrypted_len_adds_iv() {
        assert_eq!(encrypted_len(0), 16);
        assert_eq!(encrypted_len(100), 116);
    }
}
