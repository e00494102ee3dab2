#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, LazyLock};

use {
    skiff_drive::{
        EncryptedTransfers, Error, RemoteProperties, encrypted_len, open_download, prepare_upload,
    },
    skiff_vault::{ContentKey, KeyRing, KeySetup, StaticPassphrase, VaultError},
    tokio::io::AsyncReadExt,
};

const PASSPHRASE: &str = "drive transfer tests";

static SETUP: LazyLock<(KeySetup, ContentKey)> =
    LazyLock::new(|| KeySetup::generate(PASSPHRASE).unwrap());

fn key() -> &'static ContentKey {
    &SETUP.1
}

async fn encrypt(plaintext: &[u8]) -> (Vec<u8>, RemoteProperties) {
    let mut upload = prepare_upload(key(), plaintext, Some(0o644)).unwrap();
    let mut wire = Vec::new();
    upload.reader.read_to_end(&mut wire).await.unwrap();
    (wire, upload.properties)
}

#[tokio::test]
async fn upload_then_download() {
    let plaintext = b"quarterly numbers, do not share".repeat(50);
    let (wire, props) = encrypt(&plaintext).await;

    assert_eq!(wire.len() as u64, encrypted_len(plaintext.len() as u64));
    assert_eq!(&wire[..16], &props.iv.unwrap());
    assert_eq!(props.permissions, Some(0o644));

    let mut reader = open_download(key(), &props, wire.as_slice()).await.unwrap();
    let mut recovered = Vec::new();
    reader.read_to_end(&mut recovered).await.unwrap();
    assert_eq!(recovered, plaintext);
}

#[tokio::test]
async fn empty_file_is_just_the_iv() {
    let (wire, props) = encrypt(b"").await;
    assert_eq!(wire.len(), 16);

    let mut reader = open_download(key(), &props, wire.as_slice()).await.unwrap();
    let mut recovered = Vec::new();
    reader.read_to_end(&mut recovered).await.unwrap();
    assert!(recovered.is_empty());
}

#[tokio::test]
async fn every_upload_gets_a_fresh_iv() {
    let (a, props_a) = encrypt(b"same bytes").await;
    let (b, props_b) = encrypt(b"same bytes").await;
    assert_ne!(props_a.iv, props_b.iv);
    assert_ne!(a, b);
}

#[tokio::test]
async fn property_and_embedded_iv_disagree() {
    let (wire, mut props) = encrypt(b"payload").await;
    props.iv = Some([0u8; 16]);

    let err = open_download(key(), &props, wire.as_slice())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::CorruptedFile { .. }), "{err}");
}

#[tokio::test]
async fn missing_iv_property() {
    let (wire, _) = encrypt(b"payload").await;
    let err = open_download(key(), &RemoteProperties::default(), wire.as_slice())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::CorruptedFile { .. }));
}

#[tokio::test]
async fn truncated_before_iv_end() {
    let (wire, props) = encrypt(b"payload").await;
    let err = open_download(key(), &props, &wire[..10])
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::CorruptedFile { .. }));
}

#[tokio::test]
async fn transfers_unlock_key_ring_lazily() {
    let ring = Arc::new(KeyRing::new(
        Some(SETUP.0.clone()),
        Arc::new(StaticPassphrase::new(PASSPHRASE)),
    ));
    let transfers = EncryptedTransfers::new(Arc::clone(&ring));

    let mut upload = transfers.upload(&b"hello"[..], None).await.unwrap();
    let mut wire = Vec::new();
    upload.reader.read_to_end(&mut wire).await.unwrap();

    let mut reader = transfers
        .download(&upload.properties, wire.as_slice())
        .await
        .unwrap();
    let mut recovered = Vec::new();
    reader.read_to_end(&mut recovered).await.unwrap();
    assert_eq!(recovered, b"hello");
}

#[tokio::test]
async fn wrong_passphrase_surfaces_through_transfers() {
    let ring = KeyRing::new(
        Some(SETUP.0.clone()),
        Arc::new(StaticPassphrase::new("not the passphrase")),
    );
    let transfers = EncryptedTransfers::new(Arc::new(ring));
    let err = transfers.upload(&b"x"[..], None).await.err().unwrap();
    assert!(matches!(
        err,
        Error::Vault(VaultError::InvalidPassphrase)
    ));
}
