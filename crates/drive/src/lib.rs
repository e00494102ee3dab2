//! Boundary to the remote drive: the extended file properties this tool
//! relies on and the on-the-wire layout of encrypted files.

pub mod error;
pub mod properties;
pub mod transfer;

pub use {
    error::{Error, Result},
    properties::{IV_PROPERTY, PERMISSIONS_PROPERTY, RemoteProperties},
    transfer::{
        ENCRYPTED_SUFFIX, EncryptedTransfers, EncryptedUpload, decrypted_name, encrypted_len,
        encrypted_name, open_download, prepare_upload,
    },
};
