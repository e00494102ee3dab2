//! Configuration schema, discovery, validation and the `init` template.
//!
//! Config file: `skiff.toml`, searched at an explicit path, then `./`, then
//! `~/.config/skiff/`. On Unix the file must not be readable by group or
//! other, since it may hold the OAuth client secret and the wrapped content
//! key.

pub mod error;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        check_permissions, config_dir, default_config_path, default_token_cache_path,
        find_config_file, load_config, load_validated, write_default_config,
    },
    schema::{
        AuthConfig, DownloadConfig, EncryptionConfig, EncryptionField, GoogleConfig, SkiffConfig,
        TransferConfig, UploadConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate_config, validate_toml_str},
};
