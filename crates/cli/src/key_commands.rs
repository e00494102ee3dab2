use {
    anyhow::{Context, Result},
    secrecy::ExposeSecret,
    skiff_vault::{EnvPassphrase, KeySetup, PassphraseSource},
};

/// Print fresh `[encryption]` material wrapped under `$SKIFF_PASSPHRASE`.
///
/// Only the four public values are printed; the passphrase, the content key
/// and the key-encrypting key never leave this process.
pub async fn genkey() -> Result<()> {
    let passphrase = EnvPassphrase::default().passphrase()?;
    let setup = tokio::task::spawn_blocking(move || KeySetup::setup(passphrase.expose_secret()))
        .await
        .context("key generation task failed")??;

    eprintln!("Add these lines to the [encryption] section of skiff.toml:\n");
    print!("{}", setup.to_config_lines());
    Ok(())
}
