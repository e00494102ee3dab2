use std::{fmt::Write as _, path::Path, sync::Arc};

use {
    anyhow::{Context, Result, bail},
    clap::Subcommand,
    skiff_common::Redactor,
    skiff_config::{Severity, ValidationResult, validate_toml_str},
    skiff_vault::{EnvPassphrase, KeyRing, KeyRingStatus},
};

use crate::{Cli, register_config_secrets};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Also unwrap the content key with $SKIFF_PASSPHRASE.
        #[arg(long)]
        verify_passphrase: bool,
    },
}

pub async fn handle_config(action: &ConfigAction, cli: &Cli, redactor: &Redactor) -> Result<()> {
    match action {
        ConfigAction::Check { verify_passphrase } => {
            check(cli, redactor, *verify_passphrase).await
        },
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

async fn check(cli: &Cli, redactor: &Redactor, verify_passphrase: bool) -> Result<()> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => skiff_config::find_config_file().context("no configuration file found")?,
    };
    eprintln!("Checking {}\n", path.display());

    skiff_config::check_permissions(&path)?;
    let result = validate_file(&path)?;
    if let Ok(config) = skiff_config::load_config(&path) {
        register_config_secrets(&config, redactor);
    }
    eprint!("{}", redactor.redact(&format_diagnostics(&result)));

    let errors = result.count(Severity::Error);
    if errors > 0 {
        bail!("{errors} error(s) in {}", path.display());
    }

    if verify_passphrase {
        let config = skiff_config::load_config(&path)?;
        let ring = KeyRing::from_config(&config.encryption, Arc::new(EnvPassphrase::default()))?;
        if ring.status() == KeyRingStatus::NotConfigured {
            bail!("no [encryption] section; run `skiff genkey` first");
        }
        ring.content_key().await?;
        eprintln!("Passphrase unlocks the content key.");
    }
    Ok(())
}

fn validate_file(path: &Path) -> Result<ValidationResult> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(validate_toml_str(&raw))
}

/// Human-readable report; callers redact it before printing.
fn format_diagnostics(result: &ValidationResult) -> String {
    let mut out = String::new();
    for d in &result.diagnostics {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };

        if d.path.is_empty() {
            let _ = writeln!(out, "  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            let _ = writeln!(out, "  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
    }

    if !result.diagnostics.is_empty() {
        out.push('\n');
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        out.push_str("No issues found.\n");
    } else {
        let _ = writeln!(out, "{errors} error(s), {warnings} warning(s)");
    }
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, skiff_common::SecretKind};

    #[test]
    fn report_of_unparseable_file_hides_secrets() {
        let raw = "[google]\nclient_secret = \"GOCSPX-halfwritten\n";
        let report = format_diagnostics(&validate_toml_str(raw));
        assert!(report.contains("1 error(s)"), "{report}");
        assert!(!report.contains("GOCSPX-halfwritten"), "{report}");
    }

    #[test]
    fn report_goes_through_redactor() {
        let redactor = Redactor::new();
        redactor.register(SecretKind::ApiKey, "AIzaSyTypoKey");
        let raw = "[google]\napi_key = \"AIzaSyTypoKey\"\nclient_secert = \"AIzaSyTypoKey\"\n";

        let diagnostics = format_diagnostics(&validate_toml_str(raw));
        let report = redactor.redact(&diagnostics);
        assert!(report.contains("client_secert"), "{report}");
        assert!(!report.contains("AIzaSyTypoKey"), "{report}");
    }
}
