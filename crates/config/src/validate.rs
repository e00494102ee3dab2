//! Configuration validation.
//!
//! Flags unknown or misspelled keys, malformed key-setup material and
//! settings that would misbehave at runtime. Every error-level diagnostic is
//! fatal: the binary refuses to authorize or touch the network until the file
//! is fixed.

use std::collections::HashMap;

use crate::{
    error::describe_toml_error,
    schema::{EncryptionField, SkiffConfig},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "encryption",
    /// "upload", "transfer", "google"
    pub category: &'static str,
    /// Dotted path, e.g. "encryption.salt"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.severity, self.message)
        } else {
            write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
        }
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .cloned()
            .collect()
    }

    fn push(&mut self, severity: Severity, category: &'static str, path: &str, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message,
        });
    }
}

// ── Known keys for unknown-field detection ──────────────────────────────────

fn known_sections() -> HashMap<&'static str, &'static [&'static str]> {
    HashMap::from([
        ("google", &[
            "client_id",
            "client_secret",
            "api_key",
            "auth_url",
            "token_url",
            "scopes",
        ][..]),
        ("encryption", &[
            "salt",
            "passphrase_hash",
            "encrypted_key",
            "encrypted_key_iv",
        ][..]),
        ("upload", &["ignored_regexp", "bytes_per_second_limit"][..]),
        ("download", &["bytes_per_second_limit"][..]),
        ("transfer", &["num_workers"][..]),
        ("auth", &["browser_launchers", "token_cache"][..]),
    ])
}

// ── Levenshtein distance ────────────────────────────────────────────────────

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

fn suggest<'a>(needle: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(needle, c)))
        .filter(|(_, d)| *d > 0 && *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

fn unknown_key_message(key: &str, candidates: &[&str]) -> String {
    match suggest(key, candidates) {
        Some(s) => format!("unknown field \"{key}\" (did you mean \"{s}\"?)"),
        None => format!("unknown field \"{key}\""),
    }
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate raw TOML: syntax, unknown keys, types, then semantics.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut result = ValidationResult::default();

    let value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            result.push(
                Severity::Error,
                "syntax",
                "",
                describe_toml_error(toml_str, &e),
            );
            return result;
        },
    };

    check_unknown_fields(&value, &mut result);

    match toml::from_str::<SkiffConfig>(toml_str) {
        Ok(mut config) => {
            config.normalize();
            result
                .diagnostics
                .extend(validate_config(&config).diagnostics);
        },
        Err(e) => result.push(
            Severity::Error,
            "type-error",
            "",
            format!("type error: {e}"),
        ),
    }

    result
}

fn check_unknown_fields(value: &toml::Value, result: &mut ValidationResult) {
    let Some(table) = value.as_table() else {
        return;
    };
    let sections = known_sections();
    let mut section_names: Vec<&str> = sections.keys().copied().collect();
    section_names.sort_unstable();

    for (key, child) in table {
        let Some(fields) = sections.get(key.as_str()) else {
            result.push(
                Severity::Warning,
                "unknown-field",
                key,
                unknown_key_message(key, &section_names),
            );
            continue;
        };
        let Some(child_table) = child.as_table() else {
            continue;
        };
        for field in child_table.keys() {
            if !fields.contains(&field.as_str()) {
                result.push(
                    Severity::Warning,
                    "unknown-field",
                    &format!("{key}.{field}"),
                    unknown_key_message(field, fields),
                );
            }
        }
    }
}

/// Semantic checks on an already-parsed config.
#[must_use]
pub fn validate_config(config: &SkiffConfig) -> ValidationResult {
    let mut result = ValidationResult::default();
    check_encryption(config, &mut result);
    check_upload(config, &mut result);
    check_transfer(config, &mut result);
    check_google(config, &mut result);
    result
}

fn check_encryption(config: &SkiffConfig, result: &mut ValidationResult) {
    let encryption = &config.encryption;
    // Absent is fine (encryption unused); present must be well formed.
    for field in EncryptionField::ALL {
        let Some(value) = encryption.get(field) else {
            continue;
        };
        let ok = hex::decode(value.trim()).is_ok_and(|bytes| bytes.len() == field.byte_len());
        if !ok {
            result.push(
                Severity::Error,
                "encryption",
                &format!("encryption.{}", field.name()),
                format!(
                    "missing or invalid [encryption] {} value (expecting {} hex characters)",
                    field.name(),
                    2 * field.byte_len()
                ),
            );
        }
    }

    if encryption.is_configured() && !encryption.is_complete() {
        let missing: Vec<&str> = EncryptionField::ALL
            .iter()
            .filter(|f| encryption.get(**f).is_none())
            .map(|f| f.name())
            .collect();
        result.push(
            Severity::Error,
            "encryption",
            "encryption",
            format!(
                "incomplete key setup, missing: {}; run \"skiff genkey\" and paste all four values",
                missing.join(", ")
            ),
        );
    }
}

fn check_upload(config: &SkiffConfig, result: &mut ValidationResult) {
    for (i, pattern) in config.upload.ignored_regexp.iter().enumerate() {
        if let Err(e) = regex::Regex::new(pattern) {
            result.push(
                Severity::Error,
                "upload",
                &format!("upload.ignored_regexp[{i}]"),
                format!("invalid regular expression: {e}"),
            );
        }
    }
}

fn check_transfer(config: &SkiffConfig, result: &mut ValidationResult) {
    match config.transfer.num_workers {
        0 => result.push(
            Severity::Error,
            "transfer",
            "transfer.num_workers",
            "must be at least 1".into(),
        ),
        n if n > 16 => result.push(
            Severity::Warning,
            "transfer",
            "transfer.num_workers",
            format!("{n} workers will likely hit rate-limit (403) errors"),
        ),
        _ => {},
    }
}

fn check_google(config: &SkiffConfig, result: &mut ValidationResult) {
    if config.google.client_secret.is_some() && config.google.client_id.is_none() {
        result.push(
            Severity::Warning,
            "google",
            "google.client_secret",
            "client_secret is ignored without a client_id".into(),
        );
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    const VALID_ENCRYPTION: &str = r#"
[encryption]
salt = "0000000000000000000000000000000000000000000000000000000000000000"
passphrase_hash = "1111111111111111111111111111111111111111111111111111111111111111"
encrypted_key = "2222222222222222222222222222222222222222222222222222222222222222"
encrypted_key_iv = "33333333333333333333333333333333"
"#;

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("salt", "salt"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("slat", "salt"), 2);
        assert_eq!(levenshtein("encrypted_ky", "encrypted_key"), 1);
    }

    #[test]
    fn empty_config_is_valid() {
        let result = validate_toml_str("");
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn complete_encryption_section_is_valid() {
        let result = validate_toml_str(VALID_ENCRYPTION);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[rstest]
    #[case("salt", "00")]
    #[case("passphrase_hash", "zz11111111111111111111111111111111111111111111111111111111111111")]
    #[case("encrypted_key", "22222222222222222222222222222222")]
    #[case("encrypted_key_iv", "3333333333333333333333333333333333")]
    fn malformed_field_is_an_error(#[case] field: &str, #[case] value: &str) {
        let toml = VALID_ENCRYPTION
            .lines()
            .map(|line| {
                if line.starts_with(&format!("{field} =")) {
                    format!("{field} = \"{value}\"")
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let result = validate_toml_str(&toml);
        assert!(result.has_errors());
        let diag = result
            .diagnostics
            .iter()
            .find(|d| d.path == format!("encryption.{field}"))
            .expect("diagnostic for the malformed field");
        assert_eq!(diag.category, "encryption");
        assert!(diag.message.contains("hex characters"));
    }

    #[test]
    fn incomplete_key_setup_is_an_error() {
        let result = validate_toml_str(
            r#"
[encryption]
salt = "0000000000000000000000000000000000000000000000000000000000000000"
"#,
        );
        let diag = result
            .diagnostics
            .iter()
            .find(|d| d.path == "encryption")
            .expect("incomplete diagnostic");
        assert!(diag.message.contains("encrypted_key_iv"));
    }

    #[test]
    fn unknown_key_with_suggestion() {
        let result = validate_toml_str(
            r#"
[encryption]
slat = "00"
"#,
        );
        let diag = result
            .diagnostics
            .iter()
            .find(|d| d.category == "unknown-field")
            .expect("unknown field");
        assert_eq!(diag.path, "encryption.slat");
        assert!(diag.message.contains("did you mean \"salt\""));
    }

    #[test]
    fn unknown_section_warned() {
        let result = validate_toml_str("[gogle]\nclient_id = \"x\"\n");
        let diag = &result.diagnostics[0];
        assert_eq!(diag.severity, Severity::Warning);
        assert!(diag.message.contains("google"));
    }

    #[test]
    fn syntax_error_detected() {
        let result = validate_toml_str("this is not valid toml [[[");
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn syntax_error_does_not_echo_source() {
        let result = validate_toml_str(
            "[google]\napi_key = \"AIzaSy-unterminated-key\n[upload]\n",
        );
        assert!(result.has_errors());
        let text = result.diagnostics[0].to_string();
        assert!(text.contains("TOML parse error at line "), "{text}");
        assert!(!text.contains("AIzaSy-unterminated-key"), "{text}");
    }

    #[test]
    fn zero_workers_rejected() {
        let result = validate_toml_str("[transfer]\nnum_workers = 0\n");
        assert!(result.has_errors());
    }

    #[test]
    fn bad_ignore_pattern_rejected() {
        let result = validate_toml_str("[upload]\nignored_regexp = [\"(unclosed\"]\n");
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].path, "upload.ignored_regexp[0]");
    }

    #[test]
    fn placeholder_secret_without_id_not_warned() {
        let result = validate_toml_str(
            r#"
[google]
client_id = "YOUR_GOOGLE_APP_CLIENT_ID"
client_secret = "YOUR_GOOGLE_APP_SECRET"
"#,
        );
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }
}
