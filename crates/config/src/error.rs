use std::path::PathBuf;

use skiff_common::FromMessage;

use crate::validate::Diagnostic;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// `detail` carries position and reason only, never the offending line.
    #[error("{path}: {detail} (you may want to run \"skiff init\" to create an initial configuration file)")]
    Parse { path: PathBuf, detail: String },
    #[error(
        "{path}: permissions of configuration file ({mode:o}) allow group/other access; your secrets are at risk"
    )]
    InsecurePermissions { path: PathBuf, mode: u32 },
    #[error("{0}: file already exists; leaving it alone")]
    AlreadyExists(PathBuf),
    #[error("malformed configuration:\n{}", format_diagnostics(.diagnostics))]
    Malformed { diagnostics: Vec<Diagnostic> },
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Describe a TOML error by line, column and reason.
///
/// The default `Display` of [`toml::de::Error`] quotes the source line, which
/// for a config file may hold a client secret or an API key.
pub(crate) fn describe_toml_error(raw: &str, error: &toml::de::Error) -> String {
    let reason = error.message().trim_end();
    let Some(before) = error.span().and_then(|span| raw.get(..span.start)) else {
        return reason.to_string();
    };
    let line = before.matches('\n').count() + 1;
    let column = before
        .rsplit_once('\n')
        .map_or(before, |(_, tail)| tail)
        .chars()
        .count()
        + 1;
    format!("TOML parse error at line {line}, column {column}: {reason}")
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| format!("  {d}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

skiff_common::impl_context!();
