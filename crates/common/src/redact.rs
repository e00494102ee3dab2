//! Secret redaction for every piece of diagnostic output.
//!
//! A single [`Redactor`] holds the secrets registered at startup (OAuth client
//! id and secret, API key) and those learned later (access and refresh
//! tokens). Log lines reach stderr only through [`RedactingMakeWriter`], and
//! error text printed by the binary goes through [`Redactor::redact`].

use std::{
    borrow::Cow,
    io::{self, Write},
    sync::{Arc, LazyLock, PoisonError, RwLock},
};

use {regex::Regex, tracing_subscriber::fmt::MakeWriter};

/// Values shorter than this are never registered; redacting them would mangle
/// unrelated text.
const MIN_SECRET_LEN: usize = 4;

static BEARER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]+=*").ok());

const BEARER_PLACEHOLDER: &str = "Bearer [***AuthToken***]";

/// The kinds of secret the redactor knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKind {
    ClientId,
    ClientSecret,
    ApiKey,
    AccessToken,
    RefreshToken,
}

impl SecretKind {
    #[must_use]
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::ClientId => "[***ClientId***]",
            Self::ClientSecret => "[***ClientSecret***]",
            Self::ApiKey => "[***ApiKey***]",
            Self::AccessToken => "[***AuthToken***]",
            Self::RefreshToken => "[***RefreshToken***]",
        }
    }
}

#[derive(Debug)]
struct Rule {
    needle: String,
    kind: SecretKind,
}

/// Shared, cloneable set of secrets to scrub from diagnostic text.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    rules: Arc<RwLock<Vec<Rule>>>,
}

impl Redactor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret value. Empty and very short values are ignored.
    pub fn register(&self, kind: SecretKind, value: &str) {
        let value = value.trim();
        if value.len() < MIN_SECRET_LEN {
            return;
        }
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        if rules.iter().any(|r| r.needle == value) {
            return;
        }
        rules.push(Rule {
            needle: value.to_string(),
            kind,
        });
        // Longest first so a secret that contains another is replaced whole.
        rules.sort_by(|a, b| b.needle.len().cmp(&a.needle.len()));
    }

    /// Number of registered secrets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scrub registered secrets and bearer credentials from `text`.
    #[must_use]
    pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(text);
        {
            let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
            for rule in rules.iter() {
                if out.contains(rule.needle.as_str()) {
                    out = Cow::Owned(out.replace(rule.needle.as_str(), rule.kind.placeholder()));
                }
            }
        }
        if let Some(bearer) = BEARER.as_ref()
            && bearer.is_match(&out)
        {
            out = Cow::Owned(bearer.replace_all(&out, BEARER_PLACEHOLDER).into_owned());
        }
        out
    }
}

/// [`MakeWriter`] that buffers each formatted event and writes it, redacted,
/// to the inner writer.
#[derive(Debug, Clone)]
pub struct RedactingMakeWriter<M = fn() -> io::Stderr> {
    redactor: Redactor,
    inner: M,
}

impl RedactingMakeWriter {
    /// Redacting writer over stderr.
    #[must_use]
    pub fn stderr(redactor: Redactor) -> Self {
        Self {
            redactor,
            inner: io::stderr,
        }
    }
}

impl<M> RedactingMakeWriter<M> {
    #[must_use]
    pub fn new(redactor: Redactor, inner: M) -> Self {
        Self { redactor, inner }
    }
}

impl<'a, M> MakeWriter<'a> for RedactingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = RedactingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            redactor: self.redactor.clone(),
            inner: self.inner.make_writer(),
            buf: Vec::new(),
        }
    }
}

/// Writer handed out per event; flushes the redacted text on drop.
pub struct RedactingWriter<W: Write> {
    redactor: Redactor,
    inner: W,
    buf: Vec<u8>,
}

impl<W: Write> RedactingWriter<W> {
    fn flush_redacted(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&self.buf);
        let redacted = self.redactor.redact(&text);
        self.inner.write_all(redacted.as_bytes())?;
        self.buf.clear();
        self.inner.flush()
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Partial lines stay buffered; a secret split across two writes
        // would otherwise escape.
        if self.buf.ends_with(b"\n") {
            self.flush_redacted()
        } else {
            Ok(())
        }
    }
}

impl<W: Write> Drop for RedactingWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush_redacted();
    }
}
