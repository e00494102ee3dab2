//! How the broker talks to the person at the keyboard.

use std::{
    io::{self, BufRead, Write},
    process::Stdio,
};

use {async_trait::async_trait, tracing::debug};

use crate::error::{Context, Error, Result};

/// User-facing side of the authorization flow.
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Show `url` in a browser. Errors when no browser could be started.
    async fn open_browser(&self, url: &str) -> Result<()>;

    /// Show `url` and read the authorization code the user pastes back.
    async fn prompt_for_code(&self, url: &str) -> Result<String>;
}

/// Interactive terminal: launches browsers as child processes and reads the
/// code from stdin.
#[derive(Debug, Clone)]
pub struct Terminal {
    launchers: Vec<String>,
}

impl Terminal {
    /// `launchers` are tried in order; the first one that exits successfully
    /// wins. The platform opener is the last resort.
    pub fn new(launchers: Vec<String>) -> Self {
        Self { launchers }
    }
}

#[async_trait]
impl Interaction for Terminal {
    async fn open_browser(&self, url: &str) -> Result<()> {
        for launcher in &self.launchers {
            let status = tokio::process::Command::new(launcher)
                .arg(url)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match status {
                Ok(s) if s.success() => {
                    debug!(launcher, "browser launched");
                    return Ok(());
                },
                Ok(s) => debug!(launcher, status = %s, "browser launcher failed"),
                Err(e) => debug!(launcher, error = %e, "browser launcher not available"),
            }
        }

        let target = url.to_string();
        let opened = tokio::task::spawn_blocking(move || open::that(target))
            .await
            .map_err(|e| Error::external("browser launch task failed", e))?;
        match opened {
            Ok(()) => {
                debug!("browser launched with the platform opener");
                Ok(())
            },
            Err(e) => Err(Error::authorization(format!(
                "could not open a browser ({e}); rerun with --no-browser-auth to paste the \
                 code manually"
            ))),
        }
    }

    async fn prompt_for_code(&self, url: &str) -> Result<String> {
        let url = url.to_string();
        let line = tokio::task::spawn_blocking(move || -> io::Result<String> {
            let mut out = io::stdout().lock();
            writeln!(out, "Go to the following link in your browser:\n\n  {url}\n")?;
            write!(out, "Enter verification code: ")?;
            out.flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .context("prompt task failed")??;

        let code = line.trim();
        if code.is_empty() {
            return Err(Error::authorization("no verification code entered"));
        }
        Ok(code.to_string())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn first_successful_launcher_wins() {
        // `false` exits 1, `true` exits 0 regardless of arguments.
        let terminal = Terminal::new(vec![
            "skiff-no-such-browser".into(),
            "false".into(),
            "true".into(),
        ]);
        terminal
            .open_browser("https://accounts.example.com/auth")
            .await
            .unwrap();
    }
}
