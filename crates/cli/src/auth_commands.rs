use {
    anyhow::Result,
    clap::Subcommand,
    skiff_oauth::{CachedToken, CredentialBroker},
};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Authorize with Google, reusing a valid cached token.
    Login {
        /// Authorize again even if a cached token exists.
        #[arg(long)]
        force: bool,
    },
    /// Show the state of the token cache.
    Status,
    /// Delete the token cache.
    Logout,
}

pub async fn handle_auth(
    action: &AuthAction,
    broker: &CredentialBroker,
    allow_browser: bool,
) -> Result<()> {
    match action {
        AuthAction::Login { force } => login(broker, *force, allow_browser).await,
        AuthAction::Status => status(broker),
        AuthAction::Logout => logout(broker),
    }
}

async fn login(broker: &CredentialBroker, force: bool, allow_browser: bool) -> Result<()> {
    if force {
        broker.authorize(allow_browser).await?;
    } else {
        let client = broker.authenticate(allow_browser).await?;
        // Refreshes an expired cached token now rather than on first use.
        client.access_token().await?;
    }
    println!("Authorized. Token cache: {}", broker.store().path().display());
    Ok(())
}

fn status(broker: &CredentialBroker) -> Result<()> {
    let path = broker.store().path().display().to_string();
    let cached = match broker.store().read() {
        Ok(Some(cached)) => cached,
        Ok(None) => {
            println!("Not logged in (no token cache at {path}).");
            return Ok(());
        },
        Err(e) => {
            println!("Token cache is unusable and will be replaced on next login: {e}");
            return Ok(());
        },
    };
    println!("{path}: {}", describe(&cached, broker.client_id(), now_secs()));
    Ok(())
}

fn logout(broker: &CredentialBroker) -> Result<()> {
    let path = broker.store().path().display().to_string();
    if broker.store().delete()? {
        println!("Removed {path}");
    } else {
        println!("Not logged in (no token cache at {path}).");
    }
    Ok(())
}

fn describe(cached: &CachedToken, client_id: &str, now: u64) -> String {
    if cached.client_id != client_id {
        return "issued to a different client id; run `skiff auth login`".into();
    }
    let refresh = if cached.tokens.refresh_token.is_some() {
        "refresh token present"
    } else {
        "no refresh token"
    };
    let expiry = cached.tokens.expires_at.map_or("unknown".to_string(), |ts| {
        if ts > now {
            let remaining = ts - now;
            let hours = remaining / 3600;
            let mins = (remaining % 3600) / 60;
            format!("valid ({hours}h {mins}m remaining)")
        } else {
            "expired".to_string()
        }
    });
    format!("access token {expiry}, {refresh}")
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
