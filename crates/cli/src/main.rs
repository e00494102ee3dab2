mod auth_commands;
mod config_commands;
mod key_commands;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    secrecy::ExposeSecret,
    skiff_common::{RedactingMakeWriter, Redactor, SecretKind},
    skiff_config::SkiffConfig,
    skiff_oauth::{
        ApiKeyTransport, CredentialBroker, FlakyTransport, LoggingTransport, SharedTransport,
        Terminal, TokenStore, load_oauth_config,
    },
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "skiff", version, about = "Sync files with Google Drive, encrypted client-side")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ./skiff.toml, then ~/.config/skiff/skiff.toml).
    #[arg(long, global = true, env = "SKIFF_CONFIG")]
    config: Option<PathBuf>,

    /// Token cache file (default: ~/.config/skiff/tokencache.json).
    #[arg(long, global = true)]
    token_cache: Option<PathBuf>,

    /// Print the authorization URL and read the code from the terminal
    /// instead of starting a browser.
    #[arg(long, global = true, default_value_t = false)]
    no_browser_auth: bool,

    /// Log every HTTP request and response at debug level.
    #[arg(long, global = true, default_value_t = false)]
    dump_http: bool,

    /// Fail every Nth HTTP request.
    #[arg(long, global = true, hide = true, value_name = "N")]
    flaky_http: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a documented configuration file.
    Init {
        /// Where to write it (default: ~/.config/skiff/skiff.toml).
        path: Option<PathBuf>,
    },
    /// Generate encryption key material from $SKIFF_PASSPHRASE.
    Genkey,
    /// Google account authorization.
    Auth {
        #[command(subcommand)]
        action: auth_commands::AuthAction,
    },
    /// Configuration checks.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

/// Initialise tracing. Every line goes through `redactor` on its way to
/// stderr.
fn init_telemetry(cli: &Cli, redactor: Redactor) {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    if cli.dump_http
        && let Ok(directive) = "skiff_oauth::transport=debug".parse()
    {
        filter = filter.add_directive(directive);
    }
    let writer = RedactingMakeWriter::stderr(redactor);

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(writer),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(writer),
            )
            .init();
    }
}

/// Config path and its validated contents. Error-level diagnostics abort here,
/// before anything touches the network.
fn load_config(cli: &Cli, redactor: &Redactor) -> anyhow::Result<(PathBuf, SkiffConfig)> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => skiff_config::find_config_file().with_context(|| {
            format!(
                "no configuration file found; run `skiff init` to create {}",
                skiff_config::default_config_path().display()
            )
        })?,
    };
    let config = skiff_config::load_validated(&path)?;
    register_config_secrets(&config, redactor);
    Ok((path, config))
}

/// Teach `redactor` the credentials a config file carries.
pub(crate) fn register_config_secrets(config: &SkiffConfig, redactor: &Redactor) {
    let google = &config.google;
    if let Some(id) = &google.client_id {
        redactor.register(SecretKind::ClientId, id);
    }
    if let Some(secret) = &google.client_secret {
        redactor.register(SecretKind::ClientSecret, secret.expose_secret());
    }
    if let Some(key) = &google.api_key {
        redactor.register(SecretKind::ApiKey, key.expose_secret());
    }
}

/// reqwest, wrapped by the decorators the flags and config ask for.
fn build_transport(cli: &Cli, config: &SkiffConfig, redactor: &Redactor) -> SharedTransport {
    let mut transport: SharedTransport = Arc::new(reqwest::Client::new());
    if let Some(every) = cli.flaky_http {
        debug!(every, "injecting HTTP failures");
        transport = Arc::new(FlakyTransport::new(transport, every));
    }
    if let Some(key) = &config.google.api_key {
        redactor.register(SecretKind::ApiKey, key.expose_secret());
        transport = Arc::new(ApiKeyTransport::new(transport, key.clone()));
    }
    if cli.dump_http {
        transport = Arc::new(LoggingTransport::new(transport));
    }
    transport
}

fn token_cache_path(cli: &Cli, config: &SkiffConfig) -> PathBuf {
    cli.token_cache
        .clone()
        .or_else(|| config.auth.token_cache.clone())
        .unwrap_or_else(skiff_config::default_token_cache_path)
}

fn build_broker(cli: &Cli, config: &SkiffConfig, redactor: &Redactor) -> CredentialBroker {
    CredentialBroker::new(
        load_oauth_config(&config.google),
        TokenStore::new(token_cache_path(cli, config)),
        build_transport(cli, config, redactor),
        Arc::new(Terminal::new(config.auth.browser_launchers.clone())),
        redactor.clone(),
    )
}

async fn run(cli: Cli, redactor: &Redactor) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init { path } => {
            let path = path.clone().unwrap_or_else(skiff_config::default_config_path);
            skiff_config::write_default_config(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        },
        Commands::Genkey => key_commands::genkey().await,
        Commands::Auth { action } => {
            let (_, config) = load_config(&cli, redactor)?;
            let broker = build_broker(&cli, &config, redactor);
            auth_commands::handle_auth(action, &broker, !cli.no_browser_auth).await
        },
        Commands::Config { action } => config_commands::handle_config(action, &cli, redactor).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let redactor = Redactor::new();
    init_telemetry(&cli, redactor.clone());

    match run(cli, &redactor).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("skiff: {}", redactor.redact(&format!("{e:#}")));
            ExitCode::FAILURE
        },
    }
}
