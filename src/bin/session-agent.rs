use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{arg, command, Parser, Subcommand};
use reqwest::Method;
use serde_json::Value;
use session_agent::auth::api::AuthApi;
use session_agent::auth::notifier::{AuthStateNotifier, BroadcastNotifier};
use session_agent::auth::request::AuthenticatedRequest;
use session_agent::observability::metrics::get_metrics;
use session_agent::store::backend::build_backend;
use session_agent::store::credential_store::CredentialStore;
use session_agent::utils::config_loader;
use session_agent::utils::constants::DEFAULT_CONFIG_PATH;
use session_agent::utils::logging;
use session_agent::utils::logging::LogLevel;
use tracing::{debug, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
    /// Dump prometheus metrics to stdout before exiting
    #[arg(long)]
    print_metrics: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Exchange username and password for a session
    Login {
        username: String,
        #[arg(long, env = "SESSION_AGENT_PASSWORD")]
        password: String,
    },
    Register {
        username: String,
        #[arg(long, env = "SESSION_AGENT_PASSWORD")]
        password: String,
    },
    Logout,
    /// Rotate the stored tokens now
    Refresh,
    /// Print the session state
    Status,
    /// Print the logged in user's profile
    User,
    /// Authenticated call, e.g. `request GET /user`
    Request {
        method: String,
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
        /// key=value, repeatable
        #[arg(long)]
        query: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level.to_owned())?;
    let settings = &service_config.settings;

    // -------------------------------
    // 2. Restore persisted session
    // -------------------------------

    let store = Arc::new(CredentialStore::load(build_backend(&settings.storage)?).await);

    // -------------------------------
    // 3. Build request pipeline
    // -------------------------------

    let notifier = BroadcastNotifier::new();
    let mut events = notifier.subscribe();
    let notifier: Arc<dyn AuthStateNotifier> = Arc::new(notifier);
    let api = AuthApi::from_settings(settings, store.clone(), notifier)?;

    // -------------------------------
    // 4. Run command
    // -------------------------------

    let outcome = run_command(&api, &store, args.command).await;

    while let Ok(event) = events.try_recv() {
        debug!("auth event: {:?}", event);
    }

    // -------------------------------
    // 5. Metrics
    // -------------------------------

    if args.print_metrics {
        print!("{}", get_metrics().render()?);
    }

    outcome
}

async fn run_command(api: &AuthApi, store: &CredentialStore, command: Command) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            api.login(&username, &password).await?;
            println!("logged in as {}", username);
        }
        Command::Register { username, password } => {
            api.register(&username, &password).await?;
            println!("registered {}", username);
        }
        Command::Logout => {
            api.logout().await?;
            println!("logged out");
        }
        Command::Refresh => {
            api.executor()
                .coordinator()
                .refresh_now()
                .await
                .map_err(|e| anyhow!("refresh failed: {}", e))?;
            println!("session refreshed");
        }
        Command::Status => {
            let session = store.read();
            println!("state: {}", session.state().as_str());
            if let Some(expires_at) = session.access.expires_at() {
                println!("access token expires at: {}", expires_at.to_rfc3339());
            }
        }
        Command::User => match api.current_user().await? {
            Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
            None => return Err(anyhow!("not logged in")),
        },
        Command::Request { method, path, body, query } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .map_err(|e| anyhow!("invalid method '{}': {}", method, e))?;
            let mut request = AuthenticatedRequest::new(method, path);
            for pair in query {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow!("query '{}' must be key=value", pair))?;
                request = request.with_query(key, value);
            }
            if let Some(body) = body {
                let json: Value = serde_json::from_str(&body)?;
                request = request.with_json(&json)?;
            }

            let response = api.executor().execute(request).await?;
            info!("HTTP {}", response.status);
            println!("{}", response.text());
        }
    }
    Ok(())
}
