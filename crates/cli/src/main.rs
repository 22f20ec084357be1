//! OAuth2 basic command-line tool.
//!
//! Provides subcommands for generating and validating configuration,
//! inspecting the OAuth2 strategy options, testing field extraction against
//! a saved user-info document, running a full login against the host
//! database, and inspecting stored identity links.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use oauth2_basic_core::avatar::HttpAvatarImporter;
use oauth2_basic_core::config::PluginConfig;
use oauth2_basic_core::db::Database;
use oauth2_basic_core::extract::{self, extract_identity};
use oauth2_basic_core::fetch::HttpUserInfoFetcher;
use oauth2_basic_core::identity::{IdentityLinks, UserDirectory, PLUGIN_NAMESPACE};
use oauth2_basic_core::strategy::{ProviderDescriptor, StrategyOptions};
use oauth2_basic_core::OAuth2BasicAuthenticator;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// OAuth2 basic command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "oauth2-basic",
    version,
    about = "Link OAuth2 provider identities to local accounts"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(
        short,
        long,
        global = true,
        default_value = "/etc/oauth2-basic/config.toml"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./oauth2-basic.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Print the OAuth2 strategy options and provider descriptor as JSON.
    Strategy,

    /// Run field extraction against a saved user-info document.
    Extract {
        /// Path to a JSON file.
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Log in with an access token: fetch, link, and create the account if
    /// needed.
    Login {
        /// OAuth2 access token.
        #[arg(long, env = "OAUTH2_ACCESS_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Show stored identity links.
    Links {
        /// Look up by provider user id.
        #[arg(long, conflicts_with = "user_id")]
        external_id: Option<String>,

        /// Look up by local user id.
        #[arg(long)]
        user_id: Option<i64>,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.config);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins; otherwise use the config's log level, else `warn`.
fn init_tracing(config_path: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = PluginConfig::load_from_file(config_path)
            .map(|c| c.host.log_level)
            .unwrap_or_else(|_| "warn".into());
        EnvFilter::new(level)
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        Commands::Extract { file } => {
            let config = load_config(&cli.config)?;
            cmd_extract(&config, &file)
        }
        Commands::Strategy => {
            let config = load_config(&cli.config)?;
            cmd_strategy(&config)
        }
        Commands::Login { token } => {
            let config = load_config(&cli.config)?;
            let db = open_database(&config)?;
            cmd_login(config, &db, &token).await
        }
        Commands::Links {
            external_id,
            user_id,
        } => {
            let config = load_config(&cli.config)?;
            let db = open_database(&config)?;
            cmd_links(&db, external_id.as_deref(), user_id)
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

fn load_config(path: &Path) -> Result<PluginConfig> {
    PluginConfig::load_and_resolve(path).context("failed to load configuration file")
}

fn open_database(config: &PluginConfig) -> Result<Database> {
    debug!(path = %config.database_path().display(), "opening database");
    let db = Database::new(config.database_path()).context("failed to open database")?;
    db.initialize().context("failed to initialize database")?;
    Ok(db)
}

fn or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(none)")
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# OAuth2 basic configuration

[host]
data_dir = "/var/lib/oauth2-basic"
log_level = "info"

[oauth2]
enabled = true
client_id = "your-client-id"
client_secret_env = "OAUTH2_CLIENT_SECRET"
authorize_url = "https://id.example.com/oauth/authorize"
token_url = "https://id.example.com/oauth/token"
user_json_url = "https://id.example.com/api/me"
send_auth_header = true
button_title = "with OAuth2"

[json_paths]
user_id = "id"
username = "login"
name = "name"
email = "email"

[accounts]
email_verified = false
force_email_domain = ""
override_username = false
store_username_in_title = false
# avatar_url_template = "https://id.example.com/avatars/%{oauth_id}.png"

[debug]
debug_auth = false
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your provider's endpoints and JSON paths");
    println!("  2. Set the referenced environment variable (OAUTH2_CLIENT_SECRET)");
    println!(
        "  3. Validate with: oauth2-basic validate --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        PluginConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    let _ = config.resolve_env_vars();
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => println!("  [OK] All required fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let paths = &config.json_paths;
    println!();
    println!("Configuration summary:");
    println!("  Enabled         : {}", config.oauth2.enabled);
    println!("  Client ID       : {}", config.oauth2.client_id);
    println!(
        "  Client secret   : {}",
        if config.oauth2.client_secret.is_some() {
            "set"
        } else {
            "NOT SET"
        }
    );
    println!("  Authorize URL   : {}", config.oauth2.authorize_url);
    println!("  Token URL       : {}", config.oauth2.token_url);
    println!("  User JSON URL   : {}", config.oauth2.user_json_url);
    println!(
        "  Field paths     : user_id={} username={} name={} email={}",
        paths.user_id, paths.username, paths.name, paths.email
    );
    println!(
        "  Email policy    : {}",
        match config.accounts.forced_email_domain() {
            Some(domain) => format!("forced @{domain}"),
            None if config.accounts.email_verified => "provider emails trusted".into(),
            None => "provider emails unverified".into(),
        }
    );
    println!("  Data directory  : {}", config.host.data_dir.display());
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn cmd_strategy(config: &PluginConfig) -> Result<()> {
    let options = StrategyOptions::from_config(config).context("cannot build strategy options")?;
    let output = serde_json::json!({
        "strategy": options.redacted(),
        "provider": ProviderDescriptor::from_config(config),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn cmd_extract(config: &PluginConfig, file: &Path) -> Result<()> {
    let body = std::fs::read(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let document = extract::decode(&body).context("user-info document is not valid JSON")?;
    let identity = extract_identity(&document, &config.json_paths);

    println!("Extracted identity");
    println!("==================");
    println!();
    println!("  user_id : {}", or_none(&identity.user_id));
    println!("  username: {}", or_none(&identity.username));
    println!("  name    : {}", or_none(&identity.name));
    println!("  email   : {}", or_none(&identity.email));
    Ok(())
}

async fn cmd_login(config: PluginConfig, db: &Database, token: &str) -> Result<()> {
    let timeout = Duration::from_secs(config.oauth2.http_timeout_secs);
    let fetcher = HttpUserInfoFetcher::new(timeout).context("failed to build HTTP client")?;
    let avatars = HttpAvatarImporter::new(config.avatar_dir(), timeout)
        .context("failed to build avatar client")?;
    let auth = OAuth2BasicAuthenticator::new(config, fetcher);

    let result = auth
        .after_authenticate(token, db, db)
        .await
        .context("authentication failed")?;

    let (mut user, created) = auth
        .complete_login(&result, db)
        .context("failed to complete login")?;
    if created {
        auth.after_create_account(&mut user, &result.extra_data, db, db, &avatars)
            .await
            .context("post-creation hook failed")?;
    }
    info!(user_id = user.id, created, "login complete");

    let output = serde_json::json!({
        "result": result,
        "account_created": created,
        "user": user,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn cmd_links(db: &Database, external_id: Option<&str>, user_id: Option<i64>) -> Result<()> {
    let links = IdentityLinks::new(db);

    match (external_id, user_id) {
        (Some(external_id), _) => match links
            .find(external_id)
            .context("failed to read identity link")?
        {
            Some(link) => {
                let user = match link.user_id {
                    Some(id) => db.find_by_id(id).context("failed to read user")?,
                    None => None,
                };
                println!("External id {external_id}:");
                println!(
                    "  Local user id: {}",
                    link.user_id.map(|id| id.to_string()).unwrap_or_else(|| "(none)".into())
                );
                println!(
                    "  Username     : {}",
                    user.map(|u| u.username).unwrap_or_else(|| "(user missing)".into())
                );
            }
            None => println!("No link for external id {external_id}."),
        },
        (None, Some(user_id)) => {
            let external = links
                .external_id_for(user_id)
                .context("failed to read identity link")?;
            match external {
                Some(external_id) => {
                    println!("User {user_id} is linked to external id {external_id}.")
                }
                None => println!("No link for user {user_id}."),
            }
        }
        (None, None) => {
            let rows = db
                .list_plugin_rows(PLUGIN_NAMESPACE)
                .context("failed to list identity links")?;
            if rows.is_empty() {
                println!("No identity links stored.");
                return Ok(());
            }
            println!("{:<40} {:<30} {}", "KEY", "VALUE", "UPDATED");
            println!("{}", "-".repeat(96));
            for row in &rows {
                println!("{:<40} {:<30} {}", row.key, row.value.to_string(), row.updated_at);
            }
            println!();
            println!("{} row(s)", rows.len());
        }
    }

    Ok(())
}
