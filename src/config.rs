use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose};
use clap::Parser;
use rand::Rng;
use std::{env, fmt, str::FromStr};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SESSION_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Base used when building signed file links.
    pub public_url: String,
    pub signing_key: Vec<u8>,
    pub session_ttl_secs: u64,
    pub max_upload_bytes: usize,
}

// Keeps the signing key out of logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("public_url", &self.public_url)
            .field("signing_key", &"<redacted>")
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish()
    }
}

/// What the process was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Migrate,
    CreateUser {
        email: String,
        username: Option<String>,
        admin: bool,
    },
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Upload review service")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_REVIEW_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_REVIEW_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded files are stored (overrides UPLOAD_REVIEW_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides UPLOAD_REVIEW_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public base URL for signed links (overrides UPLOAD_REVIEW_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// HMAC key for signed links (overrides UPLOAD_REVIEW_SIGNING_KEY)
    #[arg(long)]
    pub signing_key: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Create a profile with this email, print a session token and exit
    #[arg(long, value_name = "EMAIL")]
    pub create_user: Option<String>,

    /// Username for --create-user (defaults to the email's local part)
    #[arg(long, requires = "create_user")]
    pub username: Option<String>,

    /// Grant the admin role to the user created with --create-user
    #[arg(long, requires = "create_user")]
    pub admin: bool,
}

impl Args {
    fn command(&self) -> Command {
        if let Some(email) = &self.create_user {
            Command::CreateUser {
                email: email.clone(),
                username: self.username.clone(),
                admin: self.admin,
            }
        } else if self.migrate {
            Command::Migrate
        } else {
            Command::Serve
        }
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command to run.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("UPLOAD_REVIEW_HOST").unwrap_or_else(|_| DEFAULT_HOST.into());
        let env_port = parse_env("UPLOAD_REVIEW_PORT", DEFAULT_PORT)?;
        let env_storage =
            env::var("UPLOAD_REVIEW_STORAGE_DIR").unwrap_or_else(|_| "./data/uploads".into());
        let env_db = env::var("UPLOAD_REVIEW_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/upload_review.db".into());
        let env_public_url = env::var("UPLOAD_REVIEW_PUBLIC_URL").ok();
        let session_ttl_secs =
            parse_env("UPLOAD_REVIEW_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS)?;
        let max_upload_bytes =
            parse_env("UPLOAD_REVIEW_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let signing_key = match args
            .signing_key
            .clone()
            .map_or_else(|| env::var("UPLOAD_REVIEW_SIGNING_KEY"), Ok)
        {
            Ok(key) if !key.is_empty() => key.into_bytes(),
            _ => {
                tracing::warn!(
                    "UPLOAD_REVIEW_SIGNING_KEY not set; signed links will not survive a restart"
                );
                random_key()
            }
        };

        // --- Merge ---
        let host = args.host.clone().unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let public_url = args
            .public_url
            .clone()
            .or(env_public_url)
            .unwrap_or_else(|| default_public_url(&host, port));

        let cfg = Self {
            host,
            port,
            storage_dir: args.storage_dir.clone().unwrap_or(env_storage),
            database_url: args.database_url.clone().unwrap_or(env_db),
            public_url,
            signing_key,
            session_ttl_secs,
            max_upload_bytes,
        };

        Ok((cfg, args.command()))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

/// Links must be reachable from a browser, so a wildcard bind address is
/// replaced with localhost.
fn default_public_url(host: &str, port: u16) -> String {
    let host = match host {
        "0.0.0.0" | "::" => "localhost",
        other => other,
    };
    format!("http://{}:{}", host, port)
}

fn random_key() -> Vec<u8> {
    let mut key = [0u8; 32];
    rand::rng().fill(&mut key);
    general_purpose::STANDARD.encode(key).into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::parse_from(std::iter::once("upload-review").chain(args.iter().copied()))
    }

    #[test]
    fn command_selection() {
        assert_eq!(parse(&[]).command(), Command::Serve);
        assert_eq!(parse(&["--migrate"]).command(), Command::Migrate);
        assert_eq!(
            parse(&["--create-user", "root@example.com", "--admin"]).command(),
            Command::CreateUser {
                email: "root@example.com".into(),
                username: None,
                admin: true,
            }
        );
    }

    #[test]
    fn admin_flag_needs_create_user() {
        let result = Args::try_parse_from(["upload-review", "--admin"]);
        assert!(result.is_err());
    }

    #[test]
    fn wildcard_hosts_get_localhost_links() {
        assert_eq!(default_public_url("0.0.0.0", 3000), "http://localhost:3000");
        assert_eq!(default_public_url("10.1.2.3", 8080), "http://10.1.2.3:8080");
    }
}
