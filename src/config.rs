use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Storage backend: `s3` or `memory`.
    pub backend: String,
    pub bucket: String,
    /// All keys live under this prefix; the bucket root is never exposed.
    pub root_prefix: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub allow_http: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Bucket-backed file manager API")]
pub struct Args {
    /// Host to bind to (overrides BUCKET_BROWSER_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BUCKET_BROWSER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage backend, `s3` or `memory` (overrides BUCKET_BROWSER_BACKEND)
    #[arg(long)]
    pub backend: Option<String>,

    /// Bucket to serve (overrides BUCKET_BROWSER_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Key prefix all operations are scoped under (overrides BUCKET_BROWSER_ROOT_PREFIX)
    #[arg(long)]
    pub root_prefix: Option<String>,

    /// Bucket region (overrides BUCKET_BROWSER_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint, e.g. MinIO (overrides BUCKET_BROWSER_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Allow plain-HTTP endpoints (overrides BUCKET_BROWSER_ALLOW_HTTP)
    #[arg(long)]
    pub allow_http: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("BUCKET_BROWSER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("BUCKET_BROWSER_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing BUCKET_BROWSER_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading BUCKET_BROWSER_PORT"),
        };
        let env_backend = env::var("BUCKET_BROWSER_BACKEND").unwrap_or_else(|_| "s3".into());
        let env_bucket = env::var("BUCKET_BROWSER_BUCKET").unwrap_or_default();
        let env_prefix =
            env::var("BUCKET_BROWSER_ROOT_PREFIX").unwrap_or_else(|_| "file-manager".into());
        let env_region = env::var("BUCKET_BROWSER_REGION").unwrap_or_else(|_| "us-east-1".into());
        let env_endpoint = env::var("BUCKET_BROWSER_ENDPOINT").ok();
        let env_allow_http = env::var("BUCKET_BROWSER_ALLOW_HTTP")
            .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        // Credentials come from the environment only; never from argv.
        let access_key_id = env::var("AWS_ACCESS_KEY_ID").ok();
        let secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok();

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            backend: args.backend.unwrap_or(env_backend),
            bucket: args.bucket.unwrap_or(env_bucket),
            root_prefix: args.root_prefix.unwrap_or(env_prefix),
            region: args.region.unwrap_or(env_region),
            endpoint: args.endpoint.or(env_endpoint),
            access_key_id,
            secret_access_key,
            allow_http: args.allow_http || env_allow_http,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Manual Debug so the secret key never lands in startup logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("root_prefix", &self.root_prefix)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id.as_deref().map(|_| "…"))
            .field(
                "secret_access_key",
                &self.secret_access_key.as_deref().map(|_| "…"),
            )
            .field("allow_http", &self.allow_http)
            .finish()
    }
}
