use anyhow::{Context, Result};
use clap::Parser;
use std::env;

pub const DEFAULT_MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub intake: IntakeSettings,
}

/// Bucket, table and region names shared by every request, plus the
/// largest body (and mirrored image) the service accepts.
///
/// Built once at startup and only read afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeSettings {
    pub source_bucket: String,
    pub destination_bucket: String,
    pub table_name: String,
    pub region: String,
    pub max_body_bytes: usize,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            source_bucket: "bookstore-dev-book-images-source".into(),
            destination_bucket: "bookstore-dev-book-images-resized".into(),
            table_name: "bookstore-dev-books".into(),
            region: "ap-southeast-1".into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl IntakeSettings {
    /// Canonical public URL of `filename` in the destination bucket.
    pub fn destination_url(&self, filename: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.destination_bucket, self.region, filename
        )
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Book intake API")]
pub struct Args {
    /// Host to bind to (overrides BOOK_INTAKE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BOOK_INTAKE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where uploaded images are stored (overrides BOOK_INTAKE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides BOOK_INTAKE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Bucket receiving original cover images (overrides SOURCE_BUCKET)
    #[arg(long)]
    pub source_bucket: Option<String>,

    /// Bucket serving resized cover images (overrides DESTINATION_BUCKET)
    #[arg(long)]
    pub destination_bucket: Option<String>,

    /// Table that book records are written to (overrides TABLE_NAME)
    #[arg(long)]
    pub table_name: Option<String>,

    /// Region used in destination URLs (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Maximum accepted request body in bytes (overrides BOOK_INTAKE_MAX_BODY_BYTES)
    #[arg(long)]
    pub max_body_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args)?, migrate))
    }

    fn merge(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("BOOK_INTAKE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("BOOK_INTAKE_PORT", 3000u16)?;
        let env_storage =
            env::var("BOOK_INTAKE_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("BOOK_INTAKE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/books.db".into());
        let env_max_body = parse_env("BOOK_INTAKE_MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?;

        let defaults = IntakeSettings::default();
        let intake = IntakeSettings {
            source_bucket: args
                .source_bucket
                .unwrap_or_else(|| env_or("SOURCE_BUCKET", defaults.source_bucket)),
            destination_bucket: args
                .destination_bucket
                .unwrap_or_else(|| env_or("DESTINATION_BUCKET", defaults.destination_bucket)),
            table_name: args
                .table_name
                .unwrap_or_else(|| env_or("TABLE_NAME", defaults.table_name)),
            region: args
                .region
                .unwrap_or_else(|| env_or("AWS_REGION", defaults.region)),
            max_body_bytes: args.max_body_bytes.unwrap_or(env_max_body),
        };

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            intake,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or(name: &str, default: String) -> String {
    env::var(name)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_url_uses_bucket_and_region() {
        let settings = IntakeSettings {
            destination_bucket: "covers-resized".into(),
            region: "eu-west-1".into(),
            ..IntakeSettings::default()
        };
        assert_eq!(
            settings.destination_url("cover.jpg"),
            "https://covers-resized.s3.eu-west-1.amazonaws.com/cover.jpg"
        );
    }

    #[test]
    fn cli_flags_override_defaults() {
        let args = Args::parse_from([
            "book-intake",
            "--port",
            "8080",
            "--source-bucket",
            "my-src",
            "--table-name",
            "books-test",
            "--max-body-bytes",
            "1048576",
        ]);
        let cfg = AppConfig::merge(args).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.intake.source_bucket, "my-src");
        assert_eq!(cfg.intake.table_name, "books-test");
        assert_eq!(cfg.intake.max_body_bytes, 1024 * 1024);
        assert_eq!(cfg.addr(), format!("{}:8080", cfg.host));
    }
}
