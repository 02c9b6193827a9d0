//! Server configuration
//!
//! Resolution order is environment variables over CLI flags over defaults
//! (clap's native order is the reverse, so flags are parsed first and env
//! overrides are applied on top).

use std::time::Duration;

use clap::Parser;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Parser)]
#[command(name = "loyalty-server", about = "Loyalty points backend")]
pub struct CliArgs {
    /// Address and port to bind the HTTP server
    #[arg(short = 'a', long = "run-address", default_value = ":8080")]
    pub run_address: String,

    /// PostgreSQL connection URI
    #[arg(short = 'd', long = "database-uri", default_value = "")]
    pub database_uri: String,

    /// Base URL of the accrual system
    #[arg(short = 'r', long = "accrual-address", default_value = "")]
    pub accrual_address: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address (a bare `:port` binds on all interfaces)
    pub run_address: String,
    /// PostgreSQL connection URI
    pub database_uri: String,
    /// Accrual oracle base URL
    pub accrual_address: String,
    /// JWT signing secret (override in production)
    pub jwt_secret: String,
    /// `production` selects the terse logger; anything else the dev one
    pub log_level: String,
    /// Number of pipeline workers
    pub worker_pool_size: usize,
    /// Capacity of the work and retry queues
    pub worker_queue_size: usize,
    /// Period of the pending-order scanner
    pub worker_scan_interval: Duration,
    /// Minimum accepted password length at registration
    pub min_password_len: usize,
}

impl Config {
    /// Load configuration from CLI flags and the process environment.
    pub fn load() -> Result<Self, BoxError> {
        Self::from_sources(CliArgs::parse(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from explicit sources; env wins over flags.
    pub fn from_sources(
        cli: CliArgs,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, BoxError> {
        let mut cfg = Config {
            run_address: cli.run_address,
            database_uri: cli.database_uri,
            accrual_address: cli.accrual_address,
            jwt_secret: "dev-secret-change-in-production".into(),
            log_level: "info".into(),
            worker_pool_size: 3,
            worker_queue_size: 100,
            worker_scan_interval: Duration::from_secs(10),
            min_password_len: 6,
        };

        if let Some(addr) = env("RUN_ADDRESS").filter(|v| !v.is_empty()) {
            cfg.run_address = addr;
        }
        if let Some(uri) = env("DATABASE_URI").filter(|v| !v.is_empty()) {
            cfg.database_uri = uri;
        }
        if let Some(addr) = env("ACCRUAL_SYSTEM_ADDRESS").filter(|v| !v.is_empty()) {
            cfg.accrual_address = addr;
        }
        if let Some(secret) = env("JWT_SECRET").filter(|v| !v.is_empty()) {
            cfg.jwt_secret = secret;
        }
        if let Some(level) = env("LOG_LEVEL").filter(|v| !v.is_empty()) {
            cfg.log_level = level;
        }
        if let Some(size) = env("WORKER_POOL_SIZE").and_then(|v| v.parse().ok()) {
            if size > 0 {
                cfg.worker_pool_size = size;
            }
        }
        if let Some(size) = env("WORKER_QUEUE_SIZE").and_then(|v| v.parse().ok()) {
            if size > 0 {
                cfg.worker_queue_size = size;
            }
        }
        if let Some(interval) = env("WORKER_SCAN_INTERVAL").as_deref().and_then(parse_duration) {
            if !interval.is_zero() {
                cfg.worker_scan_interval = interval;
            }
        }

        if cfg.database_uri.is_empty() {
            return Err("database URI is required (use -d flag or DATABASE_URI env)".into());
        }
        if cfg.accrual_address.is_empty() {
            return Err(
                "accrual system address is required (use -r flag or ACCRUAL_SYSTEM_ADDRESS env)"
                    .into(),
            );
        }

        Ok(cfg)
    }

    /// Bind address acceptable to `TcpListener`; `:8080` means `0.0.0.0:8080`.
    pub fn bind_addr(&self) -> String {
        if self.run_address.starts_with(':') {
            format!("0.0.0.0{}", self.run_address)
        } else {
            self.run_address.clone()
        }
    }
}

/// Parse a duration string with an `ms`, `s`, `m` or `h` suffix.
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (value, unit) = s.split_at(s.find(|c: char| !c.is_ascii_digit())?);
    let value: u64 = value.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}
