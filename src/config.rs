use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Queue page size when the request does not set one.
    pub queue_default_limit: usize,
    /// Largest page size a request may ask for.
    pub queue_max_limit: usize,
    pub queue_cache_ttl_secs: u64,
    pub queue_cache_capacity: u64,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            port: 3000,
            queue_default_limit: 20,
            queue_max_limit: 100,
            queue_cache_ttl_secs: 60,
            queue_cache_capacity: 10_000,
            rate_limit_per_second: 10,
            rate_limit_burst: 20,
        }
    }
}

/// Read an optional numeric variable, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", name, raw)),
        _ => Ok(default),
    }
}

/// Scheme, host and database name of a connection URL, without credentials.
fn database_location(database_url: &str) -> String {
    match url::Url::parse(database_url) {
        Ok(url) => format!(
            "{}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or("localhost"),
            url.path()
        ),
        Err(_) => "<unparseable url>".to_string(),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: parse_var("PORT", defaults.port)
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            queue_default_limit: parse_var("QUEUE_DEFAULT_LIMIT", defaults.queue_default_limit)?,
            queue_max_limit: parse_var("QUEUE_MAX_LIMIT", defaults.queue_max_limit)?,
            queue_cache_ttl_secs: parse_var("QUEUE_CACHE_TTL_SECS", defaults.queue_cache_ttl_secs)?,
            queue_cache_capacity: parse_var("QUEUE_CACHE_CAPACITY", defaults.queue_cache_capacity)?,
            rate_limit_per_second: parse_var(
                "RATE_LIMIT_PER_SECOND",
                defaults.rate_limit_per_second,
            )?,
            rate_limit_burst: parse_var("RATE_LIMIT_BURST", defaults.rate_limit_burst)?,
        };

        config.validate()?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database: {}", database_location(&config.database_url));
        tracing::debug!(
            "Queue limits: default={}, max={}",
            config.queue_default_limit,
            config.queue_max_limit
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.queue_default_limit == 0 || self.queue_max_limit == 0 {
            anyhow::bail!("QUEUE_DEFAULT_LIMIT and QUEUE_MAX_LIMIT must be at least 1");
        }
        if self.queue_default_limit > self.queue_max_limit {
            anyhow::bail!(
                "QUEUE_DEFAULT_LIMIT ({}) cannot exceed QUEUE_MAX_LIMIT ({})",
                self.queue_default_limit,
                self.queue_max_limit
            );
        }
        if self.rate_limit_per_second == 0 || self.rate_limit_burst == 0 {
            anyhow::bail!("RATE_LIMIT_PER_SECOND and RATE_LIMIT_BURST must be at least 1");
        }
        Ok(())
    }
}
