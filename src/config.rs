use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub api_key: String,
    /// Overrides the endpoint derived from the API key (proxies, tests).
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub interest_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            api_key: std::env::var("MAILCHIMP_API_KEY")
                .map_err(|_| anyhow::anyhow!("MAILCHIMP_API_KEY environment variable required"))
                .and_then(|key| {
                    if key.trim().is_empty() {
                        anyhow::bail!("MAILCHIMP_API_KEY cannot be empty");
                    }
                    if !key.contains('-') {
                        anyhow::bail!("MAILCHIMP_API_KEY must end in a data center suffix like -us6");
                    }
                    Ok(key)
                })?,
            base_url: std::env::var("MAILCHIMP_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("MAILCHIMP_BASE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?,
            timeout_secs: std::env::var("MAILCHIMP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAILCHIMP_TIMEOUT_SECS must be a whole number"))?,
            interest_cache_ttl_secs: std::env::var("INTEREST_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("INTEREST_CACHE_TTL_SECS must be a whole number"))?,
        };

        // Never log the key itself
        tracing::info!("Configuration loaded successfully");
        if let Some(ref base_url) = config.base_url {
            tracing::info!("MailChimp base URL overridden: {}", base_url);
        }
        tracing::debug!("HTTP timeout: {}s", config.timeout_secs);
        tracing::debug!("Interest cache TTL: {}s", config.interest_cache_ttl_secs);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
