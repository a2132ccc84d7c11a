use std::env;
use std::time::Duration;
use tracing::warn;

const DEFAULT_REFERENCE_CACHE_TTL_SECS: u64 = 15 * 60;
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub reference_cache_ttl_secs: u64,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            reference_cache_ttl_secs: env::var("AGENDA_REFERENCE_CACHE_TTL_SECS")
                .ok()
                .and_then(|raw| match raw.parse::<u64>() {
                    Ok(secs) => Some(secs),
                    Err(_) => {
                        warn!("AGENDA_REFERENCE_CACHE_TTL_SECS is not a number: {}", raw);
                        None
                    }
                })
                .unwrap_or(DEFAULT_REFERENCE_CACHE_TTL_SECS),
            port: env::var("PORT")
                .ok()
                .and_then(|raw| raw.parse::<u16>().ok())
                .unwrap_or_else(|| {
                    warn!("PORT not set or invalid, using default {}", DEFAULT_PORT);
                    DEFAULT_PORT
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// Config suitable for tests and local tooling: points at `supabase_url`
    /// with every other setting at its default.
    pub fn with_database(supabase_url: &str, anon_key: &str, jwt_secret: &str) -> Self {
        Self {
            supabase_url: supabase_url.to_string(),
            supabase_anon_key: anon_key.to_string(),
            supabase_jwt_secret: jwt_secret.to_string(),
            reference_cache_ttl_secs: DEFAULT_REFERENCE_CACHE_TTL_SECS,
            port: DEFAULT_PORT,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn reference_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.reference_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_database_defaults() {
        let config = AppConfig::with_database("http://localhost:54321", "anon", "secret");

        assert!(config.is_configured());
        assert_eq!(config.port, 3000);
        assert_eq!(config.reference_cache_ttl(), Duration::from_secs(900));
    }

    #[test]
    fn test_missing_database_is_not_configured() {
        let config = AppConfig::with_database("", "anon", "secret");
        assert!(!config.is_configured());
    }
}
