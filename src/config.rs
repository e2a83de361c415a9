use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub stripe: StripeConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    #[serde(default)]
    pub price_base_monthly: Option<String>,
    #[serde(default)]
    pub price_topup_250: Option<String>,
    #[serde(default)]
    pub price_topup_500: Option<String>,
    #[serde(default)]
    pub price_topup_1000: Option<String>,
}

impl StripeConfig {
    /// Price id for a top-up pack size, if configured.
    pub fn topup_price_id(&self, emails: i64) -> Option<&str> {
        match emails {
            250 => self.price_topup_250.as_deref(),
            500 => self.price_topup_500.as_deref(),
            1000 => self.price_topup_1000.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Absolute base URL used to build checkout/portal return links.
    pub base_url: String,
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str)
                    .map_err(|e| format!("Failed to parse config file: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // No config file: build entirely from environment variables
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                let database_url = get_env("DATABASE_URL")
                    .ok_or("Missing DATABASE_URL and no config.toml found")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                    },
                    stripe: StripeConfig {
                        secret_key: get_env("STRIPE_SECRET_KEY").unwrap_or_default(),
                        webhook_secret: get_env("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
                        price_base_monthly: get_env("STRIPE_PRICE_BASE_MONTHLY"),
                        price_topup_250: get_env("STRIPE_PRICE_TOPUP_250"),
                        price_topup_500: get_env("STRIPE_PRICE_TOPUP_500"),
                        price_topup_1000: get_env("STRIPE_PRICE_TOPUP_1000"),
                    },
                    app: AppConfig {
                        base_url: get_env("APP_BASE_URL")
                            .unwrap_or_else(|| "http://localhost:8080".to_string()),
                    },
                }
            }
            Err(e) => {
                return Err(format!("Failed to read config file {config_path}: {e}").into());
            }
        };

        // Environment overrides apply even when the file exists
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("STRIPE_SECRET_KEY") {
            config.stripe.secret_key = v;
        }
        if let Ok(v) = env::var("STRIPE_WEBHOOK_SECRET") {
            config.stripe.webhook_secret = v;
        }
        if let Ok(v) = env::var("STRIPE_PRICE_BASE_MONTHLY") {
            config.stripe.price_base_monthly = Some(v);
        }
        if let Ok(v) = env::var("STRIPE_PRICE_TOPUP_250") {
            config.stripe.price_topup_250 = Some(v);
        }
        if let Ok(v) = env::var("STRIPE_PRICE_TOPUP_500") {
            config.stripe.price_topup_500 = Some(v);
        }
        if let Ok(v) = env::var("STRIPE_PRICE_TOPUP_1000") {
            config.stripe.price_topup_1000 = Some(v);
        }
        if let Ok(v) = env::var("APP_BASE_URL") {
            config.app.base_url = v;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topup_price_id_maps_pack_sizes() {
        let stripe = StripeConfig {
            secret_key: "sk_test_123".to_string(),
            webhook_secret: "whsec_123".to_string(),
            price_base_monthly: Some("price_base".to_string()),
            price_topup_250: Some("price_250".to_string()),
            price_topup_500: None,
            price_topup_1000: Some("price_1000".to_string()),
        };
        assert_eq!(stripe.topup_price_id(250), Some("price_250"));
        assert_eq!(stripe.topup_price_id(500), None);
        assert_eq!(stripe.topup_price_id(1000), Some("price_1000"));
        assert_eq!(stripe.topup_price_id(300), None);
    }
}
