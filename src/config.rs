use anyhow::{anyhow, Context, Result};
use std::env;
use std::fmt;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub credentials_name: String,
    pub merchant_uid: String,
    pub api_user_id: String,
    pub api_key: String,
    pub base_url: String,
    pub supported_currencies: Vec<String>,
    pub success_url: String,
    pub failure_url: String,
    pub store_id: Option<String>,
    pub hpp_key: Option<String>,
    pub request_timeout_secs: u64,
}

// The API key must never reach the logs, including via {:?}
impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("credentials_name", &self.credentials_name)
            .field("merchant_uid", &self.merchant_uid)
            .field("api_user_id", &self.api_user_id)
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("supported_currencies", &self.supported_currencies)
            .field("store_id", &self.store_id)
            .field("hpp_key", &self.hpp_key.as_ref().map(|_| "***"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .context("PORT not set")?
                .parse()
                .context("PORT must be a valid number")?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        };

        let supported_currencies_str = env::var("WAAFIPAY_SUPPORTED_CURRENCIES")
            .context("WAAFIPAY_SUPPORTED_CURRENCIES not set")?;
        let supported_currencies: Vec<String> = supported_currencies_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let gateway = GatewayConfig {
            credentials_name: env::var("WAAFIPAY_CREDENTIALS_NAME")
                .unwrap_or_else(|_| "Default WaafiPay".to_string()),
            merchant_uid: env::var("WAAFIPAY_MERCHANT_UID")
                .context("WAAFIPAY_MERCHANT_UID not set")?,
            api_user_id: env::var("WAAFIPAY_API_USER_ID")
                .context("WAAFIPAY_API_USER_ID not set")?,
            api_key: env::var("WAAFIPAY_API_KEY").context("WAAFIPAY_API_KEY not set")?,
            base_url: env::var("WAAFIPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.waafipay.com".to_string()),
            supported_currencies,
            success_url: env::var("WAAFIPAY_SUCCESS_URL")
                .unwrap_or_else(|_| "/waafipay-payment-success".to_string()),
            failure_url: env::var("WAAFIPAY_FAILURE_URL")
                .unwrap_or_else(|_| "/waafipay-payment-failure".to_string()),
            store_id: env::var("WAAFIPAY_STORE_ID").ok(),
            hpp_key: env::var("WAAFIPAY_HPP_KEY").ok(),
            request_timeout_secs: env::var("WAAFIPAY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        };

        let config = Config { server, gateway };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port < 1024 {
            return Err(anyhow!(
                "Port must be at least 1024, got {}",
                self.server.port
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&self.server.environment.as_str()) {
            return Err(anyhow!(
                "Environment must be one of: {:?}, got {}",
                valid_environments,
                self.server.environment
            ));
        }

        if self.gateway.merchant_uid.trim().is_empty() {
            return Err(anyhow!("WAAFIPAY_MERCHANT_UID cannot be empty"));
        }
        if self.gateway.api_user_id.trim().is_empty() {
            return Err(anyhow!("WAAFIPAY_API_USER_ID cannot be empty"));
        }
        if self.gateway.api_key.trim().is_empty() {
            return Err(anyhow!("WAAFIPAY_API_KEY cannot be empty"));
        }
        if self.gateway.base_url.trim().is_empty() {
            return Err(anyhow!("WAAFIPAY_BASE_URL cannot be empty"));
        }

        if self.gateway.supported_currencies.is_empty() {
            return Err(anyhow!(
                "WAAFIPAY_SUPPORTED_CURRENCIES must contain at least one currency"
            ));
        }

        // HPP needs both halves of the store configuration
        if self.gateway.store_id.is_some() != self.gateway.hpp_key.is_some() {
            return Err(anyhow!(
                "WAAFIPAY_STORE_ID and WAAFIPAY_HPP_KEY must be set together"
            ));
        }

        if self.gateway.request_timeout_secs == 0 {
            return Err(anyhow!("WAAFIPAY_TIMEOUT_SECS must be greater than 0"));
        }

        Ok(())
    }
}
