use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

const DEFAULT_GATEWAY_FORM_URL: &str = "https://rc-epay.esewa.com.np/api/epay/main/v2/form";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    /// Form action URL returned to clients initiating a gateway payment.
    pub gateway_form_url: String,
    /// Upper bound on waiting for row locks inside one settlement unit.
    pub lock_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            gateway_form_url: env::var("GATEWAY_FORM_URL")
                .unwrap_or_else(|_| DEFAULT_GATEWAY_FORM_URL.to_string()),
            lock_timeout_ms: env::var("LOCK_TIMEOUT_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
        })
    }
}
