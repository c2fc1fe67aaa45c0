// src/config.rs

use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_base_url =
            env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        let admin_email = env::var("ADMIN_EMAIL").ok();
        let admin_password = env::var("ADMIN_PASSWORD").ok();
        let http_timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);

        Ok(Self {
            api_base_url,
            admin_email,
            admin_password,
            http_timeout_secs,
        })
    }
}
