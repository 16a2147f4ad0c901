use std::env;

use tracing::warn;

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub token_expiry_days: i64,
}

impl JwtConfig {
    pub fn from_env() -> Self {
        let secret = env::var("JWT_KEY").unwrap_or_default();
        if secret.is_empty() {
            // tokens are still signed, just with an empty key
            warn!("JWT_KEY is not set; signing tokens with an empty secret");
        }

        Self {
            secret,
            token_expiry_days: env::var("JWT_EXPIRY_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}
