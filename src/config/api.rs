use std::env;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub api_key: String,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("API_KEY").unwrap_or_else(|_| "secret".to_string()),
        }
    }
}
