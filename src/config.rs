/// Process-level settings for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub api_token: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("DATABASE_URL") {
            config.database_url = value;
        }
        if let Ok(value) = std::env::var("WEBHOOK_BIND_ADDR") {
            config.bind_addr = value;
        }
        if let Ok(value) = std::env::var("WEBHOOK_API_TOKEN")
            && !value.trim().is_empty()
        {
            config.api_token = Some(value.trim().to_string());
        }

        config
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:webhooks.db?mode=rwc".to_string(),
            bind_addr: "127.0.0.1:3001".to_string(),
            api_token: None,
        }
    }
}
