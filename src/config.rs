use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub session_ttl_minutes: i64,
    pub remember_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub token: TokenConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let token = TokenConfig {
            secret: std::env::var("TOKEN_SECRET")?,
            issuer: std::env::var("TOKEN_ISSUER").unwrap_or_else(|_| "enroll".into()),
            audience: std::env::var("TOKEN_AUDIENCE").unwrap_or_else(|_| "enroll-users".into()),
            session_ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            remember_ttl_minutes: std::env::var("REMEMBER_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 30),
            reset_ttl_minutes: std::env::var("RESET_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
        };
        Ok(Self {
            database_url,
            token,
        })
    }
}
