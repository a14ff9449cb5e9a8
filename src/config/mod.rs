use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Postgres connection string. Unset runs the market in memory.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,

    /// Bearer token guarding admin routes. Unset disables admin auth.
    pub api_token: Option<String>,

    // Engine
    pub rng_seed: Option<u64>,
    pub decay_sweep_interval_secs: u64,

    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: 10,
            host: "0.0.0.0".into(),
            port: 8080,
            api_token: None,
            rng_seed: None,
            decay_sweep_interval_secs: 0,
            log_json: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,

            api_token: non_empty("API_TOKEN"),

            rng_seed: non_empty("RNG_SEED")
                .map(|seed| seed.parse())
                .transpose()
                .map_err(|e| anyhow::anyhow!("RNG_SEED must be an unsigned integer: {e}"))?,
            decay_sweep_interval_secs: env::var("DECAY_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "0".into())
                .parse()?,

            log_json: env::var("LOG_FORMAT")
                .map(|format| format.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
