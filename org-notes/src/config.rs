use std::sync::OnceLock;

use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default)]
    pub log_json: bool,

    // tenancy
    #[serde(default = "default_org_slug")]
    pub default_org_slug: String,
    #[serde(default = "default_public_org_slug")]
    pub public_org_slug: String,

    // auth
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
    #[serde(default = "default_session_inactivity_days")]
    pub session_inactivity_days: i64,
    #[serde(default)]
    pub session_secure_cookie: bool,
    #[serde(default = "default_invite_ttl_hours")]
    pub invite_ttl_hours: i64,
    #[serde(default = "default_reset_token_ttl_minutes")]
    pub reset_token_ttl_minutes: i64,
    #[serde(default = "default_login_path")]
    pub login_path: String,

    // realtime
    #[serde(default = "default_realtime_capacity")]
    pub realtime_capacity: usize,

    // build
    #[serde(default = "default_local")]
    pub source: String,
    #[serde(default = "default_local")]
    pub git_commit: String,
    #[serde(default = "default_local")]
    pub pipeline_id: String,
    #[serde(default = "default_local")]
    pub version: String,
}

fn default_port() -> u16 {
    4000
}

fn default_database_url() -> String {
    "sqlite.db".into()
}

fn default_org_slug() -> String {
    "default-org".into()
}

fn default_public_org_slug() -> String {
    "public-notes".into()
}

fn default_min_password_length() -> usize {
    6
}

fn default_session_inactivity_days() -> i64 {
    1
}

fn default_invite_ttl_hours() -> i64 {
    72
}

fn default_reset_token_ttl_minutes() -> i64 {
    60
}

fn default_login_path() -> String {
    "/login".into()
}

fn default_realtime_capacity() -> usize {
    256
}

fn default_local() -> String {
    "local".into()
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        match envy::from_env::<Self>() {
            Ok(config) => config,
            Err(err) => {
                eprintln!("invalid configuration: {err}");
                std::process::exit(1);
            }
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

#[cfg(test)]
pub fn config_override<F>(override_config: F) -> &'static Config
where
    F: FnOnce(Config) -> Config,
{
    CONFIG.get_or_init(|| override_config(Config::from_env()))
}
