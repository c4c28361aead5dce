use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_pool_size: u32,
    pub http_bind: String,

    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub sensor_topic: String,
    pub pump_status_topic: String,
    pub pump_cmd_topic: String,
    pub mqtt_keepalive_secs: u64,
    pub mqtt_connect_timeout_secs: u64,
    pub mqtt_reconnect_delay_secs: u64,

    pub persist_interval_secs: u64,
    pub history_window_hours: i64,
    pub viewer_queue_depth: usize,

    pub cors_origins: Vec<String>,
    pub weather_api_key: Option<String>,
    pub weather_lat: f64,
    pub weather_lon: f64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let database_url = env::var("BRIDGE_DATABASE_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .context("BRIDGE_DATABASE_URL or DATABASE_URL is required")?;
        let db_pool_size = env_u64("BRIDGE_DB_POOL_SIZE", Some(10))? as u32;
        let http_bind = env_string("BRIDGE_HTTP_BIND", Some("0.0.0.0:3000".to_string()))?;

        let mqtt_host = env_string("BRIDGE_MQTT_HOST", Some("127.0.0.1".to_string()))?;
        let mqtt_port = env_u64("BRIDGE_MQTT_PORT", Some(1883))? as u16;
        let mqtt_username = env_optional("BRIDGE_MQTT_USERNAME");
        let mqtt_password = env_optional("BRIDGE_MQTT_PASSWORD");
        let sensor_topic = env_string("BRIDGE_SENSOR_TOPIC", Some("greenhouse/sensors".to_string()))?;
        let pump_status_topic = env_string(
            "BRIDGE_PUMP_STATUS_TOPIC",
            Some("greenhouse/pump/status".to_string()),
        )?;
        let pump_cmd_topic =
            env_string("BRIDGE_PUMP_CMD_TOPIC", Some("greenhouse/pump/cmd".to_string()))?;
        let mqtt_keepalive_secs = env_u64("BRIDGE_MQTT_KEEPALIVE_SECS", Some(30))?;
        let mqtt_connect_timeout_secs = env_u64("BRIDGE_MQTT_CONNECT_TIMEOUT_SECS", Some(4))?;
        let mqtt_reconnect_delay_secs = env_u64("BRIDGE_MQTT_RECONNECT_DELAY_SECS", Some(1))?;

        let persist_interval_secs = env_u64("BRIDGE_PERSIST_INTERVAL_SECS", Some(30 * 60))?;
        let history_window_hours = env_u64("BRIDGE_HISTORY_WINDOW_HOURS", Some(24))? as i64;
        let viewer_queue_depth = env_u64("BRIDGE_VIEWER_QUEUE_DEPTH", Some(32))? as usize;

        let cors_origins = env_optional("BRIDGE_CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(|origin| origin.to_string())
                    .collect()
            })
            .unwrap_or_default();

        let weather_api_key = env_optional("BRIDGE_WEATHER_API_KEY");
        let weather_lat = env_f64("BRIDGE_WEATHER_LAT", Some(44.85))?;
        let weather_lon = env_f64("BRIDGE_WEATHER_LON", Some(24.88))?;

        Ok(Self {
            database_url,
            db_pool_size,
            http_bind,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            sensor_topic,
            pump_status_topic,
            pump_cmd_topic,
            mqtt_keepalive_secs,
            mqtt_connect_timeout_secs,
            mqtt_reconnect_delay_secs,
            persist_interval_secs,
            history_window_hours,
            viewer_queue_depth,
            cors_origins,
            weather_api_key,
            weather_lat,
            weather_lon,
        })
    }

    pub fn mqtt_keepalive(&self) -> Duration {
        Duration::from_secs(self.mqtt_keepalive_secs)
    }

    pub fn mqtt_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.mqtt_connect_timeout_secs)
    }

    pub fn mqtt_reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.mqtt_reconnect_delay_secs)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs)
    }
}

fn env_string(key: &str, default: Option<String>) -> Result<String> {
    match env::var(key) {
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_u64(key: &str, default: Option<u64>) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid {key}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_f64(key: &str, default: Option<f64>) -> Result<f64> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<f64>()
            .with_context(|| format!("invalid {key}")),
        Err(_) => default.ok_or_else(|| anyhow!("missing env var {key}")),
    }
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
