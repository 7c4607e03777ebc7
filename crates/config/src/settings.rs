use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub sfu: SfuSettings,
}

/// HTTP/WS bind settings. TLS termination and static asset serving sit in
/// front of this process and are out of scope here.
#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// mediasoup worker pool and per-transport bitrate policy.
#[derive(Debug, Deserialize, Clone)]
pub struct SfuSettings {
    pub num_workers: u32,
    pub listen_ip: String,
    pub announced_ip: String,
    pub rtc_min_port: u16,
    pub rtc_max_port: u16,
    pub initial_available_outgoing_bitrate: u32,
    pub minimum_available_outgoing_bitrate: u32,
    pub max_incoming_bitrate: u32,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::default().separator("__").prefix("SFU"))
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default("sfu.num_workers", 2)?
            .set_default("sfu.listen_ip", "0.0.0.0")?
            .set_default("sfu.announced_ip", "")?
            .set_default("sfu.rtc_min_port", 40000)?
            .set_default("sfu.rtc_max_port", 49999)?
            .set_default("sfu.initial_available_outgoing_bitrate", 600_000)?
            .set_default("sfu.minimum_available_outgoing_bitrate", 100_000)?
            .set_default("sfu.max_incoming_bitrate", 1_500_000)?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("failed to load default settings")
    }
}
