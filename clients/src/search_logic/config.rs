use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Dalil realtime search stream client", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "DALIL_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "DALIL_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "DALIL_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "DALIL_ENDPOINT", help = "Explicit stream endpoint, bypassing endpoint resolution.")]
    pub endpoint: Option<String>,

    #[clap(long, env = "DALIL_MODE", help = "Build mode for endpoint resolution (development or production).")]
    pub mode: Option<String>,

    #[clap(long, env = "DALIL_BACKEND_URL", help = "Configured backend URL, honored in development when it points at a loopback host.")]
    pub backend_url: Option<String>,

    #[clap(long, env = "DALIL_STORE_PATH", help = "Path to the device-local state file.")]
    pub store_path: Option<PathBuf>,

    #[clap(long, env = "DALIL_LAT", help = "Fixed latitude reported on server location requests.")]
    pub lat: Option<f64>,

    #[clap(long, env = "DALIL_LON", help = "Fixed longitude reported on server location requests.")]
    pub lon: Option<f64>,

    #[clap(long, env = "DALIL_RECONNECT_BASE_DELAY_MS", help = "Base delay in milliseconds for reconnect attempts.")]
    pub reconnect_base_delay_ms: Option<u64>,

    #[clap(long, env = "DALIL_RECONNECT_MAX_DELAY_MS", help = "Maximum delay in milliseconds for reconnect attempts.")]
    pub reconnect_max_delay_ms: Option<u64>,

    #[clap(long, env = "DALIL_LOCATION_FIX_TIMEOUT_SECONDS", help = "Bounded wait in seconds for a device position fix.")]
    pub location_fix_timeout_seconds: Option<u64>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            endpoint: other.endpoint.or(self.endpoint),
            mode: other.mode.or(self.mode),
            backend_url: other.backend_url.or(self.backend_url),
            store_path: other.store_path.or(self.store_path),
            lat: other.lat.or(self.lat),
            lon: other.lon.or(self.lon),
            reconnect_base_delay_ms: other.reconnect_base_delay_ms.or(self.reconnect_base_delay_ms),
            reconnect_max_delay_ms: other.reconnect_max_delay_ms.or(self.reconnect_max_delay_ms),
            location_fix_timeout_seconds: other
                .location_fix_timeout_seconds
                .or(self.location_fix_timeout_seconds),
        }
    }
}

pub fn load_config() -> Config {
    // 1. Load defaults
    let default_config = Config {
        log_dir: Some(PathBuf::from("./logs")),
        log_level: Some("info".to_string()),
        mode: Some("production".to_string()),
        reconnect_base_delay_ms: Some(1000),
        reconnect_max_delay_ms: Some(60000),
        location_fix_timeout_seconds: Some(10),
        ..Default::default()
    };

    // 2. Load from config file (client_search.conf) if present.
    //    Allow overriding default config file path with CLI arg.
    let cli_args_for_path = Config::parse();

    let config_file_path = cli_args_for_path
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("client_search.conf"));

    let mut current_config = default_config;

    if config_file_path.exists() {
        if let Ok(config_str) = fs::read_to_string(&config_file_path) {
            if let Ok(file_config) = serde_json::from_str::<Config>(&config_str) {
                current_config = current_config.merge(file_config);
            } else {
                log::warn!(
                    "Failed to parse config file: {}. Falling back to other sources.",
                    config_file_path.display()
                );
            }
        } else {
            log::warn!(
                "Failed to read config file: {}. Falling back to other sources.",
                config_file_path.display()
            );
        }
    }

    // 3. Override with environment variables and CLI arguments
    //    clap::Parser automatically handles env vars and CLI args.
    let cli_args_final = Config::parse();
    current_config = current_config.merge(cli_args_final);

    current_config
}
