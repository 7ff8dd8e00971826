use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Gazette realtime notification server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "gazette-server", version, about = "Gazette realtime notification server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "GAZETTE_PORT", default_value = "8080")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "GAZETTE_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./gazette.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "GAZETTE_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// WebSocket transport tuning (loaded from [ws] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub ws: WsConfig,
}

/// Per-connection transport tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Outbound mailbox capacity per connection, in frames (default: 256)
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Maximum accepted inbound frame size in bytes (default: 512)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Read deadline in seconds: the connection is closed if nothing,
    /// including keepalive pongs, arrives for this long (default: 60)
    #[serde(default = "default_pong_wait")]
    pub pong_wait_secs: u64,

    /// Per-write deadline in seconds for the outbound loop (default: 10)
    #[serde(default = "default_write_wait")]
    pub write_wait_secs: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
            max_message_size: 512,
            pong_wait_secs: 60,
            write_wait_secs: 10,
        }
    }
}

fn default_mailbox_capacity() -> usize {
    256
}

fn default_max_message_size() -> usize {
    512
}

fn default_pong_wait() -> u64 {
    60
}

fn default_write_wait() -> u64 {
    10
}

impl WsConfig {
    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_secs)
    }

    /// Keepalive pings fire at 9/10 of the read deadline so a healthy peer
    /// always has a pong in flight before the deadline expires.
    pub fn ping_period(&self) -> Duration {
        self.pong_wait() * 9 / 10
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            config: "./gazette.toml".to_string(),
            json_logs: false,
            generate_config: false,
            ws: WsConfig::default(),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (GAZETTE_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("GAZETTE_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Gazette Realtime Notification Server Configuration
# Place this file at ./gazette.toml or specify with --config <path>
# All settings can be overridden via environment variables (GAZETTE_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# ---- WebSocket Transport ----
# [ws]

# Outbound mailbox capacity per connection, in frames.
# Frames published while a connection's mailbox is full are dropped for
# that connection (best-effort delivery).
# mailbox_capacity = 256

# Maximum accepted inbound frame size in bytes (commands are tiny)
# max_message_size = 512

# Read deadline in seconds; refreshed by any inbound frame including pongs
# pong_wait_secs = 60

# Per-write deadline in seconds for the outbound loop
# write_wait_secs = 10
"#
    .to_string()
}
