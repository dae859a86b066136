use clap::Parser;
use std::time::Duration;

/// Process configuration. Every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "7hand real-time lobby server", long_about = None)]
pub struct Config {
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "GAME_FLEET_ID", default_value = "local-fleet")]
    pub fleet_id: String,

    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Report to the session orchestration service instead of running standalone
    #[arg(long, env = "ENABLE_ORCHESTRATION", default_value_t = false)]
    pub enable_orchestration: bool,

    /// Session the standalone orchestrator opens once the process is ready
    #[arg(long, env = "GAME_SESSION_ID")]
    pub game_session_id: Option<String>,

    /// Seconds between orchestration health checks
    #[arg(long, env = "HEALTH_CHECK_INTERVAL", default_value_t = 60)]
    pub health_check_interval: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: tracing::Level,

    /// HTTP worker threads, defaults to the number of physical cores
    #[arg(long, env = "WORKERS")]
    pub workers: Option<usize>,
}

impl Config {
    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

/// Per-connection transport limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// Outbound queue capacity; a full queue gets the client evicted
    pub send_queue: usize,
    pub max_message_size: usize,
    /// Idle-read deadline, refreshed by every inbound frame
    pub pong_wait: Duration,
    /// Keep-alive period, kept shorter than `pong_wait`
    pub ping_period: Duration,
    pub write_wait: Duration,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            send_queue: 256,
            max_message_size: 512 * 1024,
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            write_wait: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReaperSettings {
    pub interval: Duration,
    pub max_idle: Duration,
}

impl Default for ReaperSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            max_idle: Duration::from_secs(2 * 60 * 60),
        }
    }
}
