use serde::Deserialize;

use tilespin_core::net::protocol::{MAX_SERVER_MESSAGE_SIZE, max_leaderboard_frame_len};

/// Top-level server configuration, loaded from `tilespin.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub assets: AssetsConfig,
    pub limits: LimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: "web".to_string(),
            assets: AssetsConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

/// Where uploaded puzzle images live and how they are addressed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory uploaded images are written to.
    pub dir: String,
    /// URL path the directory is served under.
    pub public_prefix: String,
    pub max_upload_bytes: usize,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
            public_prefix: "/assets".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    /// Outbound messages queued per connection before delivery starts
    /// skipping that connection.
    pub player_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 500,
            ws_rate_limit_per_sec: 30.0,
            player_message_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Check configuration, returning a description of the first problem.
    pub fn check(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr is not a valid socket address: {}",
                self.listen_addr
            ));
        }
        if !self.assets.public_prefix.starts_with('/') {
            return Err("assets.public_prefix must start with '/'".to_string());
        }
        if self.assets.public_prefix.len() < 2 || self.assets.public_prefix.ends_with('/') {
            return Err("assets.public_prefix must be a non-root path without trailing '/'".into());
        }
        if self.assets.max_upload_bytes == 0 {
            return Err("assets.max_upload_bytes must be > 0".to_string());
        }
        if self.limits.max_ws_connections == 0 {
            return Err("limits.max_ws_connections must be > 0".to_string());
        }
        // Every connection may be a player, and the leaderboard lists them all
        // in one frame.
        let frame_len = max_leaderboard_frame_len(self.limits.max_ws_connections)
            .map_err(|e| format!("cannot size leaderboard frame: {e}"))?;
        if frame_len > MAX_SERVER_MESSAGE_SIZE {
            return Err(format!(
                "limits.max_ws_connections = {} allows a leaderboard of {frame_len} bytes \
                 (frame limit {MAX_SERVER_MESSAGE_SIZE})",
                self.limits.max_ws_connections
            ));
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            return Err("limits.ws_rate_limit_per_sec must be > 0".to_string());
        }
        if self.limits.player_message_buffer == 0 {
            return Err("limits.player_message_buffer must be > 0".to_string());
        }
        Ok(())
    }

    /// Validate configuration, logging and exiting on invalid values.
    pub fn validate(&self) {
        if let Err(e) = self.check() {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    }

    /// Load config from `tilespin.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("tilespin.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from tilespin.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse tilespin.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No tilespin.toml found, using defaults");
                ServerConfig::default()
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply `TILESPIN_*` overrides. `lookup` abstracts the environment so the
    /// mapping can be tested without mutating process state.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("TILESPIN_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Some(root) = lookup("TILESPIN_WEB_ROOT")
            && !root.is_empty()
        {
            self.web_root = root;
        }
        if let Some(dir) = lookup("TILESPIN_ASSET_DIR")
            && !dir.is_empty()
        {
            self.assets.dir = dir;
        }
        if let Some(val) = lookup("TILESPIN_MAX_UPLOAD_BYTES")
            && let Ok(n) = val.parse::<usize>()
        {
            self.assets.max_upload_bytes = n;
        }
        if let Some(val) = lookup("TILESPIN_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Some(val) = lookup("TILESPIN_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            self.limits.ws_rate_limit_per_sec = n;
        }
    }
}
