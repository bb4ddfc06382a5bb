//! Server configuration, loaded once at startup from a JSON file. Mirrors
//! the nested `server.*`/`world.*`/`performance.*`/`logging.*`/`security.*`
//! document shape; every field has a sensible default so a missing or
//! partial config still produces a runnable server.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub world: WorldSection,
    pub performance: PerformanceSection,
    pub logging: LoggingSection,
    pub security: SecuritySection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            world: WorldSection::default(),
            performance: PerformanceSection::default(),
            logging: LoggingSection::default(),
            security: SecuritySection::default(),
        }
    }
}

fn default_name() -> String {
    "A Craft Server".to_owned()
}
fn default_motd() -> String {
    "A Craft Server".to_owned()
}
fn default_host() -> String {
    "0.0.0.0".to_owned()
}
fn default_port() -> u16 {
    25565
}
fn default_max_players() -> u32 {
    20
}
fn default_view_distance() -> i32 {
    10
}
fn default_simulation_distance() -> i32 {
    10
}
fn default_difficulty() -> String {
    "normal".to_owned()
}
fn default_gamemode() -> String {
    "survival".to_owned()
}
fn default_spawn_protection() -> i32 {
    16
}

/// `online_mode` is accepted and stored but has no effect: real
/// authentication against a session server is out of scope, reserved here
/// so a config file written for a later version doesn't need editing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub name: String,
    pub motd: String,
    pub host: String,
    pub port: u16,
    pub max_players: u32,
    pub view_distance: i32,
    pub simulation_distance: i32,
    pub difficulty: String,
    pub gamemode: String,
    pub hardcore: bool,
    pub pvp: bool,
    pub online_mode: bool,
    pub spawn_protection: i32,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            motd: default_motd(),
            host: default_host(),
            port: default_port(),
            max_players: default_max_players(),
            view_distance: default_view_distance(),
            simulation_distance: default_simulation_distance(),
            difficulty: default_difficulty(),
            gamemode: default_gamemode(),
            hardcore: false,
            pvp: true,
            online_mode: false,
            spawn_protection: default_spawn_protection(),
        }
    }
}

fn default_world_name() -> String {
    "world".to_owned()
}
fn default_generator() -> String {
    "flat".to_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSection {
    pub name: String,
    pub seed: i64,
    pub generator: String,
    pub spawn_x: f64,
    pub spawn_y: f64,
    pub spawn_z: f64,
}

impl Default for WorldSection {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: 0,
            generator: default_generator(),
            spawn_x: 0.0,
            spawn_y: 64.0,
            spawn_z: 0.0,
        }
    }
}

fn default_io_threads() -> usize {
    2
}
fn default_worker_threads() -> usize {
    4
}
fn default_max_chunks_loaded() -> usize {
    1024
}
fn default_chunk_unload_timeout() -> u64 {
    600
}
fn default_auto_save_interval() -> u64 {
    300_000
}
fn default_network_buffer_size() -> usize {
    4096
}

/// `compression_threshold` is accepted and stored but has no effect:
/// compression framing is reserved on the wire but never engaged, matching
/// what the reference implementation does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSection {
    pub io_threads: usize,
    /// 0 means "use hardware concurrency"; resolved once at startup.
    pub worker_threads: usize,
    pub max_chunks_loaded: usize,
    /// Seconds of inactivity before a resident chunk becomes eviction-eligible.
    pub chunk_unload_timeout: u64,
    /// Milliseconds between automatic region-file saves.
    pub auto_save_interval: u64,
    pub compression_threshold: i32,
    pub network_buffer_size: usize,
}

impl Default for PerformanceSection {
    fn default() -> Self {
        Self {
            io_threads: default_io_threads(),
            worker_threads: default_worker_threads(),
            max_chunks_loaded: default_max_chunks_loaded(),
            chunk_unload_timeout: default_chunk_unload_timeout(),
            auto_save_interval: default_auto_save_interval(),
            compression_threshold: -1,
            network_buffer_size: default_network_buffer_size(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}
fn default_log_file() -> String {
    "craft.log".to_owned()
}
fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}
fn default_max_files() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    pub file: String,
    pub console: bool,
    pub max_file_size: u64,
    pub max_files: usize,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
            console: true,
            max_file_size: default_max_file_size(),
            max_files: default_max_files(),
        }
    }
}

fn default_max_connections_per_ip() -> u32 {
    8
}
fn default_packet_limit_per_second() -> u32 {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub ip_forwarding: bool,
    pub max_connections_per_ip: u32,
    pub connection_throttle: bool,
    pub packet_limit_per_second: u32,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            ip_forwarding: false,
            max_connections_per_ip: default_max_connections_per_ip(),
            connection_throttle: true,
            packet_limit_per_second: default_packet_limit_per_second(),
        }
    }
}

impl Config {
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_object_fills_in_every_default() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.server.host, default_host());
        assert_eq!(config.server.max_players, 20);
        assert_eq!(config.server.view_distance, 10);
        assert_eq!(config.performance.max_chunks_loaded, 1024);
    }

    #[test]
    fn partial_config_overrides_only_the_given_fields() {
        let config: Config = serde_json::from_str(
            r#"{"server": {"motd": "Hello", "max_players": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.server.motd, "Hello");
        assert_eq!(config.server.max_players, 5);
        assert_eq!(config.server.view_distance, default_view_distance());
    }

    #[test]
    fn bind_address_combines_host_and_port() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0:25565");
    }

    #[test]
    fn unreadable_path_reports_an_io_error() {
        let result = Config::load(std::path::Path::new("/nonexistent/path/config.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
