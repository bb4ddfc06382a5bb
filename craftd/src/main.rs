use std::path::Path;

use craft_server::config::Config;
use craft_server::Server;

const CONFIG_CANDIDATES: &[&str] = &["craft.json", "config/craft.json"];

fn load_config() -> Config {
    for candidate in CONFIG_CANDIDATES {
        let path = Path::new(candidate);
        if !path.exists() {
            continue;
        }
        match Config::load(path) {
            Ok(config) => {
                tracing::info!(path = candidate, "loaded config");
                return config;
            }
            Err(err) => {
                tracing::warn!(path = candidate, %err, "failed to parse config, trying next candidate");
            }
        }
    }
    tracing::info!("no config file found, running with defaults");
    Config::default()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config();
    let server = Server::new(config)?;
    server.run()?;
    Ok(())
}
