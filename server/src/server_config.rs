use config::Config;
use lazy_static::lazy_static;
use serde::Deserialize;
use std::{env, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Default polling period in fractional hours, applied until changed at
    /// runtime through the admin API.
    pub check_interval_hours: f64,
    /// Whether failed fetches produce a notification in the channel.
    pub send_errors: bool,
    /// Extra message content sent along with a "now full" embed.
    #[serde(default)]
    pub filled_message: Option<String>,
    /// Extra message content sent along with a "no longer full" embed.
    #[serde(default)]
    pub unfilled_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    settings: Settings,
    discord: DiscordConfig,
    storage: StorageConfig,
}

#[derive(Debug)]
pub struct ServerConfig {
    pub settings: Settings,
    pub discord: DiscordConfig,
    pub storage: StorageConfig,
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Server Config:\n{:?}\n\nStorage: {:?}\n\nDiscord bot token: {}",
            self.settings,
            self.storage,
            if self.discord.bot_token.is_empty() {
                "unset"
            } else {
                "set"
            },
        )
    }
}

lazy_static! {
    pub static ref cfg: ServerConfig = {
        let root = env::var("APP_DIR").unwrap_or_else(|_| {
            let dir =
                env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR or APP_DIR is required");
            let dir = Path::new(&dir).parent().unwrap().display().to_string();
            format!("{}/config", dir)
        });
        let path = format!("{root}/config.toml");
        let cfg_file: ConfigFile = Config::builder()
            .add_source(config::File::with_name(&path))
            .build()
            .expect("config.toml is required")
            .try_deserialize()
            .expect("config.toml is invalid");

        let ConfigFile {
            settings,
            mut discord,
            storage,
        } = cfg_file;

        if let Ok(token) = env::var("DISCORD_BOT_TOKEN") {
            discord.bot_token = token;
        }

        ServerConfig {
            settings,
            discord,
            storage,
        }
    };
}
