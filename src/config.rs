use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: u32,
    pub library: LibraryConfig,
    pub output: OutputConfig,
    pub index: IndexConfig,
    pub http: HttpConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            library: LibraryConfig::default(),
            output: OutputConfig::default(),
            index: IndexConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Which files of the music folder end up in the playlist
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LibraryConfig {
    pub extensions: Vec<String>,
    pub recursive: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            extensions: ["m4a", "mp3", "aac", "ogg", "wav"]
                .into_iter()
                .map(String::from)
                .collect(),
            recursive: false,
        }
    }
}

/// Names of the generated files, relative to the music folder
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub covers_dir: String,
    pub manifest: String,
    pub player_page: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            covers_dir: "covers".to_string(),
            manifest: "playlist.js".to_string(),
            player_page: "index.html".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IndexConfig {
    pub enabled: bool,
    /// Database file name inside the covers directory
    pub file: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file: ".coverdeck-index.sqlite".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}
