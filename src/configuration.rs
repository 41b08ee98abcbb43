use config::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

pub const DEFAULT_API_BASE_URL: &str = "http://ws.audioscrobbler.com/2.0/";
pub const DEFAULT_PAGE_BASE_URL: &str = "https://www.last.fm/";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api: ApiSettings,
    pub enrichment: EnrichmentSettings,
    pub store: StoreSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    pub api_key: String,
    pub base_url: String,
    pub page_base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_API_BASE_URL.to_string(),
            page_base_url: DEFAULT_PAGE_BASE_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentSettings {
    /// Tasks run concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches, in milliseconds.
    pub pause_ms: u64,
    /// How many top artists get pictures and metadata at startup.
    pub artists: usize,
    /// How many top tracks get cover art at startup.
    pub tracks: usize,
}

impl EnrichmentSettings {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            pause_ms: 1000,
            artists: 6,
            tracks: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    /// PBKDF2 rounds for newly written stores.
    pub kdf_iterations: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            kdf_iterations: 100_000,
        }
    }
}

/// Loads settings from `cfg_file`, falling back to built-in defaults and
/// letting `FUNNYTUNES__SECTION__KEY` environment variables override both.
pub fn get_configuration(cfg_file: &Path) -> Result<Settings, ConfigError> {
    let api = ApiSettings::default();
    let enrichment = EnrichmentSettings::default();
    let store = StoreSettings::default();

    let settings = config::Config::builder()
        .set_default("api.api_key", api.api_key)?
        .set_default("api.base_url", api.base_url)?
        .set_default("api.page_base_url", api.page_base_url)?
        .set_default("api.timeout_secs", api.timeout_secs)?
        .set_default("enrichment.batch_size", enrichment.batch_size as u64)?
        .set_default("enrichment.pause_ms", enrichment.pause_ms)?
        .set_default("enrichment.artists", enrichment.artists as u64)?
        .set_default("enrichment.tracks", enrichment.tracks as u64)?
        .set_default("store.kdf_iterations", store.kdf_iterations as u64)?
        .add_source(
            config::File::new(&cfg_file.to_string_lossy(), config::FileFormat::Yaml)
                .required(false),
        )
        .add_source(
            config::Environment::with_prefix("FUNNYTUNES")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

/// Everything funnytunes keeps on disk, under `~/.funnytunes`.
pub struct ConfigFolder {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub store_file: PathBuf,
    pub images_dir: PathBuf,
}

impl ConfigFolder {
    pub fn new() -> io::Result<Self> {
        let home_dir = env::var("HOME").map_err(|_| {
            io::Error::new(io::ErrorKind::NotFound, "HOME environment variable is not set")
        })?;
        Ok(Self::in_dir(Path::new(&home_dir).join(".funnytunes")))
    }

    pub fn in_dir(config_dir: PathBuf) -> Self {
        Self {
            config_file: config_dir.join("config.yaml"),
            store_file: config_dir.join("ListeningDB"),
            images_dir: config_dir.join("Images").join("Artists"),
            config_dir,
        }
    }
}

pub fn create_config(cfg_folder: &ConfigFolder) -> Result<(), Box<dyn std::error::Error>> {
    println!("\x1b[1m\x1b[32mCreating configuration...\x1b[0m");

    if cfg_folder.config_file.exists() && !confirm("The configuration file already exists. Overwrite it?")? {
        println!("\x1b[33mOperation cancelled.\x1b[0m");
        return Ok(());
    }

    fs::create_dir_all(&cfg_folder.config_dir)?;
    fs::create_dir_all(&cfg_folder.images_dir)?;

    let config_content = include_str!("config_template.yaml");
    fs::write(&cfg_folder.config_file, config_content)?;

    println!("\x1b[32mConfiguration file created at:");
    println!("  -> {}", cfg_folder.config_file.display());
    println!("\x1b[0mAdd your Last.fm API key to the configuration file to enable enrichment.");

    Ok(())
}

/// Asks a yes/no question on stdin; anything but `y` means no.
pub fn confirm(question: &str) -> Result<bool, io::Error> {
    println!("\x1b[31m{question} (y/N)\x1b[0m");

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}
