use crate::batch::BatchLimits;
use crate::error::Error;
use crate::info;
use crate::logger::{self, Level};
use crate::storage::StoreLimits;
use config::{Config, Environment, File};
use dotenv::dotenv;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Once;

static DOTENV_ONCE: Once = Once::new();

fn ensure_dotenv_loaded() {
    DOTENV_ONCE.call_once(|| match dotenv() {
        Ok(_) => info!("Config loaded including .env file."),
        Err(_) => info!("Config loaded without .env file."),
    });
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Directory holding the redb file.
    pub db_path: PathBuf,
    pub cache_size_mb: usize,
    pub limits: StoreLimits,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings { db_path: PathBuf::from("data"), cache_size_mb: 64, limits: StoreLimits::default() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: Level,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings { level: Level::Info }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub store: StoreSettings,
    pub batch: BatchLimits,
    pub log: LogSettings,
}

impl Settings {
    /// Reads `path` (any format the `config` crate knows, extension optional) with `TABLEKV__SECTION__KEY` overrides.
    pub fn load(path: &str) -> Result<Settings, Error> {
        ensure_dotenv_loaded();
        let builder = Config::builder()
            .add_source(File::with_name(path).required(true))
            .add_source(Environment::with_prefix("TABLEKV").try_parsing(true).separator("__"));
        let settings = builder.build()?.try_deserialize::<Settings>()?;
        info!("{:#?}", settings);
        Ok(settings)
    }

    pub fn apply_log_level(&self) {
        logger::set_level(self.log.level);
    }
}
