use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub input: InputSection,
    #[serde(default)]
    pub output: OutputSection,
    pub channels: ChannelSection,
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
    #[serde(default)]
    pub store_corrections: Vec<StoreCorrection>,
    /// Directory of the config file; relative paths resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    // Name of the environment variable holding the connection string
    #[serde(default = "default_url_env")]
    pub url_env: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSection {
    #[serde(default = "default_separator")]
    pub separator: char,
    #[serde(default = "default_true")]
    pub pad_cpf_zeros: bool,
    pub sheet: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSection {
    pub catalog: PathBuf,
    #[serde(default = "default_similarity")]
    pub similarity_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub code: String,
    pub name: String,
    pub id: Uuid,
    /// Area code applied to local phone numbers without one.
    pub ddd: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub clientes: Vec<PathBuf>,
    #[serde(default)]
    pub vendas: Vec<PathBuf>,
    #[serde(default)]
    pub ordens_servico: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreCorrection {
    pub from: Uuid,
    pub to: Uuid,
    pub reason: Option<String>,
}

fn default_url_env() -> String {
    "DATABASE_URL".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_batch_size() -> usize {
    500
}

fn default_separator() -> char {
    ';'
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("saida")
}

fn default_similarity() -> f64 {
    0.88
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url_env: default_url_env(),
            max_connections: default_max_connections(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            separator: default_separator(),
            pad_cpf_zeros: true,
            sheet: None,
        }
    }
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            format: OutputFormat::Csv,
        }
    }
}

impl MigrationConfig {
    /// Loads the TOML file, layering `MIGRATION__SECTION__KEY` environment
    /// overrides on top of it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(
                ::config::Environment::with_prefix("MIGRATION")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read migration config file: {}", path.display()))?;

        let mut config: MigrationConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse migration config file: {}", path.display()))?;

        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml_str(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config: MigrationConfig =
            toml::from_str(content).context("Failed to parse migration config")?;
        config.base_dir = base_dir.into();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.input.separator.is_ascii() {
            return Err(anyhow!(
                "CSV separator must be a single ASCII character, got {:?}",
                self.input.separator
            ));
        }

        if !(0.0..=1.0).contains(&self.channels.similarity_threshold) {
            return Err(anyhow!(
                "channels.similarity_threshold must be between 0 and 1, got {}",
                self.channels.similarity_threshold
            ));
        }

        if self.database.batch_size == 0 {
            return Err(anyhow!("database.batch_size cannot be zero"));
        }

        let mut codes = HashSet::new();
        let mut ids = HashSet::new();
        for store in &self.stores {
            if store.code.trim().is_empty() {
                return Err(anyhow!("Store code cannot be empty (store {})", store.name));
            }
            if !codes.insert(store.code.as_str()) {
                return Err(anyhow!("Duplicate store code: {}", store.code));
            }
            if !ids.insert(store.id) {
                return Err(anyhow!("Duplicate store id: {}", store.id));
            }
        }

        self.correction_map()?;
        Ok(())
    }

    /// Flattens correction chains (`a -> b`, `b -> c` becomes `a -> c`).
    pub fn correction_map(&self) -> Result<HashMap<Uuid, Uuid>> {
        let direct: HashMap<Uuid, Uuid> = self
            .store_corrections
            .iter()
            .map(|c| (c.from, c.to))
            .collect();

        if direct.len() != self.store_corrections.len() {
            return Err(anyhow!("A store id appears more than once as a correction source"));
        }

        let mut flattened = HashMap::with_capacity(direct.len());
        for (&from, &to) in &direct {
            let mut target = to;
            let mut seen = HashSet::from([from]);
            while let Some(&next) = direct.get(&target) {
                if !seen.insert(target) {
                    return Err(anyhow!("Store correction cycle involving {}", from));
                }
                target = next;
            }
            if target == from {
                return Err(anyhow!("Store correction cycle involving {}", from));
            }
            flattened.insert(from, target);
        }

        Ok(flattened)
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn database_url(&self) -> Result<String> {
        env::var(&self.database.url_env)
            .with_context(|| format!("Missing environment variable: {}", self.database.url_env))
    }

    pub fn store(&self, code: &str) -> Option<&StoreConfig> {
        self.stores.iter().find(|s| s.code == code)
    }
}
